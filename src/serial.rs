//! EUSART
//!
//! Begin configuration by filling in an [`EusartConfig`] and calling
//! [`init`](EusartConfig::init) with the oscillator frequency. TX (RC6) and RX (RC7) can be
//! enabled independently. The resulting [`Eusart`] handle offers blocking and non-blocking byte
//! and buffer operations, and can be [`split`](Eusart::split) into [`Tx`] and [`Rx`] halves.
//!
//! The halves implement both [`embedded-io`](embedded_io)'s buffer-based blocking traits and the
//! single-byte non-blocking [`embedded-hal-nb`](embedded_hal_nb::serial) traits.
//!
//! As the EUSART has a single-byte transmit register, [`embedded_io::Write::write`] sends only
//! the first byte of its buffer. Use [`write_all`](embedded_io::Write::write_all) for more.
//!
//! # Interrupts
//!
//! The TX callback runs once the transmit register is empty, after which the TX interrupt is
//! disabled again. Every blocking or non-blocking byte write re-arms it, so the callback fires
//! once per write. The RX callback runs when a byte is waiting in `RCREG` and is expected to
//! read it. If `FERR` or `OERR` is set at that point and the matching error callback is
//! registered, the error callback runs instead.

use crate::clock::{Clock, Fosc};
use crate::error::{Error, Result};
use crate::gpio::{self, Direction, Port};
use crate::hw_traits::eusart::{self as hw, BrgMode};
use crate::interrupt::{self, Handler, Irq, Source, HANDLERS};
use crate::pac::rcsta;
use crate::util::spin_until;
use bitflags::bitflags;

const TX_PIN: u8 = 6;
const RX_PIN: u8 = 7;

/// Baud rate generator mode
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BaudGenerator {
    /// Asynchronous, 8-bit generator, low speed: `Fosc / (64 (n + 1))`
    Async8Low,
    /// Asynchronous, 8-bit generator, high speed: `Fosc / (16 (n + 1))`
    Async8High,
    /// Asynchronous, 16-bit generator, low speed: `Fosc / (16 (n + 1))`
    Async16Low,
    /// Asynchronous, 16-bit generator, high speed: `Fosc / (4 (n + 1))`
    Async16High,
    /// Synchronous, 8-bit generator: `Fosc / (4 (n + 1))`
    Sync8,
    /// Synchronous, 16-bit generator: `Fosc / (4 (n + 1))`
    Sync16,
}

impl BaudGenerator {
    /// Divider `k` in `baud = Fosc / (k (n + 1))`
    pub const fn k(self) -> u32 {
        match self {
            BaudGenerator::Async8Low => 64,
            BaudGenerator::Async8High | BaudGenerator::Async16Low => 16,
            BaudGenerator::Async16High | BaudGenerator::Sync8 | BaudGenerator::Sync16 => 4,
        }
    }

    const fn max_divisor(self) -> u32 {
        match self {
            BaudGenerator::Async8Low | BaudGenerator::Async8High | BaudGenerator::Sync8 => 0xFF,
            _ => 0xFFFF,
        }
    }

    fn mode_bits(self) -> BrgMode {
        let (sync, brgh, brg16) = match self {
            BaudGenerator::Async8Low => (false, false, false),
            BaudGenerator::Async8High => (false, true, false),
            BaudGenerator::Async16Low => (false, false, true),
            BaudGenerator::Async16High => (false, true, true),
            BaudGenerator::Sync8 => (true, false, false),
            BaudGenerator::Sync16 => (true, false, true),
        };
        BrgMode { sync, brgh, brg16 }
    }
}

/// Baud rate generator value for `baud_rate` at `fosc`, rounded to nearest
pub fn divisor(fosc: &Fosc, baud_rate: u32, gen: BaudGenerator) -> Result<u16> {
    let div = u64::from(gen.k()) * u64::from(baud_rate);
    if div == 0 {
        return Err(Error::InvalidArgument);
    }
    let n = (u64::from(fosc.freq()) + div / 2) / div;
    if n == 0 || n - 1 > u64::from(gen.max_divisor()) {
        return Err(Error::InvalidArgument);
    }
    Ok((n - 1) as u16)
}

/// Transmitter settings
#[derive(Clone, Copy, Debug, Default)]
pub struct TxConfig {
    /// Enable the transmitter and claim RC6
    pub enable: bool,
    /// 9-bit frames
    pub nine_bit: bool,
    /// Transmit-register-empty callback
    pub interrupt: Option<Irq>,
}

/// Receiver settings
#[derive(Clone, Copy, Debug, Default)]
pub struct RxConfig {
    /// Enable continuous reception and claim RC7
    pub enable: bool,
    /// 9-bit frames
    pub nine_bit: bool,
    /// Byte-received callback
    pub interrupt: Option<Irq>,
    /// Called instead of the receive callback when the waiting byte has a framing error
    pub on_framing_error: Option<Handler>,
    /// Called instead of the receive callback when the receiver has overrun
    pub on_overrun_error: Option<Handler>,
}

/// EUSART configuration
#[derive(Clone, Copy, Debug)]
pub struct EusartConfig {
    /// Bits per second
    pub baud_rate: u32,
    /// Generator mode
    pub baud_gen: BaudGenerator,
    /// Transmitter
    pub tx: TxConfig,
    /// Receiver
    pub rx: RxConfig,
}

bitflags! {
    /// Receive error flags, as found in `RCSTA`
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct ErrorStatus: u8 {
        /// Stop bit missing on the byte waiting in `RCREG`
        const FRAMING = 1 << rcsta::FERR;
        /// A byte arrived while two were already waiting. Reception is stalled until cleared.
        const OVERRUN = 1 << rcsta::OERR;
    }
}

impl EusartConfig {
    /// Disable the port, program the baud rate generator, set up the enabled directions and
    /// their callbacks, then enable the port.
    ///
    /// Fails with `InvalidArgument` before touching any register if the baud rate cannot be
    /// generated from `fosc` in the chosen mode.
    pub fn init(&self, fosc: &Fosc) -> Result<Eusart> {
        let spbrg = divisor(fosc, self.baud_rate, self.baud_gen)
            .inspect_err(|_| warn!("eusart: baud {} not reachable", self.baud_rate))?;

        hw::spen_wr(false);
        hw::txen_wr(false);
        hw::cren_wr(false);
        hw::brg_settings(self.baud_gen.mode_bits(), spbrg);

        gpio::set_direction(Port::C, TX_PIN, Direction::Input);
        gpio::set_direction(Port::C, RX_PIN, Direction::Input);

        if self.tx.enable {
            hw::tx9_wr(self.tx.nine_bit);
            interrupt::attach(Source::EusartTx, &HANDLERS.eusart_tx, self.tx.interrupt);
            hw::txen_wr(true);
        } else {
            interrupt::detach(Source::EusartTx, &HANDLERS.eusart_tx);
        }

        // The error slots are only read from the RX service, so write them with RCIE off
        Source::EusartRx.disable();
        if self.rx.enable {
            hw::rx9_wr(self.rx.nine_bit);
            HANDLERS.eusart_framing.set(self.rx.on_framing_error);
            HANDLERS.eusart_overrun.set(self.rx.on_overrun_error);
            interrupt::attach(Source::EusartRx, &HANDLERS.eusart_rx, self.rx.interrupt);
            hw::cren_wr(true);
        } else {
            HANDLERS.eusart_framing.set(None);
            HANDLERS.eusart_overrun.set(None);
            interrupt::detach(Source::EusartRx, &HANDLERS.eusart_rx);
        }

        hw::spen_wr(true);
        debug!("eusart: {} baud, divisor {}", self.baud_rate, spbrg);
        Ok(Eusart { tx: Tx(()), rx: Rx(()) })
    }
}

fn arm_tx_callback() {
    if Source::EusartTx.compiled() && HANDLERS.eusart_tx.is_set() {
        Source::EusartTx.enable();
    }
}

/// Configured EUSART
#[derive(Debug)]
pub struct Eusart {
    tx: Tx,
    rx: Rx,
}

impl Eusart {
    /// Wait for a byte and return it
    #[inline]
    pub fn read_byte(&mut self) -> Result<u8> {
        self.rx.read_byte()
    }

    /// Return the waiting byte, or `WouldBlock` if there is none
    #[inline]
    pub fn try_read_byte(&mut self) -> nb::Result<u8, Error> {
        self.rx.recv()
    }

    /// Wait for the transmit shift register to empty, then send `byte`. Fails with
    /// `InvalidArgument` if the transmitter is disabled.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) -> Result {
        self.tx.write_byte(byte)
    }

    /// Send `byte` if the transmit shift register is empty, otherwise `WouldBlock`
    #[inline]
    pub fn try_write_byte(&mut self, byte: u8) -> nb::Result<(), Error> {
        self.tx.send(byte)
    }

    /// Send every byte of `bytes`, blocking on each
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result {
        self.tx.write_bytes(bytes)
    }

    /// Send `s`, blocking on each byte
    #[inline]
    pub fn write_str(&mut self, s: &str) -> Result {
        self.tx.write_bytes(s.as_bytes())
    }

    /// Send bytes from `bytes` until the transmitter is busy. Returns how many were sent.
    #[inline]
    pub fn try_write_bytes(&mut self, bytes: &[u8]) -> usize {
        self.tx.try_write_bytes(bytes)
    }

    /// Send as much of `s` as the transmitter accepts without waiting. Returns the byte count.
    #[inline]
    pub fn try_write_str(&mut self, s: &str) -> usize {
        self.tx.try_write_bytes(s.as_bytes())
    }

    /// Receive error flags
    #[inline]
    pub fn error_status(&self) -> ErrorStatus {
        self.rx.error_status()
    }

    /// Restart the receiver to clear an overrun
    #[inline]
    pub fn clear_overrun(&mut self) {
        self.rx.clear_overrun()
    }

    /// Split into transmit and receive halves
    #[inline]
    pub fn split(self) -> (Tx, Rx) {
        (self.tx, self.rx)
    }

    /// Disable the port and drop every EUSART callback
    pub fn deinit(self) {
        deinit()
    }
}

/// Disable the port and drop every EUSART callback. Also available on split halves.
pub fn deinit() {
    interrupt::detach(Source::EusartTx, &HANDLERS.eusart_tx);
    interrupt::detach(Source::EusartRx, &HANDLERS.eusart_rx);
    HANDLERS.eusart_framing.set(None);
    HANDLERS.eusart_overrun.set(None);
    hw::txen_wr(false);
    hw::cren_wr(false);
    hw::spen_wr(false);
    debug!("eusart: disabled");
}

/// Transmit half
#[derive(Debug)]
pub struct Tx(());

impl Tx {
    #[inline(always)]
    fn send(&mut self, byte: u8) -> nb::Result<(), Error> {
        check_enabled()?;
        if !hw::trmt_rd() {
            return Err(nb::Error::WouldBlock);
        }
        arm_tx_callback();
        hw::tx_wr(byte);
        Ok(())
    }

    #[inline(always)]
    fn flush(&mut self) -> nb::Result<(), Error> {
        if hw::trmt_rd() {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Wait for the transmit shift register to empty, then send `byte`
    pub fn write_byte(&mut self, byte: u8) -> Result {
        check_enabled()?;
        spin_until(hw::trmt_rd)?;
        arm_tx_callback();
        hw::tx_wr(byte);
        Ok(())
    }

    /// Send every byte of `bytes`, blocking on each
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result {
        bytes.iter().try_for_each(|&b| self.write_byte(b))
    }

    /// Send bytes until the transmitter is busy. Returns how many were sent.
    pub fn try_write_bytes(&mut self, bytes: &[u8]) -> usize {
        bytes
            .iter()
            .take_while(|&&b| self.send(b).is_ok())
            .count()
    }
}

fn check_enabled() -> Result {
    if hw::txen_rd() {
        Ok(())
    } else {
        warn!("eusart: transmitter disabled");
        Err(Error::InvalidArgument)
    }
}

/// Receive half
#[derive(Debug)]
pub struct Rx(());

impl Rx {
    #[inline(always)]
    fn recv(&mut self) -> nb::Result<u8, Error> {
        if !hw::rcif_rd() {
            return Err(nb::Error::WouldBlock);
        }
        self.take().map_err(nb::Error::Other)
    }

    // FERR belongs to the byte at the head of the FIFO and clears when it is read
    fn take(&mut self) -> Result<u8> {
        let status = ErrorStatus::from_bits_truncate(hw::status_rd());
        if status.contains(ErrorStatus::OVERRUN) {
            self.clear_overrun();
            return Err(Error::Overrun);
        }
        let byte = hw::rx_rd();
        if status.contains(ErrorStatus::FRAMING) {
            return Err(Error::Framing);
        }
        Ok(byte)
    }

    /// Wait for a byte and return it
    pub fn read_byte(&mut self) -> Result<u8> {
        spin_until(hw::rcif_rd)?;
        self.take()
    }

    /// Receive error flags
    #[inline]
    pub fn error_status(&self) -> ErrorStatus {
        ErrorStatus::from_bits_truncate(hw::status_rd())
    }

    /// Restart the receiver to clear an overrun
    pub fn clear_overrun(&mut self) {
        hw::cren_wr(false);
        hw::cren_wr(true);
        debug!("eusart: overrun cleared");
    }
}

pub(crate) fn service_tx() {
    Source::EusartTx.disable();
    HANDLERS.eusart_tx.fire();
}

pub(crate) fn service_rx() {
    let status = ErrorStatus::from_bits_truncate(hw::status_rd());
    if status.contains(ErrorStatus::FRAMING) && HANDLERS.eusart_framing.is_set() {
        HANDLERS.eusart_framing.fire();
    } else if status.contains(ErrorStatus::OVERRUN) && HANDLERS.eusart_overrun.is_set() {
        HANDLERS.eusart_overrun.fire();
    } else {
        HANDLERS.eusart_rx.fire();
    }
}

mod emb_io {
    use super::*;
    use embedded_io::{ErrorType, Read, ReadReady, Write, WriteReady};
    use nb::block;

    impl ErrorType for Rx {
        type Error = Error;
    }

    impl Read for Rx {
        /// Read one byte into `buf`, blocking until one is available. Returns `Ok(0)` without
        /// blocking if `buf` is empty.
        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            if buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.read_byte()?;
            Ok(1)
        }
    }

    impl ReadReady for Rx {
        fn read_ready(&mut self) -> Result<bool> {
            Ok(hw::rcif_rd())
        }
    }

    impl ErrorType for Tx {
        type Error = Error;
    }

    impl Write for Tx {
        /// Sends only the first byte of `buf`, blocking until the transmitter accepts it.
        /// Returns `Ok(0)` without blocking if `buf` is empty.
        fn write(&mut self, buf: &[u8]) -> Result<usize> {
            if buf.is_empty() {
                return Ok(0);
            }
            self.write_byte(buf[0])?;
            Ok(1)
        }

        fn flush(&mut self) -> Result {
            block!(Tx::flush(self))
        }
    }

    impl WriteReady for Tx {
        fn write_ready(&mut self) -> Result<bool> {
            Ok(hw::trmt_rd())
        }
    }
}

mod ehal_nb1 {
    use super::*;
    use embedded_hal_nb::serial::{ErrorType, Read, Write};

    impl ErrorType for Rx {
        type Error = Error;
    }

    impl Read<u8> for Rx {
        #[inline]
        fn read(&mut self) -> nb::Result<u8, Self::Error> {
            self.recv()
        }
    }

    impl ErrorType for Tx {
        type Error = Error;
    }

    impl Write<u8> for Tx {
        #[inline]
        fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
            self.send(word)
        }

        #[inline]
        fn flush(&mut self) -> nb::Result<(), Self::Error> {
            Tx::flush(self)
        }
    }
}
