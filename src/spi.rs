//! SPI on the MSSP module
//!
//! Configure with [`SpiConfig`] and call [`init`](SpiConfig::init). The pins are fixed: SCK on
//! RC3, SDI on RC4, SDO on RC5 and, for a slave using slave select, SS on RA5.
//!
//! The resulting [`Spi`] exchanges one byte per clocked transfer. It implements
//! [`embedded_hal::spi::SpiBus`] for blocking use and
//! [`embedded_hal_nb::spi::FullDuplex`] for polling use. Every blocking wait gives up with
//! [`Error::Timeout`] after [`SPIN_LIMIT`](crate::config::SPIN_LIMIT) polls, which matters in
//! slave mode where the master drives the clock.

use crate::error::{Error, Result};
use crate::gpio::{self, Direction, Port};
use crate::hw_traits::mssp::{self as hw, sspm};
use crate::interrupt::{self, Irq, Source, HANDLERS};
use crate::util::spin_until;
pub use embedded_hal::spi::{Phase, Polarity};

const SCK_PIN: u8 = 3;
const SDI_PIN: u8 = 4;
const SDO_PIN: u8 = 5;
const SS_PIN: u8 = 5;

/// Master clock source
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiClock {
    /// `Fosc / 4`
    FoscDiv4,
    /// `Fosc / 16`
    FoscDiv16,
    /// `Fosc / 64`
    FoscDiv64,
    /// Timer2 output / 2
    Tmr2Div2,
}

/// When the master samples input data
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SamplePoint {
    /// Middle of the data output time
    Middle,
    /// End of the data output time
    End,
}

/// Master or slave operation
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiMode {
    /// Drive SCK
    Master {
        /// Bit clock
        clock: SpiClock,
        /// Input sample point
        sample: SamplePoint,
    },
    /// Follow an external SCK
    Slave {
        /// Only respond while SS (RA5) is low
        slave_select: bool,
    },
}

impl SpiMode {
    fn sspm(self) -> u8 {
        match self {
            SpiMode::Master { clock, .. } => match clock {
                SpiClock::FoscDiv4 => sspm::SPI_MASTER_DIV4,
                SpiClock::FoscDiv16 => sspm::SPI_MASTER_DIV16,
                SpiClock::FoscDiv64 => sspm::SPI_MASTER_DIV64,
                SpiClock::Tmr2Div2 => sspm::SPI_MASTER_TMR2,
            },
            SpiMode::Slave { slave_select: true } => sspm::SPI_SLAVE_SS,
            SpiMode::Slave { slave_select: false } => sspm::SPI_SLAVE,
        }
    }
}

/// SPI configuration
#[derive(Clone, Copy, Debug)]
pub struct SpiConfig {
    /// Master or slave
    pub mode: SpiMode,
    /// Idle clock level (`CKP`)
    pub polarity: Polarity,
    /// Data capture edge. Capturing on the first transition means data changes on the
    /// active-to-idle edge (`CKE = 1`).
    pub phase: Phase,
    /// Drive SDO
    pub tx_enable: bool,
    /// Take SDI as input
    pub rx_enable: bool,
    /// Transfer-complete callback
    pub interrupt: Option<Irq>,
}

impl SpiConfig {
    /// Disable the module, clear its error flags and receive buffer, program mode, clock
    /// polarity, phase and sample point, set up the pins and callback, then enable the module.
    pub fn init(&self) -> Result<Spi> {
        hw::enable_wr(false);
        hw::errors_clear();
        let _ = hw::buf_rd();

        hw::sspm_wr(self.mode.sspm());
        hw::ckp_wr(self.polarity == Polarity::IdleHigh);
        hw::cke_wr(self.phase == Phase::CaptureOnFirstTransition);
        // The slave must keep SMP clear
        hw::smp_wr(matches!(
            self.mode,
            SpiMode::Master {
                sample: SamplePoint::End,
                ..
            }
        ));

        if self.tx_enable || self.rx_enable {
            let sck = match self.mode {
                SpiMode::Master { .. } => Direction::Output,
                SpiMode::Slave { .. } => Direction::Input,
            };
            gpio::set_direction(Port::C, SCK_PIN, sck);
            if self.tx_enable {
                gpio::set_direction(Port::C, SDO_PIN, Direction::Output);
            }
            if self.rx_enable {
                gpio::set_direction(Port::C, SDI_PIN, Direction::Input);
            }
            if let SpiMode::Slave { slave_select: true } = self.mode {
                gpio::set_direction(Port::A, SS_PIN, Direction::Input);
            }
        } else {
            warn!("spi: neither direction enabled, pins left alone");
        }

        interrupt::attach(Source::Spi, &HANDLERS.spi, self.interrupt);
        hw::enable_wr(true);
        debug!("spi: enabled, SSPM {}", self.mode.sspm());
        Ok(Spi { pending: false })
    }
}

/// Configured SPI port
#[derive(Debug)]
pub struct Spi {
    // A byte was written through `FullDuplex` and has not been read back yet
    pending: bool,
}

impl Spi {
    /// Shift `byte` out and return the byte shifted in at the same time
    pub fn transfer_byte(&mut self, byte: u8) -> Result<u8> {
        hw::errors_clear();
        let _ = hw::buf_rd();
        hw::buf_wr(byte);
        if hw::wcol_rd() {
            hw::errors_clear();
            return Err(Error::WriteCollision);
        }
        spin_until(hw::bf_rd)?;
        self.pending = false;
        Ok(hw::buf_rd())
    }

    /// Exchange `words` in place
    pub fn transfer(&mut self, words: &mut [u8]) -> Result {
        for word in words.iter_mut() {
            *word = self.transfer_byte(*word)?;
        }
        Ok(())
    }

    /// The buffer was written while a transfer was in progress
    #[inline]
    pub fn write_collision(&self) -> bool {
        hw::wcol_rd()
    }

    /// A byte arrived before the previous one was read
    #[inline]
    pub fn overflow(&self) -> bool {
        hw::sspov_rd()
    }

    /// Clear the collision and overflow flags
    #[inline]
    pub fn clear_errors(&mut self) {
        hw::errors_clear()
    }

    /// Disable the module and drop its callback
    pub fn deinit(self) {
        hw::errors_clear();
        let _ = hw::buf_rd();
        interrupt::detach(Source::Spi, &HANDLERS.spi);
        hw::enable_wr(false);
        debug!("spi: disabled");
    }
}

pub(crate) fn service() {
    Source::Spi.clear_flag();
    hw::errors_clear();
    HANDLERS.spi.fire();
}

mod ehal_nb1 {
    use super::*;
    use embedded_hal_nb::spi::FullDuplex;

    impl FullDuplex<u8> for Spi {
        fn read(&mut self) -> nb::Result<u8, Self::Error> {
            if !hw::bf_rd() {
                return Err(nb::Error::WouldBlock);
            }
            self.pending = false;
            Ok(hw::buf_rd())
        }

        fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
            if self.pending {
                return Err(nb::Error::WouldBlock);
            }
            hw::errors_clear();
            hw::buf_wr(word);
            if hw::wcol_rd() {
                hw::errors_clear();
                return Err(nb::Error::Other(Error::WriteCollision));
            }
            self.pending = true;
            Ok(())
        }
    }
}

mod ehal1 {
    use super::*;
    use embedded_hal::spi::{ErrorType, SpiBus};

    impl ErrorType for Spi {
        type Error = Error;
    }

    impl SpiBus<u8> for Spi {
        fn read(&mut self, words: &mut [u8]) -> Result {
            for word in words.iter_mut() {
                *word = self.transfer_byte(0x00)?;
            }
            Ok(())
        }

        fn write(&mut self, words: &[u8]) -> Result {
            for &word in words {
                self.transfer_byte(word)?;
            }
            Ok(())
        }

        fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result {
            for i in 0..read.len().max(write.len()) {
                let rx = self.transfer_byte(write.get(i).copied().unwrap_or(0x00))?;
                if let Some(word) = read.get_mut(i) {
                    *word = rx;
                }
            }
            Ok(())
        }

        fn transfer_in_place(&mut self, words: &mut [u8]) -> Result {
            Spi::transfer(self, words)
        }

        fn flush(&mut self) -> Result {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::pac::{self, pir1, sspcon1, sspstat};
    use crate::sim;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn master() -> SpiConfig {
        SpiConfig {
            mode: SpiMode::Master {
                clock: SpiClock::FoscDiv16,
                sample: SamplePoint::End,
            },
            polarity: Polarity::IdleHigh,
            phase: Phase::CaptureOnFirstTransition,
            tx_enable: true,
            rx_enable: true,
            interrupt: None,
        }
    }

    #[test]
    fn master_setup() {
        let _s = sim::session();
        let _spi = master().init().unwrap();
        // SSPEN, CKP, SSPM = 0b0001
        assert_eq!(sim::peek(pac::SSPCON1), 0b0011_0001);
        assert!(pac::SSPSTAT.is_set(sspstat::SMP));
        assert!(pac::SSPSTAT.is_set(sspstat::CKE));
        let trisc = sim::peek(pac::TRISC);
        assert_eq!(trisc & (1 << SCK_PIN), 0);
        assert_eq!(trisc & (1 << SDO_PIN), 0);
        assert_ne!(trisc & (1 << SDI_PIN), 0);
    }

    #[test]
    fn slave_setup_clears_sample_bit() {
        let _s = sim::session();
        pac::SSPSTAT.set_bit(sspstat::SMP);
        pac::TRISA.write(0x00);
        let cfg = SpiConfig {
            mode: SpiMode::Slave { slave_select: true },
            polarity: Polarity::IdleLow,
            phase: Phase::CaptureOnSecondTransition,
            ..master()
        };
        let _spi = cfg.init().unwrap();
        assert_eq!(sim::peek(pac::SSPCON1), 0b0010_0100);
        assert!(!pac::SSPSTAT.is_set(sspstat::SMP));
        assert!(!pac::SSPSTAT.is_set(sspstat::CKE));
        assert_ne!(sim::peek(pac::TRISC) & (1 << SCK_PIN), 0);
        assert_ne!(sim::peek(pac::TRISA) & (1 << SS_PIN), 0);
    }

    #[test]
    fn loopback_returns_sent_byte() {
        let _s = sim::session();
        let mut spi = master().init().unwrap();
        for b in [0x00u8, 0x5A, 0xA5, 0xFF] {
            assert_eq!(spi.transfer_byte(b), Ok(b));
        }
        assert_eq!(sim::spi_sent(), [0x00, 0x5A, 0xA5, 0xFF]);
    }

    #[test]
    fn slave_reply_is_returned() {
        let _s = sim::session();
        sim::set_spi_miso(Some(0x3C));
        let mut spi = master().init().unwrap();
        let mut buf = [1, 2, 3];
        spi.transfer(&mut buf).unwrap();
        assert_eq!(buf, [0x3C; 3]);
        assert!(!spi.overflow());
    }

    #[test]
    fn transfer_times_out_without_clock() {
        let _s = sim::session();
        let mut spi = master().init().unwrap();
        sim::hold(pac::SSPSTAT, 1 << sspstat::BF);
        assert_eq!(spi.transfer_byte(0x11), Err(Error::Timeout));
    }

    #[test]
    fn status_flags() {
        let _s = sim::session();
        let mut spi = master().init().unwrap();
        pac::SSPBUF.write(1);
        pac::SSPBUF.write(2);
        assert!(spi.overflow());
        sim::raise(pac::SSPCON1, sspcon1::WCOL);
        assert!(spi.write_collision());
        spi.clear_errors();
        assert!(!spi.overflow());
        assert!(!spi.write_collision());
    }

    #[test]
    fn full_duplex_polling() {
        use embedded_hal_nb::spi::FullDuplex;
        let _s = sim::session();
        sim::set_spi_miso(Some(0x99));
        let mut spi = master().init().unwrap();
        assert_eq!(FullDuplex::read(&mut spi), Err(nb::Error::WouldBlock));
        FullDuplex::write(&mut spi, 0x42).unwrap();
        assert_eq!(FullDuplex::write(&mut spi, 0x43), Err(nb::Error::WouldBlock));
        assert_eq!(FullDuplex::read(&mut spi), Ok(0x99));
        FullDuplex::write(&mut spi, 0x43).unwrap();
        assert_eq!(sim::spi_sent(), [0x42, 0x43]);
    }

    #[test]
    fn spi_bus_lengths() {
        use embedded_hal::spi::SpiBus;
        let _s = sim::session();
        let mut spi = master().init().unwrap();
        let mut read = [0u8; 4];
        SpiBus::transfer(&mut spi, &mut read, &[1, 2]).unwrap();
        assert_eq!(read, [1, 2, 0, 0]);
        SpiBus::write(&mut spi, &[7, 8]).unwrap();
        SpiBus::read(&mut spi, &mut read[..1]).unwrap();
        assert_eq!(sim::spi_sent(), [1, 2, 0, 0, 7, 8, 0]);
    }

    static DONE: AtomicUsize = AtomicUsize::new(0);
    fn done() {
        DONE.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn transfer_interrupt() {
        if !config::SPI_INTERRUPT {
            return;
        }
        let _s = sim::session();
        DONE.store(0, Ordering::SeqCst);
        let mut spi = SpiConfig {
            interrupt: Some(Irq::new(done)),
            ..master()
        }
        .init()
        .unwrap();
        assert!(pac::PIE1.is_set(pir1::SSPIF));
        spi.transfer_byte(0x01).unwrap();
        sim::service_interrupts();
        assert_eq!(DONE.load(Ordering::SeqCst), 1);
        assert!(!pac::PIR1.is_set(pir1::SSPIF));

        spi.deinit();
        assert!(!pac::PIE1.is_set(pir1::SSPIF));
        assert!(!pac::SSPCON1.is_set(sspcon1::SSPEN));
    }
}
