//! I2C on the MSSP module
//!
//! SCL is RC3 and SDA is RC4. Both are left as inputs; the module drives them open-drain.
//!
//! Configure with [`I2cConfig`] and call [`init`](I2cConfig::init). A master configuration
//! yields [`I2c::Master`], whose [`I2cMaster`] exposes the bus primitives (start, repeated
//! start, stop, byte write, byte read) and implements [`embedded_hal::i2c::I2c`] on top of them.
//! A slave configuration yields [`I2c::Slave`], driven from the MSSP callback.
//!
//! The master tracks where it is in a transaction:
//!
//! ```text
//! Idle --start--> Started --write--> Addressed --write/read--> Data
//!   ^                                    |                       |
//!   +--------------- stop ---------------+-----------------------+
//!                                        Started <-- repeated start
//! ```
//!
//! A primitive called from the wrong state fails with [`Error::OutOfSequence`] and touches no
//! register. The state follows every sequence that was issued, even when it then fails, so
//! `stop` is always available to release the bus after an error.

use crate::clock::{Clock, Fosc};
use crate::error::{Error, Result};
use crate::gpio::{self, Direction, Port};
use crate::hw_traits::mssp::{self as hw, sspm, Sequence};
use crate::interrupt::{self, Handler, Irq, Source, HANDLERS};
use crate::pac::sspstat;
use crate::util::spin_until;
use core::cell::Cell;
use critical_section::Mutex;

const SCL_PIN: u8 = 3;
const SDA_PIN: u8 = 4;

// Full 10-bit own address while a 10-bit slave is configured
static TEN_BIT_ADDRESS: Mutex<Cell<Option<u16>>> = Mutex::new(Cell::new(None));

/// Own address of a slave
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlaveAddress {
    /// 0..=0x7F
    SevenBit(u8),
    /// 0..=0x3FF
    TenBit(u16),
}

/// Master or slave operation
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cMode {
    /// Bus master
    Master {
        /// SCL frequency in Hz
        clock_hz: u32,
    },
    /// Addressed slave
    Slave {
        /// Own address
        address: SlaveAddress,
        /// Also respond to the general call address
        general_call: bool,
        /// Raise the MSSP interrupt on start and stop conditions too
        interrupts: bool,
    },
}

/// I2C configuration
#[derive(Clone, Copy, Debug)]
pub struct I2cConfig {
    /// Master or slave
    pub mode: I2cMode,
    /// Slew rate control, for 400 kHz operation (`SMP = 0`)
    pub slew_rate: bool,
    /// SMBus input levels (`CKE = 1`)
    pub smbus: bool,
    /// MSSP event callback
    pub interrupt: Option<Irq>,
    /// Called from the MSSP service when a byte arrived before the previous one was read.
    /// Needs `interrupt` to be set.
    pub on_receive_overflow: Option<Handler>,
    /// Bus collision callback
    pub bus_collision: Option<Irq>,
}

/// Acknowledge bit
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ack {
    /// SDA pulled low
    Ack = 0,
    /// SDA left high
    Nack = 1,
}

impl TryFrom<u8> for Ack {
    type Error = Error;

    fn try_from(bit: u8) -> Result<Self> {
        match bit {
            0 => Ok(Ack::Ack),
            1 => Ok(Ack::Nack),
            _ => Err(Error::InvalidArgument),
        }
    }
}

/// Where a master is within a transaction
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MasterState {
    /// No transaction in progress
    Idle,
    /// Start or repeated start sent, address byte next
    Started,
    /// Address byte sent
    Addressed,
    /// At least one data byte transferred
    Data,
}

/// `SSPADD` for a master clocking SCL at `clock_hz`: `Fosc / (4 clock_hz) - 1`
pub fn baud_reload(fosc: &Fosc, clock_hz: u32) -> Result<u8> {
    let div = 4 * u64::from(clock_hz);
    if div == 0 {
        return Err(Error::InvalidArgument);
    }
    match u64::from(fosc.freq()) / div {
        // The baud rate generator reloads from the low 7 bits only
        n @ 1..=0x80 => Ok((n - 1) as u8),
        _ => Err(Error::InvalidArgument),
    }
}

// First address byte of a 10-bit address, 0b11110_A9_A8_0
fn ten_bit_header(address: u16) -> u8 {
    0xF0 | ((address >> 7) as u8 & 0x06)
}

impl I2cConfig {
    /// Disable the module, program mode, address or clock, slew rate and SMBus levels, set up
    /// the pins and callbacks, then enable the module.
    ///
    /// Fails with `InvalidArgument` before touching any register if the clock cannot be
    /// generated from `fosc` or the slave address does not fit its width.
    pub fn init(&self, fosc: &Fosc) -> Result<I2c> {
        let sspadd = match self.mode {
            I2cMode::Master { clock_hz } => baud_reload(fosc, clock_hz)
                .inspect_err(|_| warn!("i2c: clock {} not reachable", clock_hz))?,
            I2cMode::Slave {
                address: SlaveAddress::SevenBit(a),
                ..
            } if a <= 0x7F => a << 1,
            I2cMode::Slave {
                address: SlaveAddress::TenBit(a),
                ..
            } if a <= 0x3FF => ten_bit_header(a),
            I2cMode::Slave { .. } => {
                warn!("i2c: slave address out of range");
                return Err(Error::InvalidArgument);
            }
        };

        hw::enable_wr(false);
        hw::con2_reset();
        critical_section::with(|cs| TEN_BIT_ADDRESS.borrow(cs).set(None));

        match self.mode {
            I2cMode::Master { .. } => {
                hw::gcen_wr(false);
                hw::sspm_wr(sspm::I2C_MASTER);
            }
            I2cMode::Slave {
                address,
                general_call,
                interrupts,
            } => {
                hw::gcen_wr(general_call);
                hw::errors_clear();
                hw::ckp_wr(true);
                let mode = match (address, interrupts) {
                    (SlaveAddress::SevenBit(_), false) => sspm::I2C_SLAVE7,
                    (SlaveAddress::SevenBit(_), true) => sspm::I2C_SLAVE7_SP,
                    (SlaveAddress::TenBit(_), false) => sspm::I2C_SLAVE10,
                    (SlaveAddress::TenBit(_), true) => sspm::I2C_SLAVE10_SP,
                };
                if let SlaveAddress::TenBit(a) = address {
                    critical_section::with(|cs| TEN_BIT_ADDRESS.borrow(cs).set(Some(a)));
                }
                hw::sspm_wr(mode);
            }
        }
        hw::addr_wr(sspadd);

        gpio::set_direction(Port::C, SCL_PIN, Direction::Input);
        gpio::set_direction(Port::C, SDA_PIN, Direction::Input);
        hw::smp_wr(!self.slew_rate);
        hw::cke_wr(self.smbus);

        // Only read from the MSSP service, so written while the source is off
        Source::I2c.disable();
        HANDLERS.i2c_overflow.set(self.on_receive_overflow);
        interrupt::attach(Source::I2c, &HANDLERS.i2c, self.interrupt);
        interrupt::attach(
            Source::I2cBusCollision,
            &HANDLERS.i2c_bus_collision,
            self.bus_collision,
        );

        hw::enable_wr(true);
        debug!("i2c: enabled, SSPADD {}", sspadd);
        Ok(match self.mode {
            I2cMode::Master { .. } => I2c::Master(I2cMaster {
                state: MasterState::Idle,
            }),
            I2cMode::Slave { .. } => I2c::Slave(I2cSlave(())),
        })
    }
}

/// Configured I2C module
#[derive(Debug)]
pub enum I2c {
    /// Master mode
    Master(I2cMaster),
    /// Slave mode
    Slave(I2cSlave),
}

impl I2c {
    /// The master handle, or `InvalidArgument` for a slave configuration
    pub fn into_master(self) -> Result<I2cMaster> {
        match self {
            I2c::Master(m) => Ok(m),
            I2c::Slave(_) => Err(Error::InvalidArgument),
        }
    }

    /// The slave handle, or `InvalidArgument` for a master configuration
    pub fn into_slave(self) -> Result<I2cSlave> {
        match self {
            I2c::Slave(s) => Ok(s),
            I2c::Master(_) => Err(Error::InvalidArgument),
        }
    }

    /// Disable the module and drop its callbacks
    pub fn deinit(self) {
        deinit()
    }
}

fn deinit() {
    hw::enable_wr(false);
    interrupt::detach(Source::I2c, &HANDLERS.i2c);
    interrupt::detach(Source::I2cBusCollision, &HANDLERS.i2c_bus_collision);
    HANDLERS.i2c_overflow.set(None);
    critical_section::with(|cs| TEN_BIT_ADDRESS.borrow(cs).set(None));
    debug!("i2c: disabled");
}

/// Blocking I2C master
#[derive(Debug)]
pub struct I2cMaster {
    state: MasterState,
}

impl I2cMaster {
    /// Current position within a transaction
    #[inline]
    pub fn state(&self) -> MasterState {
        self.state
    }

    fn run_sequence(&mut self, seq: Sequence) -> Result {
        hw::sequence_start(seq);
        let done = spin_until(|| !hw::sequence_busy(seq));
        hw::sspif_clear();
        done
    }

    /// Send a start condition. Fails with `BusConditionMissing` if the module did not see it
    /// on the bus.
    pub fn start(&mut self) -> Result {
        if self.state != MasterState::Idle {
            return Err(Error::OutOfSequence);
        }
        self.state = MasterState::Started;
        self.run_sequence(Sequence::Start)?;
        if hw::stat_rd(sspstat::S) {
            Ok(())
        } else {
            Err(Error::BusConditionMissing)
        }
    }

    /// Send a repeated start condition
    pub fn repeated_start(&mut self) -> Result {
        if !matches!(self.state, MasterState::Addressed | MasterState::Data) {
            return Err(Error::OutOfSequence);
        }
        self.state = MasterState::Started;
        self.run_sequence(Sequence::RepeatedStart)
    }

    /// Send a stop condition. Fails with `BusConditionMissing` if the module did not see it on
    /// the bus.
    pub fn stop(&mut self) -> Result {
        if self.state == MasterState::Idle {
            return Err(Error::OutOfSequence);
        }
        self.state = MasterState::Idle;
        self.run_sequence(Sequence::Stop)?;
        if hw::stat_rd(sspstat::P) {
            Ok(())
        } else {
            Err(Error::BusConditionMissing)
        }
    }

    /// Send one byte and return the slave's acknowledge. The first byte after a start is the
    /// address byte.
    pub fn write(&mut self, byte: u8) -> Result<Ack> {
        self.state = match self.state {
            MasterState::Idle => return Err(Error::OutOfSequence),
            MasterState::Started => MasterState::Addressed,
            MasterState::Addressed | MasterState::Data => MasterState::Data,
        };
        hw::buf_wr(byte);
        if hw::wcol_rd() {
            hw::errors_clear();
            return Err(Error::WriteCollision);
        }
        spin_until(hw::sspif_rd)?;
        hw::sspif_clear();
        Ok(if hw::ackstat_rd() { Ack::Nack } else { Ack::Ack })
    }

    fn receive(&mut self) -> Result<u8> {
        if !matches!(self.state, MasterState::Addressed | MasterState::Data) {
            return Err(Error::OutOfSequence);
        }
        self.state = MasterState::Data;
        hw::sequence_start(Sequence::Receive);
        spin_until(hw::bf_rd)?;
        Ok(hw::buf_rd())
    }

    fn acknowledge(&mut self, ack: Ack) -> Result {
        hw::ackdt_wr(ack == Ack::Nack);
        self.run_sequence(Sequence::Acknowledge)
    }

    /// Receive one byte, then answer it with `ack`
    pub fn read(&mut self, ack: Ack) -> Result<u8> {
        let byte = self.receive()?;
        self.acknowledge(ack)?;
        Ok(byte)
    }

    /// Receive one byte and answer it with the raw acknowledge bit `ack` (0 = ACK, 1 = NACK).
    /// Any other value skips the acknowledge sequence, leaving the caller to run it.
    pub fn read_raw_ack(&mut self, ack: u8) -> Result<u8> {
        let byte = self.receive()?;
        if let Ok(ack) = Ack::try_from(ack) {
            self.acknowledge(ack)?;
        }
        Ok(byte)
    }

    fn expect_ack(&mut self, byte: u8) -> Result {
        match self.write(byte)? {
            Ack::Ack => Ok(()),
            Ack::Nack => Err(Error::NoAcknowledge),
        }
    }

    // Runs the operations; the caller sends the final stop
    fn run(
        &mut self,
        address: impl Fn(&mut Self, bool) -> Result,
        operations: &mut [embedded_hal::i2c::Operation<'_>],
    ) -> Result {
        use embedded_hal::i2c::Operation;

        let mut last_read = None;
        for i in 0..operations.len() {
            let is_read = matches!(operations[i], Operation::Read(_));
            if last_read != Some(is_read) {
                if last_read.is_none() {
                    self.start()?;
                } else {
                    self.repeated_start()?;
                }
                address(self, is_read)?;
                last_read = Some(is_read);
            }
            // The last byte before a stop or a direction change is not acknowledged
            let nack_last = !matches!(operations.get(i + 1), Some(Operation::Read(_)));
            match &mut operations[i] {
                Operation::Write(bytes) => {
                    for &b in bytes.iter() {
                        self.expect_ack(b)?;
                    }
                }
                Operation::Read(buf) => {
                    let len = buf.len();
                    for (j, b) in buf.iter_mut().enumerate() {
                        let ack = if nack_last && j + 1 == len {
                            Ack::Nack
                        } else {
                            Ack::Ack
                        };
                        *b = self.read(ack)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn transact(
        &mut self,
        address: impl Fn(&mut Self, bool) -> Result,
        operations: &mut [embedded_hal::i2c::Operation<'_>],
    ) -> Result {
        use embedded_hal::i2c::Operation;

        if operations
            .iter()
            .any(|op| matches!(op, Operation::Read(buf) if buf.is_empty()))
        {
            warn!("i2c: empty read");
            return Err(Error::InvalidArgument);
        }
        let result = self.run(address, operations);
        if self.state == MasterState::Idle {
            return result;
        }
        let stopped = self.stop();
        result.and(stopped)
    }

    /// Disable the module and drop its callbacks
    pub fn deinit(self) {
        deinit()
    }
}

/// I2C slave, serviced from the MSSP callback
#[derive(Debug)]
pub struct I2cSlave(());

impl I2cSlave {
    /// The last byte received was data rather than an address
    #[inline]
    pub fn is_data(&self) -> bool {
        hw::stat_rd(sspstat::D_A)
    }

    /// The master asked to read from this slave
    #[inline]
    pub fn is_read_request(&self) -> bool {
        hw::stat_rd(sspstat::R_W)
    }

    /// Take the received byte
    #[inline]
    pub fn read(&mut self) -> u8 {
        hw::buf_rd()
    }

    /// Load `byte` for the master to clock out, then release SCL
    pub fn write(&mut self, byte: u8) -> Result {
        hw::buf_wr(byte);
        if hw::wcol_rd() {
            hw::errors_clear();
            return Err(Error::WriteCollision);
        }
        hw::ckp_wr(true);
        Ok(())
    }

    /// Release SCL after it was stretched
    #[inline]
    pub fn release_clock(&mut self) {
        hw::ckp_wr(true)
    }

    /// A byte arrived before the previous one was read
    #[inline]
    pub fn overflow(&self) -> bool {
        hw::sspov_rd()
    }

    /// Disable the module and drop its callbacks
    pub fn deinit(self) {
        deinit()
    }
}

pub(crate) fn service() {
    Source::I2c.clear_flag();
    if hw::stat_rd(sspstat::UA) {
        if let Some(address) = critical_section::with(|cs| TEN_BIT_ADDRESS.borrow(cs).get()) {
            let header = ten_bit_header(address);
            let next = if hw::addr_rd() == header {
                address as u8
            } else {
                header
            };
            hw::addr_wr(next);
        }
    }
    if hw::sspov_rd() {
        hw::sspov_clear();
        HANDLERS.i2c_overflow.fire();
    }
    HANDLERS.i2c.fire();
}

pub(crate) fn service_bus_collision() {
    Source::I2cBusCollision.clear_flag();
    HANDLERS.i2c_bus_collision.fire();
}

#[cfg(not(target_os = "none"))]
pub(crate) fn reset() {
    critical_section::with(|cs| TEN_BIT_ADDRESS.borrow(cs).set(None));
}

mod ehal1 {
    use super::*;
    use embedded_hal::i2c::{ErrorType, I2c, Operation, SevenBitAddress, TenBitAddress};

    impl ErrorType for I2cMaster {
        type Error = Error;
    }

    impl I2c<SevenBitAddress> for I2cMaster {
        fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result {
            self.transact(
                |m, read| m.expect_ack((address << 1) | u8::from(read)),
                operations,
            )
        }
    }

    impl I2c<TenBitAddress> for I2cMaster {
        /// A read after a write reuses the full address with a repeated start. A transaction
        /// that opens with a read sends the full write address first.
        fn transaction(&mut self, address: u16, operations: &mut [Operation<'_>]) -> Result {
            let header = ten_bit_header(address);
            self.transact(
                |m, read| {
                    m.expect_ack(header)?;
                    m.expect_ack(address as u8)?;
                    if read {
                        m.repeated_start()?;
                        m.expect_ack(header | 1)?;
                    }
                    Ok(())
                },
                operations,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockConfig;
    use crate::config;
    use crate::pac::{self, pir1, pir2, sspcon1, sspcon2};
    use crate::sim;
    use embedded_hal::i2c::I2c as EhalI2c;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fosc() -> Fosc {
        ClockConfig::primary(4_000_000).freeze().unwrap()
    }

    fn master_cfg() -> I2cConfig {
        I2cConfig {
            mode: I2cMode::Master { clock_hz: 100_000 },
            slew_rate: false,
            smbus: false,
            interrupt: None,
            on_receive_overflow: None,
            bus_collision: None,
        }
    }

    fn master() -> I2cMaster {
        master_cfg().init(&fosc()).unwrap().into_master().unwrap()
    }

    #[test]
    fn master_setup() {
        let _s = sim::session();
        let _m = master();
        // 4 MHz / (4 * 100 kHz) - 1
        assert_eq!(sim::peek(pac::SSPADD), 9);
        assert_eq!(sim::peek(pac::SSPCON1), 0b0010_1000);
        assert!(pac::SSPSTAT.is_set(sspstat::SMP));
        assert!(!pac::SSPSTAT.is_set(sspstat::CKE));
        assert_eq!(sim::peek(pac::TRISC) & 0x18, 0x18);
    }

    #[test]
    fn clock_out_of_range() {
        let _s = sim::session();
        let f = fosc();
        assert_eq!(baud_reload(&f, 0), Err(Error::InvalidArgument));
        // Would need SSPADD = 199
        assert_eq!(baud_reload(&f, 5_000), Err(Error::InvalidArgument));
        assert_eq!(baud_reload(&f, 2_000_000), Err(Error::InvalidArgument));
        assert_eq!(baud_reload(&f, 400_000), Ok(1));

        let writes = sim::write_count();
        let cfg = I2cConfig {
            mode: I2cMode::Master { clock_hz: 5_000 },
            ..master_cfg()
        };
        assert_eq!(cfg.init(&f).unwrap_err(), Error::InvalidArgument);
        assert_eq!(sim::write_count(), writes);
    }

    #[test]
    fn write_two_bytes_to_0x50() {
        let _s = sim::session();
        let mut m = master();
        m.start().unwrap();
        assert_eq!(m.state(), MasterState::Started);
        assert_eq!(m.write(0xA0), Ok(Ack::Ack));
        assert_eq!(m.state(), MasterState::Addressed);
        assert_eq!(m.write(0x00), Ok(Ack::Ack));
        assert_eq!(m.state(), MasterState::Data);
        m.stop().unwrap();
        assert_eq!(m.state(), MasterState::Idle);
        assert_eq!(sim::i2c_sent(), [0xA0, 0x00]);
        assert!(!pac::PIR1.is_set(pir1::SSPIF));
    }

    #[test]
    fn out_of_sequence_touches_nothing() {
        let _s = sim::session();
        let mut m = master();
        let writes = sim::write_count();
        assert_eq!(m.write(0xA0), Err(Error::OutOfSequence));
        assert_eq!(m.read(Ack::Ack), Err(Error::OutOfSequence));
        assert_eq!(m.stop(), Err(Error::OutOfSequence));
        assert_eq!(m.repeated_start(), Err(Error::OutOfSequence));
        m.start().unwrap();
        let writes_after_start = sim::write_count();
        assert!(writes_after_start > writes);
        assert_eq!(m.start(), Err(Error::OutOfSequence));
        assert_eq!(m.read(Ack::Ack), Err(Error::OutOfSequence));
        assert_eq!(m.repeated_start(), Err(Error::OutOfSequence));
        assert_eq!(sim::write_count(), writes_after_start);
    }

    #[test]
    fn missing_bus_conditions() {
        let _s = sim::session();
        let mut m = master();
        sim::hold(pac::SSPSTAT, (1 << sspstat::S) | (1 << sspstat::P));
        assert_eq!(m.start(), Err(Error::BusConditionMissing));
        assert_eq!(m.stop(), Err(Error::BusConditionMissing));
        assert_eq!(m.state(), MasterState::Idle);
    }

    #[test]
    fn stuck_sequence_times_out() {
        let _s = sim::session();
        let mut m = master();
        sim::hold(pac::SSPCON2, 1 << sspcon2::SEN);
        assert_eq!(m.start(), Err(Error::Timeout));
    }

    #[test]
    fn nack_is_reported() {
        let _s = sim::session();
        sim::set_i2c_ack(false);
        let mut m = master();
        m.start().unwrap();
        assert_eq!(m.write(0xA0), Ok(Ack::Nack));
        m.stop().unwrap();
    }

    #[test]
    fn read_acknowledges_as_asked() {
        let _s = sim::session();
        sim::set_i2c_rx(0x7E);
        let mut m = master();
        m.start().unwrap();
        m.write(0xA1).unwrap();
        assert_eq!(m.read(Ack::Ack), Ok(0x7E));
        assert_eq!(m.read(Ack::Nack), Ok(0x7E));
        assert_eq!(m.read_raw_ack(0), Ok(0x7E));
        assert_eq!(sim::i2c_acks_sent(), [true, false, true]);
        // No acknowledge sequence for a value outside ACK/NACK
        assert_eq!(m.read_raw_ack(0xFF), Ok(0x7E));
        assert_eq!(sim::i2c_acks_sent().len(), 3);
        m.stop().unwrap();
    }

    #[test]
    fn ehal_write_read() {
        let _s = sim::session();
        sim::set_i2c_rx(0x42);
        let mut m = master();
        let mut buf = [0u8; 2];
        EhalI2c::write_read(&mut m, 0x50u8, &[0x10], &mut buf).unwrap();
        assert_eq!(buf, [0x42, 0x42]);
        assert_eq!(sim::i2c_sent(), [0xA0, 0x10, 0xA1]);
        assert_eq!(sim::i2c_acks_sent(), [true, false]);
        assert_eq!(m.state(), MasterState::Idle);
    }

    #[test]
    fn ehal_nack_stops_bus() {
        let _s = sim::session();
        sim::set_i2c_ack(false);
        let mut m = master();
        assert_eq!(EhalI2c::write(&mut m, 0x50u8, &[1, 2]), Err(Error::NoAcknowledge));
        assert_eq!(m.state(), MasterState::Idle);
        assert!(pac::SSPSTAT.is_set(sspstat::P));
        assert_eq!(sim::i2c_sent(), [0xA0]);
    }

    #[test]
    fn ehal_empty_read_rejected() {
        let _s = sim::session();
        let mut m = master();
        let writes = sim::write_count();
        assert_eq!(
            EhalI2c::read(&mut m, 0x50u8, &mut []),
            Err(Error::InvalidArgument)
        );
        let mut buf = [0u8; 0];
        assert_eq!(
            EhalI2c::write_read(&mut m, 0x50u8, &[0x10], &mut buf),
            Err(Error::InvalidArgument)
        );
        assert_eq!(sim::write_count(), writes);
        assert!(sim::i2c_sent().is_empty());
        assert_eq!(m.state(), MasterState::Idle);
    }

    #[test]
    fn ehal_ten_bit_read() {
        let _s = sim::session();
        sim::set_i2c_rx(0x01);
        let mut m = master();
        let mut buf = [0u8; 1];
        EhalI2c::read(&mut m, 0x2A5u16, &mut buf).unwrap();
        assert_eq!(sim::i2c_sent(), [0xF4, 0xA5, 0xF5]);
        assert_eq!(buf, [0x01]);
    }

    #[test]
    fn slave_setup() {
        let _s = sim::session();
        pac::SSPCON1.write(1 << sspcon1::SSPOV);
        let cfg = I2cConfig {
            mode: I2cMode::Slave {
                address: SlaveAddress::SevenBit(0x50),
                general_call: true,
                interrupts: false,
            },
            slew_rate: true,
            smbus: true,
            ..master_cfg()
        };
        let i2c = cfg.init(&fosc()).unwrap();
        assert_eq!(sim::peek(pac::SSPADD), 0xA0);
        // SSPEN, CKP, SSPM = 0b0110
        assert_eq!(sim::peek(pac::SSPCON1), 0b0011_0110);
        assert!(pac::SSPCON2.is_set(sspcon2::GCEN));
        assert!(!pac::SSPSTAT.is_set(sspstat::SMP));
        assert!(pac::SSPSTAT.is_set(sspstat::CKE));
        assert!(i2c.into_master().is_err());
    }

    #[test]
    fn slave_address_range() {
        let _s = sim::session();
        let mut cfg = I2cConfig {
            mode: I2cMode::Slave {
                address: SlaveAddress::SevenBit(0x80),
                general_call: false,
                interrupts: true,
            },
            ..master_cfg()
        };
        assert_eq!(cfg.init(&fosc()).unwrap_err(), Error::InvalidArgument);
        cfg.mode = I2cMode::Slave {
            address: SlaveAddress::TenBit(0x400),
            general_call: false,
            interrupts: true,
        };
        assert_eq!(cfg.init(&fosc()).unwrap_err(), Error::InvalidArgument);
        cfg.mode = I2cMode::Slave {
            address: SlaveAddress::TenBit(0x3FF),
            general_call: false,
            interrupts: true,
        };
        cfg.init(&fosc()).unwrap().into_slave().unwrap();
        assert_eq!(sim::peek(pac::SSPADD), 0xF6);
        assert_eq!(sim::peek(pac::SSPCON1) & 0x0F, 0xF);
    }

    static EVENTS: AtomicUsize = AtomicUsize::new(0);
    static OVERFLOWS: AtomicUsize = AtomicUsize::new(0);
    static COLLISIONS: AtomicUsize = AtomicUsize::new(0);
    fn event() {
        EVENTS.fetch_add(1, Ordering::SeqCst);
    }
    fn overflow() {
        OVERFLOWS.fetch_add(1, Ordering::SeqCst);
    }
    fn collision() {
        COLLISIONS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn slave_callbacks() {
        if !(config::I2C_INTERRUPT && config::I2C_BUS_COLLISION_INTERRUPT) {
            return;
        }
        let _s = sim::session();
        EVENTS.store(0, Ordering::SeqCst);
        OVERFLOWS.store(0, Ordering::SeqCst);
        COLLISIONS.store(0, Ordering::SeqCst);
        let cfg = I2cConfig {
            mode: I2cMode::Slave {
                address: SlaveAddress::TenBit(0x2A5),
                general_call: false,
                interrupts: false,
            },
            interrupt: Some(Irq::new(event)),
            on_receive_overflow: Some(overflow),
            bus_collision: Some(Irq::new(collision)),
            ..master_cfg()
        };
        let _slave = cfg.init(&fosc()).unwrap().into_slave().unwrap();
        assert_eq!(sim::peek(pac::SSPADD), 0xF4);

        // Address high byte matched, module asks for the low byte
        sim::raise(pac::SSPSTAT, sspstat::UA);
        sim::raise(pac::PIR1, pir1::SSPIF);
        sim::service_interrupts();
        assert_eq!(sim::peek(pac::SSPADD), 0xA5);
        assert_eq!(EVENTS.load(Ordering::SeqCst), 1);

        sim::raise(pac::SSPCON1, sspcon1::SSPOV);
        sim::raise(pac::PIR1, pir1::SSPIF);
        sim::service_interrupts();
        assert_eq!(OVERFLOWS.load(Ordering::SeqCst), 1);
        assert_eq!(EVENTS.load(Ordering::SeqCst), 2);
        assert!(!pac::SSPCON1.is_set(sspcon1::SSPOV));

        sim::raise(pac::PIR2, pir2::BCLIF);
        sim::service_interrupts();
        assert_eq!(COLLISIONS.load(Ordering::SeqCst), 1);
        assert!(!pac::PIR2.is_set(pir2::BCLIF));
    }

    #[test]
    fn reinit_is_idempotent() {
        let _s = sim::session();
        let cfg = master_cfg();
        cfg.init(&fosc()).unwrap().deinit();
        cfg.init(&fosc()).unwrap();
        let regs = [pac::SSPCON1, pac::SSPCON2, pac::SSPSTAT, pac::SSPADD];
        let first: Vec<u8> = regs.iter().map(|&r| sim::peek(r)).collect();
        cfg.init(&fosc()).unwrap();
        let second: Vec<u8> = regs.iter().map(|&r| sim::peek(r)).collect();
        assert_eq!(first, second);
    }
}
