//! Build-time configuration.
//!
//! Each Cargo feature that selects an interrupt source is mirrored here as a `bool` constant so
//! drivers can write `if config::ADC_INTERRUPT { .. }` and let the optimiser drop the disabled
//! arm. A source whose switch is off is never enabled by its driver and never visited by the
//! dispatcher.

/// Two-level interrupt priority (`RCON.IPEN`) is in use
pub const PRIORITY_LEVELS: bool = cfg!(feature = "priority-levels");

/// INT0, INT1 and INT2
pub const EXT_INTERRUPT: bool = cfg!(feature = "ext-interrupt");
/// RB4 to RB7 change
pub const PIN_CHANGE_INTERRUPT: bool = cfg!(feature = "pin-change-interrupt");
/// A/D conversion complete
pub const ADC_INTERRUPT: bool = cfg!(feature = "adc-interrupt");
/// Timer0 overflow
pub const TIMER0_INTERRUPT: bool = cfg!(feature = "timer0-interrupt");
/// Timer1 overflow
pub const TIMER1_INTERRUPT: bool = cfg!(feature = "timer1-interrupt");
/// Timer2 period match
pub const TIMER2_INTERRUPT: bool = cfg!(feature = "timer2-interrupt");
/// Timer3 overflow
pub const TIMER3_INTERRUPT: bool = cfg!(feature = "timer3-interrupt");
/// CCP1 capture/compare event
pub const CCP1_INTERRUPT: bool = cfg!(feature = "ccp1-interrupt");
/// CCP2 capture/compare event
pub const CCP2_INTERRUPT: bool = cfg!(feature = "ccp2-interrupt");
/// EUSART transmit buffer empty
pub const EUSART_TX_INTERRUPT: bool = cfg!(feature = "eusart-tx-interrupt");
/// EUSART byte received
pub const EUSART_RX_INTERRUPT: bool = cfg!(feature = "eusart-rx-interrupt");
/// MSSP event in SPI mode
pub const SPI_INTERRUPT: bool = cfg!(feature = "spi-interrupt");
/// MSSP event in I2C mode
pub const I2C_INTERRUPT: bool = cfg!(feature = "i2c-interrupt");
/// MSSP bus collision
pub const I2C_BUS_COLLISION_INTERRUPT: bool = cfg!(feature = "i2c-bus-collision-interrupt");

/// Number of polls a blocking operation makes before giving up with
/// [`Error::Timeout`](crate::Error::Timeout)
pub const SPIN_LIMIT: u32 = 100_000;
