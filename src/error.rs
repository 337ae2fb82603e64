//! Result vocabulary shared by every driver.
//!
//! Each operation either succeeds or fails with an [`Error`]. Argument errors are detected
//! before any register is touched, so a failed call leaves the peripheral as it was.
//! Peripheral error flags (framing, overrun, collisions) are reported through their
//! callbacks and status queries rather than through this type, except where a blocking read
//! observes them directly.

/// Driver failure
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// An argument is outside the range the hardware accepts (port, pin, channel, baud rate,
    /// PWM frequency, ...)
    InvalidArgument,
    /// The requested combination of settings cannot be expressed by the hardware
    Unreachable,
    /// An I2C start or stop sequence finished but the bus condition was not observed
    BusConditionMissing,
    /// A bounded busy-wait expired before the hardware status bit changed
    Timeout,
    /// An I2C master primitive was called in the wrong protocol state
    OutOfSequence,
    /// The I2C slave did not acknowledge
    NoAcknowledge,
    /// The MSSP buffer was written while a transfer was still in progress
    WriteCollision,
    /// A received byte was lost because the previous one was not read in time
    Overrun,
    /// A stop bit was not found where expected
    Framing,
}

/// Result of a driver operation
pub type Result<T = ()> = core::result::Result<T, Error>;

mod ehal1 {
    use super::Error;
    use embedded_hal::{digital, i2c, spi};

    impl digital::Error for Error {
        fn kind(&self) -> digital::ErrorKind {
            digital::ErrorKind::Other
        }
    }

    impl i2c::Error for Error {
        fn kind(&self) -> i2c::ErrorKind {
            match self {
                Error::NoAcknowledge => {
                    i2c::ErrorKind::NoAcknowledge(i2c::NoAcknowledgeSource::Unknown)
                }
                Error::BusConditionMissing | Error::WriteCollision => i2c::ErrorKind::Bus,
                Error::Overrun => i2c::ErrorKind::Overrun,
                _ => i2c::ErrorKind::Other,
            }
        }
    }

    impl spi::Error for Error {
        fn kind(&self) -> spi::ErrorKind {
            match self {
                Error::Overrun => spi::ErrorKind::Overrun,
                _ => spi::ErrorKind::Other,
            }
        }
    }
}

mod ehal_nb1 {
    use super::Error;
    use embedded_hal_nb::serial::{self, ErrorKind};

    impl serial::Error for Error {
        fn kind(&self) -> ErrorKind {
            match self {
                Error::Framing => ErrorKind::FrameFormat,
                Error::Overrun => ErrorKind::Overrun,
                _ => ErrorKind::Other,
            }
        }
    }
}

mod emb_io {
    use super::Error;
    use embedded_io::ErrorKind;

    impl embedded_io::Error for Error {
        fn kind(&self) -> ErrorKind {
            match self {
                Error::InvalidArgument => ErrorKind::InvalidInput,
                Error::Timeout => ErrorKind::TimedOut,
                _ => ErrorKind::Other,
            }
        }
    }
}
