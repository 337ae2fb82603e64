//! GPIO
//!
//! Pins are described by a [`PinConfig`]: port, pin number, direction and initial level. The
//! config is applied with [`PinConfig::init`], which returns a [`Pin`] handle implementing the
//! `embedded-hal` digital traits. The config methods can also be used directly, the way the
//! board-level drivers do.
//!
//! Output levels are always written to the `LATx` latch rather than to `PORTx`, so a
//! read-modify-write on one pin never copies the electrical state of another pin into its latch.
//! Pin reads sample `PORTx`. Whole-port reads through [`Port::read`] return the latch; use
//! [`Port::read_input`] to sample the pins.

use crate::error::{Error, Result};
use crate::hw_traits::gpio::{PortRegs, PORTS};
use crate::util::BitsExt;
use core::convert::Infallible;

/// GPIO port
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    /// Port A
    A = 0,
    /// Port B
    B = 1,
    /// Port C
    C = 2,
    /// Port D
    D = 3,
    /// Port E (RE0..RE2)
    E = 4,
}

impl TryFrom<u8> for Port {
    type Error = Error;

    fn try_from(index: u8) -> Result<Self> {
        match index {
            0 => Ok(Port::A),
            1 => Ok(Port::B),
            2 => Ok(Port::C),
            3 => Ok(Port::D),
            4 => Ok(Port::E),
            _ => Err(Error::InvalidArgument),
        }
    }
}

/// Pin direction, encoded as the `TRISx` bit
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Driven by the latch
    Output = 0,
    /// High impedance
    Input = 1,
}

/// Pin level
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Logic {
    /// 0
    Low = 0,
    /// 1
    High = 1,
}

impl From<bool> for Logic {
    #[inline(always)]
    fn from(high: bool) -> Self {
        if high {
            Logic::High
        } else {
            Logic::Low
        }
    }
}

impl core::ops::Not for Logic {
    type Output = Logic;

    fn not(self) -> Logic {
        match self {
            Logic::Low => Logic::High,
            Logic::High => Logic::Low,
        }
    }
}

impl Port {
    #[inline(always)]
    fn regs(self) -> &'static PortRegs {
        &PORTS[self as usize]
    }

    /// Write the whole `TRISx` register (1 = input)
    pub fn direction_init(self, tris: u8) {
        self.regs().tris_wr(tris)
    }

    /// Read the whole `TRISx` register
    pub fn direction(self) -> u8 {
        self.regs().tris_rd()
    }

    /// Write the whole `LATx` register
    pub fn write(self, levels: u8) {
        self.regs().lat_wr(levels)
    }

    /// Read back the whole `LATx` register
    pub fn read(self) -> u8 {
        self.regs().lat_rd()
    }

    /// Sample the whole `PORTx` register
    pub fn read_input(self) -> u8 {
        self.regs().port_rd()
    }

    /// Invert every latch bit
    pub fn toggle(self) {
        self.regs().lat_toggle(0xFF)
    }
}

/// Write `TRISx` of port number `port`
pub fn port_direction_init(port: u8, tris: u8) -> Result {
    Port::try_from(port).map(|p| p.direction_init(tris))
}

/// Read `TRISx` of port number `port`
pub fn port_direction(port: u8) -> Result<u8> {
    Port::try_from(port).map(Port::direction)
}

/// Write `LATx` of port number `port`
pub fn port_write(port: u8, levels: u8) -> Result {
    Port::try_from(port).map(|p| p.write(levels))
}

/// Read `LATx` of port number `port`
pub fn port_read(port: u8) -> Result<u8> {
    Port::try_from(port).map(Port::read)
}

/// Invert `LATx` of port number `port`
pub fn port_toggle(port: u8) -> Result {
    Port::try_from(port).map(Port::toggle)
}

// Used by the peripheral drivers to claim their pins. Pin numbers are constants there.
#[inline(always)]
pub(crate) fn set_direction(port: Port, pin: u8, direction: Direction) {
    port.regs().set_input(pin, direction == Direction::Input)
}

/// Pin descriptor
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinConfig {
    /// Port the pin belongs to
    pub port: Port,
    /// Pin number within the port, 0..=7
    pub pin: u8,
    /// Direction applied by `direction_init` and `init`
    pub direction: Direction,
    /// Level applied by `init`
    pub logic: Logic,
}

impl PinConfig {
    /// New pin descriptor. The pin number is checked when the descriptor is used.
    pub const fn new(port: Port, pin: u8, direction: Direction, logic: Logic) -> Self {
        PinConfig {
            port,
            pin,
            direction,
            logic,
        }
    }

    /// New pin descriptor from raw port and pin indices. Port 5 and above or pin 8 and above
    /// are rejected.
    pub fn from_raw(port: u8, pin: u8, direction: Direction, logic: Logic) -> Result<Self> {
        let port = Port::try_from(port)?;
        if pin > 7 {
            return Err(Error::InvalidArgument);
        }
        Ok(PinConfig::new(port, pin, direction, logic))
    }

    #[inline]
    fn checked(&self) -> Result<(&'static PortRegs, u8)> {
        if self.pin > 7 {
            warn!("gpio: pin {} out of range", self.pin);
            return Err(Error::InvalidArgument);
        }
        Ok((self.port.regs(), 0u8.set(self.pin)))
    }

    /// Program the pin direction
    pub fn direction_init(&self) -> Result {
        let (regs, mask) = self.checked()?;
        match self.direction {
            Direction::Output => regs.tris_clear(mask),
            Direction::Input => regs.tris_set(mask),
        }
        Ok(())
    }

    /// Read the pin direction back from `TRISx`
    pub fn direction(&self) -> Result<Direction> {
        let (regs, mask) = self.checked()?;
        Ok(if regs.tris_rd() & mask != 0 {
            Direction::Input
        } else {
            Direction::Output
        })
    }

    /// Program direction then initial level, and return a handle to the pin
    pub fn init(&self) -> Result<Pin> {
        self.direction_init()?;
        self.write(self.logic)?;
        Ok(Pin {
            port: self.port,
            pin: self.pin,
        })
    }

    /// Drive the pin latch
    pub fn write(&self, logic: Logic) -> Result {
        let (regs, mask) = self.checked()?;
        match logic {
            Logic::Low => regs.lat_clear(mask),
            Logic::High => regs.lat_set(mask),
        }
        Ok(())
    }

    /// Sample the pin level from `PORTx`
    pub fn read(&self) -> Result<Logic> {
        let (regs, mask) = self.checked()?;
        Ok(Logic::from(regs.port_rd() & mask != 0))
    }

    /// Invert the pin latch
    pub fn toggle(&self) -> Result {
        let (regs, mask) = self.checked()?;
        regs.lat_toggle(mask);
        Ok(())
    }
}

/// Handle to an initialised pin
#[derive(Debug)]
pub struct Pin {
    port: Port,
    pin: u8,
}

impl Pin {
    #[inline(always)]
    fn regs(&self) -> &'static PortRegs {
        self.port.regs()
    }

    #[inline(always)]
    fn mask(&self) -> u8 {
        0u8.set(self.pin)
    }

    /// Port of the pin
    pub fn port(&self) -> Port {
        self.port
    }

    /// Pin number within the port
    pub fn pin(&self) -> u8 {
        self.pin
    }

    /// Change the pin direction
    pub fn set_direction(&mut self, direction: Direction) {
        set_direction(self.port, self.pin, direction)
    }

    /// Drive the pin latch
    pub fn write(&mut self, logic: Logic) {
        match logic {
            Logic::Low => self.regs().lat_clear(self.mask()),
            Logic::High => self.regs().lat_set(self.mask()),
        }
    }

    /// Sample the pin level
    pub fn read(&self) -> Logic {
        Logic::from(self.regs().port_rd() & self.mask() != 0)
    }

    /// Invert the pin latch
    pub fn toggle(&mut self) {
        self.regs().lat_toggle(self.mask())
    }
}

mod ehal1 {
    use super::*;
    use embedded_hal::digital::{ErrorType, InputPin, OutputPin, StatefulOutputPin};

    impl ErrorType for Pin {
        type Error = Infallible;
    }

    impl OutputPin for Pin {
        fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
            self.write(Logic::Low);
            Ok(())
        }

        fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
            self.write(Logic::High);
            Ok(())
        }
    }

    impl StatefulOutputPin for Pin {
        fn is_set_high(&mut self) -> core::result::Result<bool, Self::Error> {
            Ok(self.regs().lat_rd() & self.mask() != 0)
        }

        fn is_set_low(&mut self) -> core::result::Result<bool, Self::Error> {
            Ok(self.regs().lat_rd() & self.mask() == 0)
        }

        fn toggle(&mut self) -> core::result::Result<(), Self::Error> {
            Pin::toggle(self);
            Ok(())
        }
    }

    impl InputPin for Pin {
        fn is_high(&mut self) -> core::result::Result<bool, Self::Error> {
            Ok(self.read() == Logic::High)
        }

        fn is_low(&mut self) -> core::result::Result<bool, Self::Error> {
            Ok(self.read() == Logic::Low)
        }
    }
}
