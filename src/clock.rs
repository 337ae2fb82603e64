//! System clock selection.
//!
//! The oscillator mode of the primary oscillator is fixed by the configuration words, so at run
//! time the choice is between that primary oscillator and the internal oscillator block (with
//! its optional 4x PLL). [`ClockConfig::freeze`] applies the selection and produces an [`Fosc`]
//! clock object, which the drivers that derive timing from the oscillator (EUSART, I2C master,
//! PWM) take by reference.

use crate::error::{Error, Result};
use crate::pac::{self, osccon, osctune};
use crate::util::spin_until;

/// Internal oscillator block output frequency, in `OSCCON.IRCF` order
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InternalFreq {
    /// 31 kHz
    Khz31 = 0,
    /// 125 kHz
    Khz125 = 1,
    /// 250 kHz
    Khz250 = 2,
    /// 500 kHz
    Khz500 = 3,
    /// 1 MHz
    Mhz1 = 4,
    /// 2 MHz
    Mhz2 = 5,
    /// 4 MHz
    Mhz4 = 6,
    /// 8 MHz
    Mhz8 = 7,
}

impl InternalFreq {
    const fn hz(self) -> u32 {
        match self {
            InternalFreq::Khz31 => 31_250,
            InternalFreq::Khz125 => 125_000,
            InternalFreq::Khz250 => 250_000,
            InternalFreq::Khz500 => 500_000,
            InternalFreq::Mhz1 => 1_000_000,
            InternalFreq::Mhz2 => 2_000_000,
            InternalFreq::Mhz4 => 4_000_000,
            InternalFreq::Mhz8 => 8_000_000,
        }
    }
}

#[derive(Clone, Copy)]
enum Source {
    Primary(u32),
    Internal(InternalFreq),
}

/// Builder object containing the system clock selection
#[derive(Clone, Copy)]
pub struct ClockConfig {
    source: Source,
    pll: bool,
}

impl ClockConfig {
    /// Run from the primary oscillator, whose mode and resulting frequency `fosc_hz` are set by
    /// the configuration words (including HSPLL)
    pub const fn primary(fosc_hz: u32) -> Self {
        ClockConfig {
            source: Source::Primary(fosc_hz),
            pll: false,
        }
    }

    /// Run from the internal oscillator block
    pub const fn internal(freq: InternalFreq) -> Self {
        ClockConfig {
            source: Source::Internal(freq),
            pll: false,
        }
    }

    /// Multiply the internal oscillator by 4. Only the 4 MHz and 8 MHz settings accept the PLL.
    pub const fn pll(mut self) -> Self {
        self.pll = true;
        self
    }

    fn fosc_hz(&self) -> Result<u32> {
        match (self.source, self.pll) {
            (Source::Primary(0), _) => Err(Error::InvalidArgument),
            (Source::Primary(hz), false) => Ok(hz),
            (Source::Primary(_), true) => Err(Error::Unreachable),
            (Source::Internal(f), false) => Ok(f.hz()),
            (Source::Internal(f @ (InternalFreq::Mhz4 | InternalFreq::Mhz8)), true) => {
                Ok(f.hz() * 4)
            }
            (Source::Internal(_), true) => Err(Error::InvalidArgument),
        }
    }

    /// Apply the clock selection and return the oscillator clock object
    pub fn freeze(self) -> Result<Fosc> {
        let hz = self.fosc_hz().inspect_err(|_| warn!("clock: rejected selection"))?;

        match self.source {
            Source::Primary(_) => {
                pac::OSCTUNE.clear_bit(osctune::PLLEN);
                pac::OSCCON.write_field(osccon::SCS, 2, 0b00);
            }
            Source::Internal(freq) => {
                pac::OSCCON.write_field(osccon::IRCF, 3, freq as u8);
                // The PLL only follows the internal block when SCS selects the primary source
                pac::OSCTUNE.write_bit(osctune::PLLEN, self.pll);
                pac::OSCCON.write_field(osccon::SCS, 2, if self.pll { 0b00 } else { 0b10 });
                if freq != InternalFreq::Khz31 {
                    spin_until(|| pac::OSCCON.is_set(osccon::IOFS))
                        .inspect_err(|_| error!("clock: internal oscillator did not settle"))?;
                }
            }
        }

        debug!("clock: fosc = {} Hz", hz);
        Ok(Fosc(hz))
    }
}

/// Oscillator clock object, `Fosc`
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Fosc(u32);

impl Fosc {
    /// Instruction cycle frequency, `Fosc / 4`
    #[inline(always)]
    pub fn instruction_clock(&self) -> u32 {
        self.0 / 4
    }
}

/// Trait for configured clock objects
pub trait Clock {
    /// Frequency of the clock in Hz
    fn freq(&self) -> u32;
}

impl Clock for Fosc {
    /// Up to 40 MHz, hence 32 bits. Frequencies are used for one-time divisor computations.
    fn freq(&self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim;

    #[test]
    fn internal_with_pll() {
        let _s = sim::session();
        let fosc = ClockConfig::internal(InternalFreq::Mhz8).pll().freeze().unwrap();
        assert_eq!(fosc.freq(), 32_000_000);
        assert_eq!(fosc.instruction_clock(), 8_000_000);
        assert!(pac::OSCTUNE.is_set(osctune::PLLEN));
        assert_eq!(pac::OSCCON.read_field(osccon::IRCF, 3), 7);
        assert_eq!(pac::OSCCON.read_field(osccon::SCS, 2), 0);
    }

    #[test]
    fn pll_needs_fast_internal() {
        let _s = sim::session();
        assert_eq!(
            ClockConfig::internal(InternalFreq::Mhz2).pll().freeze(),
            Err(Error::InvalidArgument)
        );
        assert_eq!(sim::write_count(), 0);
    }

    #[test]
    fn unsettled_oscillator_times_out() {
        let _s = sim::session();
        sim::hold(pac::OSCCON, 1 << osccon::IOFS);
        assert_eq!(
            ClockConfig::internal(InternalFreq::Mhz4).freeze(),
            Err(Error::Timeout)
        );
    }

    #[test]
    fn primary() {
        let _s = sim::session();
        let fosc = ClockConfig::primary(20_000_000).freeze().unwrap();
        assert_eq!(fosc.freq(), 20_000_000);
        assert_eq!(ClockConfig::primary(0).freeze(), Err(Error::InvalidArgument));
    }
}
