//! PWM on the CCP modules
//!
//! Both CCP modules share Timer2 as their PWM time base, so they share one period:
//!
//! ```text
//! PR2 = round(Fosc / (4 * f * prescale)) - 1
//! ```
//!
//! The duty cycle is a 10-bit value in quarter-instruction-cycle ticks, so a full period is
//! `4 * (PR2 + 1)` ticks. The upper 8 bits go to `CCPRxL` and the lower 2 to `CCPxCON.DCxB`.
//!
//! A [`Pwm`] handle is obtained from a CCP module configured in PWM mode with
//! [`Ccp::into_pwm`](crate::ccp::Ccp::into_pwm) and implements
//! [`embedded_hal::pwm::SetDutyCycle`].

use crate::ccp::{self, CcpInstance, MODE_OFF, MODE_PWM};
use crate::clock::{Clock, Fosc};
use crate::error::{Error, Result};
use crate::timer2::{self, Timer2Prescaler};

const DUTY_MAX: u16 = 0x3FF;

/// `PR2` value giving `frequency` Hz at `prescaler`, rounded to nearest
pub fn period_register(fosc: &Fosc, frequency: u32, prescaler: Timer2Prescaler) -> Result<u8> {
    let div = 4u64 * u64::from(frequency) * u64::from(prescaler.ratio());
    if div == 0 {
        return Err(Error::InvalidArgument);
    }
    let fosc = u64::from(fosc.freq());
    let periods = (fosc + div / 2) / div;
    match periods {
        1..=256 => Ok((periods - 1) as u8),
        _ => Err(Error::InvalidArgument),
    }
}

/// Duty ticks for `percent` of a period of `PR2 = period`, rounded to nearest. Saturates at 100%.
pub fn duty_ticks(period: u8, percent: u8) -> u16 {
    let percent = u32::from(percent.min(100));
    let full = 4 * (u32::from(period) + 1);
    let ticks = (full * percent + 50) / 100;
    ticks.min(u32::from(DUTY_MAX)) as u16
}

pub(crate) fn set_duty_percent(instance: CcpInstance, percent: u8) {
    let ticks = duty_ticks(timer2::read_period(), percent);
    instance.regs().duty_wr(ticks);
}

pub(crate) fn start(instance: CcpInstance) {
    instance.regs().ccpm_wr(MODE_PWM);
}

pub(crate) fn stop(instance: CcpInstance) {
    instance.regs().ccpm_wr(MODE_OFF);
}

/// CCP module running in PWM mode
#[derive(Debug)]
pub struct Pwm {
    instance: CcpInstance,
}

impl Pwm {
    pub(crate) fn new(instance: CcpInstance) -> Self {
        Pwm { instance }
    }

    /// Set the duty cycle in percent. Values above 100 saturate.
    pub fn set_duty_percent(&mut self, percent: u8) {
        set_duty_percent(self.instance, percent)
    }

    /// Duty cycle in ticks
    pub fn duty(&self) -> u16 {
        self.instance.regs().duty_rd()
    }

    /// Ticks in one period, `4 * (PR2 + 1)`
    pub fn max_duty(&self) -> u16 {
        4 * (u16::from(timer2::read_period()) + 1)
    }

    /// Resume output
    pub fn start(&mut self) {
        start(self.instance)
    }

    /// Stop output
    pub fn stop(&mut self) {
        stop(self.instance)
    }

    /// Turn the module off
    pub fn deinit(self) {
        ccp::deinit(self.instance)
    }
}

mod ehal1 {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::pwm::{ErrorType, SetDutyCycle};

    impl ErrorType for Pwm {
        type Error = Infallible;
    }

    impl SetDutyCycle for Pwm {
        /// Capped at the 10-bit duty register, so at `PR2 = 255` fully on is 1023 of 1024
        /// ticks.
        fn max_duty_cycle(&self) -> u16 {
            self.max_duty().min(DUTY_MAX)
        }

        fn set_duty_cycle(&mut self, duty: u16) -> core::result::Result<(), Self::Error> {
            self.instance.regs().duty_wr(duty.min(DUTY_MAX));
            Ok(())
        }
    }
}
