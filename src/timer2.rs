//! Timer2
//!
//! 8-bit timer clocked from `Fosc / 4` through a 1:1/1:4/1:16 prescaler. The counter resets when
//! it matches `PR2`; every Nth match (postscaler 1..=16) raises `TMR2IF`. `PR2` is also the period
//! of the CCP modules in PWM mode, which program it through this module.

use crate::error::{Error, Result};
use crate::interrupt::{self, Irq, Source, HANDLERS};
use crate::pac::{self, t2con};
use core::cell::Cell;
use critical_section::Mutex;

/// Prescaler ratio, in `T2CKPS` order
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timer2Prescaler {
    /// 1:1
    Div1 = 0,
    /// 1:4
    Div4 = 1,
    /// 1:16
    Div16 = 2,
}

impl Timer2Prescaler {
    /// Division ratio
    pub const fn ratio(self) -> u32 {
        match self {
            Timer2Prescaler::Div1 => 1,
            Timer2Prescaler::Div4 => 4,
            Timer2Prescaler::Div16 => 16,
        }
    }
}

/// Timer2 configuration
#[derive(Clone, Copy, Debug)]
pub struct Timer2Config {
    /// Prescaler ratio
    pub prescaler: Timer2Prescaler,
    /// Number of period matches per interrupt, 1..=16
    pub postscaler: u8,
    /// Counter value loaded at init and after every interrupt
    pub preload: u8,
    /// New `PR2` value. `None` keeps the current period, e.g. one set up by a PWM channel.
    pub period: Option<u8>,
    /// Period match callback
    pub interrupt: Option<Irq>,
}

static PRELOAD: Mutex<Cell<u8>> = Mutex::new(Cell::new(0));

impl Timer2Config {
    /// Stop the timer, program the scalers and period, load the preload value, register the
    /// callback and start the timer.
    pub fn init(&self) -> Result<Timer2> {
        if !(1..=16).contains(&self.postscaler) {
            warn!("tmr2: postscaler 1:{} out of range", self.postscaler);
            return Err(Error::InvalidArgument);
        }

        pac::T2CON.clear_bit(t2con::TMR2ON);
        pac::T2CON.write_field(t2con::TOUTPS, 4, self.postscaler - 1);
        pac::T2CON.write_field(t2con::T2CKPS, 2, self.prescaler as u8);
        if let Some(period) = self.period {
            write_period(period);
        }
        critical_section::with(|cs| PRELOAD.borrow(cs).set(self.preload));
        pac::TMR2.write(self.preload);
        interrupt::attach(Source::Timer2, &HANDLERS.timer2, self.interrupt);

        pac::T2CON.set_bit(t2con::TMR2ON);
        debug!("tmr2: started, PR2 {}", read_period());
        Ok(Timer2 { _private: () })
    }
}

/// Running Timer2
#[derive(Debug)]
pub struct Timer2 {
    _private: (),
}

impl Timer2 {
    /// Current count
    #[inline]
    pub fn read(&self) -> u8 {
        pac::TMR2.read()
    }

    /// Load the counter
    #[inline]
    pub fn write(&mut self, val: u8) {
        pac::TMR2.write(val)
    }

    /// Program `PR2`
    pub fn set_period(&mut self, period: u8) {
        write_period(period)
    }

    /// Current `PR2`
    pub fn period(&self) -> u8 {
        read_period()
    }

    /// Stop the timer and drop its callback
    pub fn deinit(self) {
        pac::T2CON.clear_bit(t2con::TMR2ON);
        interrupt::detach(Source::Timer2, &HANDLERS.timer2);
        debug!("tmr2: stopped");
    }
}

#[inline(always)]
pub(crate) fn write_period(period: u8) {
    pac::PR2.write(period)
}

#[inline(always)]
pub(crate) fn read_period() -> u8 {
    pac::PR2.read()
}

pub(crate) fn service() {
    Source::Timer2.clear_flag();
    let preload = critical_section::with(|cs| PRELOAD.borrow(cs).get());
    pac::TMR2.write(preload);
    HANDLERS.timer2.fire();
}

#[cfg(not(target_os = "none"))]
pub(crate) fn reset() {
    critical_section::with(|cs| PRELOAD.borrow(cs).set(0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pac::pir1;
    use crate::sim;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static MATCHES: AtomicUsize = AtomicUsize::new(0);
    fn on_match() {
        MATCHES.fetch_add(1, Ordering::SeqCst);
    }

    fn config(postscaler: u8) -> Timer2Config {
        Timer2Config {
            prescaler: Timer2Prescaler::Div16,
            postscaler,
            preload: 10,
            period: Some(249),
            interrupt: Some(Irq::new(on_match)),
        }
    }

    #[test]
    fn setup() {
        let _s = sim::session();
        let tmr = config(10).init().unwrap();
        // TOUTPS = 9, TMR2ON, T2CKPS = 0b10
        assert_eq!(sim::peek(pac::T2CON), 0b0100_1110);
        assert_eq!(tmr.period(), 249);
        assert_eq!(tmr.read(), 10);
    }

    #[test]
    fn postscaler_range() {
        let _s = sim::session();
        assert_eq!(config(0).init().err(), Some(Error::InvalidArgument));
        assert_eq!(config(17).init().err(), Some(Error::InvalidArgument));
        assert_eq!(sim::write_count(), 0);
        assert!(config(16).init().is_ok());
    }

    #[test]
    fn period_left_alone_without_override() {
        let _s = sim::session();
        let mut cfg = config(1);
        cfg.period = None;
        let mut tmr = cfg.init().unwrap();
        assert_eq!(tmr.period(), 0xFF);
        tmr.set_period(61);
        assert_eq!(sim::peek(pac::PR2), 61);
    }

    #[test]
    fn match_reloads_and_calls_back() {
        if !crate::config::TIMER2_INTERRUPT {
            return;
        }
        let _s = sim::session();
        MATCHES.store(0, Ordering::SeqCst);
        let mut tmr = config(1).init().unwrap();
        tmr.write(0);
        sim::raise(pac::PIR1, pir1::TMR2IF);
        sim::service_interrupts();
        assert_eq!(tmr.read(), 10);
        assert_eq!(MATCHES.load(Ordering::SeqCst), 1);

        tmr.deinit();
        sim::raise(pac::PIR1, pir1::TMR2IF);
        sim::service_interrupts();
        assert_eq!(MATCHES.load(Ordering::SeqCst), 1);
    }
}
