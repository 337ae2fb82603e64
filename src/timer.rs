//! Timer1 and Timer3
//!
//! Both are 16-bit timer/counters with a 1:1..1:8 prescaler, sharing one register layout, so one
//! generic driver [`Timer<T>`] serves both. Timer1 can run its own secondary oscillator on
//! T1OSO/T1OSI; Timer3 counts from the same pins but has no oscillator enable.
//!
//! As with Timer0 the preload is cached and reloaded on every overflow before the callback runs.
//! Timer3's control register also carries the CCP timer routing bits, which this driver leaves
//! alone.

use crate::error::Result;
use crate::hw_traits::timer::{Timer16, TxCon};
use crate::interrupt::{self, Irq, Slot, HANDLERS};
use core::cell::Cell;
use core::marker::PhantomData;
use critical_section::Mutex;

pub use crate::hw_traits::timer::{Tmr1, Tmr3};

/// Prescaler ratio, in `TxCKPS` order
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerPrescaler {
    /// 1:1
    Div1 = 0,
    /// 1:2
    Div2 = 1,
    /// 1:4
    Div4 = 2,
    /// 1:8
    Div8 = 3,
}

/// Clock source
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerSource {
    /// Instruction clock, `Fosc / 4`
    Timer,
    /// Rising edges on T13CKI, or the Timer1 oscillator when it is enabled
    Counter {
        /// Synchronise the external clock to the instruction clock. An unsynchronised counter
        /// keeps running in sleep.
        sync: bool,
    },
}

/// Timer1 configuration
#[derive(Clone, Copy, Debug)]
pub struct Timer1Config {
    /// Prescaler ratio
    pub prescaler: TimerPrescaler,
    /// Clock source
    pub source: TimerSource,
    /// Run the Timer1 oscillator
    pub oscillator: bool,
    /// Read and write the counter as one 16-bit operation (`RD16`)
    pub rw_16bit: bool,
    /// Counter value loaded at init and after every overflow
    pub preload: u16,
    /// Overflow callback
    pub interrupt: Option<Irq>,
}

/// Timer3 configuration
#[derive(Clone, Copy, Debug)]
pub struct Timer3Config {
    /// Prescaler ratio
    pub prescaler: TimerPrescaler,
    /// Clock source
    pub source: TimerSource,
    /// Read and write the counter as one 16-bit operation (`RD16`)
    pub rw_16bit: bool,
    /// Counter value loaded at init and after every overflow
    pub preload: u16,
    /// Overflow callback
    pub interrupt: Option<Irq>,
}

static PRELOAD: [Mutex<Cell<u16>>; 2] = [Mutex::new(Cell::new(0)), Mutex::new(Cell::new(0))];

fn slot<T: Timer16>() -> &'static Slot {
    match T::INDEX {
        0 => &HANDLERS.timer1,
        _ => &HANDLERS.timer3,
    }
}

fn con_bits(prescaler: TimerPrescaler, source: TimerSource, oscen: bool, rd16: bool) -> TxCon {
    let (external, nsync) = match source {
        TimerSource::Timer => (false, false),
        TimerSource::Counter { sync } => (true, !sync),
    };
    TxCon {
        rd16,
        ckps: prescaler as u8,
        oscen,
        nsync,
        external,
    }
}

fn setup<T: Timer16>(con: TxCon, preload: u16, irq: Option<Irq>) -> Timer<T> {
    T::off();
    T::con_settings(con);
    critical_section::with(|cs| PRELOAD[T::INDEX].borrow(cs).set(preload));
    T::counter_wr(preload);
    interrupt::attach(T::SOURCE, slot::<T>(), irq);
    T::on();
    debug!("tmr{}: started, preload {}", T::INDEX * 2 + 1, preload);
    Timer {
        _timer: PhantomData,
    }
}

impl Timer1Config {
    /// Stop the timer, program clock and prescaler, load the preload value, register the overflow
    /// callback and start the timer.
    pub fn init(&self) -> Result<Timer<Tmr1>> {
        let con = con_bits(self.prescaler, self.source, self.oscillator, self.rw_16bit);
        Ok(setup(con, self.preload, self.interrupt))
    }
}

impl Timer3Config {
    /// Stop the timer, program clock and prescaler, load the preload value, register the overflow
    /// callback and start the timer.
    pub fn init(&self) -> Result<Timer<Tmr3>> {
        let con = con_bits(self.prescaler, self.source, false, self.rw_16bit);
        Ok(setup(con, self.preload, self.interrupt))
    }
}

/// Running Timer1 or Timer3
#[derive(Debug)]
pub struct Timer<T: Timer16> {
    _timer: PhantomData<T>,
}

impl<T: Timer16> Timer<T> {
    /// Current count
    #[inline]
    pub fn read(&self) -> u16 {
        T::counter_rd()
    }

    /// Load the counter
    #[inline]
    pub fn write(&mut self, val: u16) {
        T::counter_wr(val)
    }

    /// Whether the timer is counting
    pub fn is_running(&self) -> bool {
        T::is_on()
    }

    /// Stop the timer and drop its overflow callback
    pub fn deinit(self) {
        T::off();
        interrupt::detach(T::SOURCE, slot::<T>());
        debug!("tmr{}: stopped", T::INDEX * 2 + 1);
    }
}

pub(crate) fn service<T: Timer16>() {
    T::SOURCE.clear_flag();
    let preload = critical_section::with(|cs| PRELOAD[T::INDEX].borrow(cs).get());
    T::counter_wr(preload);
    slot::<T>().fire();
}

#[cfg(not(target_os = "none"))]
pub(crate) fn reset() {
    critical_section::with(|cs| {
        for p in &PRELOAD {
            p.borrow(cs).set(0);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::pac::{self, pir1, pir2, t1con, t3con};
    use crate::sim;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static T1_TICKS: AtomicUsize = AtomicUsize::new(0);
    fn t1_tick() {
        T1_TICKS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn timer1_setup_and_reload() {
        let _s = sim::session();
        T1_TICKS.store(0, Ordering::SeqCst);
        let cfg = Timer1Config {
            prescaler: TimerPrescaler::Div8,
            source: TimerSource::Timer,
            oscillator: false,
            rw_16bit: true,
            preload: 0x0BDC,
            interrupt: Some(Irq::new(t1_tick)),
        };
        let mut tmr = cfg.init().unwrap();
        assert_eq!(sim::peek(pac::T1CON), 0b1011_0001);
        assert_eq!(tmr.read(), 0x0BDC);
        assert!(tmr.is_running());

        if config::TIMER1_INTERRUPT {
            tmr.write(0x0003);
            sim::raise(pac::PIR1, pir1::TMR1IF);
            sim::service_interrupts();
            assert_eq!(tmr.read(), 0x0BDC);
            assert_eq!(T1_TICKS.load(Ordering::SeqCst), 1);
        }

        tmr.deinit();
        assert!(!pac::T1CON.is_set(t1con::TMRON));
        assert!(!pac::PIE1.is_set(pir1::TMR1IF));
    }

    #[test]
    fn async_counter_with_oscillator() {
        let _s = sim::session();
        let cfg = Timer1Config {
            prescaler: TimerPrescaler::Div1,
            source: TimerSource::Counter { sync: false },
            oscillator: true,
            rw_16bit: false,
            preload: 0x8000,
            interrupt: None,
        };
        cfg.init().unwrap();
        assert_eq!(sim::peek(pac::T1CON), 0b0000_1111);
    }

    #[test]
    fn timer3_keeps_ccp_routing() {
        let _s = sim::session();
        pac::T3CON.write(1 << t3con::T3CCP2);
        let cfg = Timer3Config {
            prescaler: TimerPrescaler::Div2,
            source: TimerSource::Counter { sync: true },
            rw_16bit: false,
            preload: 0x1234,
            interrupt: None,
        };
        let tmr = cfg.init().unwrap();
        assert_eq!(sim::peek(pac::T3CON), 0b0101_0011);
        // Timer3 reads its own counter, not Timer1's
        pac::TMR1L.write(0xFF);
        assert_eq!(tmr.read(), 0x1234);
        assert!(!pac::PIE2.is_set(pir2::TMR3IF));
    }

    #[test]
    fn reinit_is_idempotent() {
        let _s = sim::session();
        let cfg = Timer3Config {
            prescaler: TimerPrescaler::Div4,
            source: TimerSource::Timer,
            rw_16bit: true,
            preload: 7,
            interrupt: None,
        };
        cfg.init().unwrap();
        let image = (sim::peek(pac::T3CON), sim::peek(pac::TMR3L), sim::peek(pac::TMR3H));
        cfg.init().unwrap().deinit();
        cfg.init().unwrap();
        assert_eq!(
            (sim::peek(pac::T3CON), sim::peek(pac::TMR3L), sim::peek(pac::TMR3H)),
            image
        );
    }
}
