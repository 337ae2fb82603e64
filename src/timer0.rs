//! Timer0
//!
//! 8- or 16-bit timer/counter with an optional 1:2..1:256 prescaler. The preload given at init is
//! cached and written back into the counter on every overflow, before the overflow callback runs,
//! so the overflow period stays `(2^width - preload) * prescale` instruction cycles.

use crate::error::{Error, Result};
use crate::hw_traits::timer::{read16, write16};
use crate::interrupt::{self, Irq, Source, HANDLERS};
use crate::pac::{self, t0con};
use core::cell::Cell;
use critical_section::Mutex;

/// Prescaler ratio, in `T0PS` order
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timer0Prescaler {
    /// 1:2
    Div2 = 0,
    /// 1:4
    Div4 = 1,
    /// 1:8
    Div8 = 2,
    /// 1:16
    Div16 = 3,
    /// 1:32
    Div32 = 4,
    /// 1:64
    Div64 = 5,
    /// 1:128
    Div128 = 6,
    /// 1:256
    Div256 = 7,
}

/// Edge of T0CKI (RA4) that increments the counter
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CounterEdge {
    /// Low to high
    Rising,
    /// High to low
    Falling,
}

/// Clock source
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timer0Source {
    /// Instruction clock, `Fosc / 4`
    Timer,
    /// Edges on T0CKI
    Counter(CounterEdge),
}

/// Counter width
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timer0Width {
    /// Overflows from 0xFF
    Bits8,
    /// Overflows from 0xFFFF
    Bits16,
}

/// Timer0 configuration
#[derive(Clone, Copy, Debug)]
pub struct Timer0Config {
    /// `None` bypasses the prescaler
    pub prescaler: Option<Timer0Prescaler>,
    /// Clock source
    pub source: Timer0Source,
    /// Counter width
    pub width: Timer0Width,
    /// Counter value loaded at init and after every overflow. Must fit in 8 bits in 8-bit mode.
    pub preload: u16,
    /// Overflow callback
    pub interrupt: Option<Irq>,
}

static PRELOAD: Mutex<Cell<u16>> = Mutex::new(Cell::new(0));

fn write_counter(val: u16) {
    if pac::T0CON.is_set(t0con::T08BIT) {
        pac::TMR0L.write(val as u8);
    } else {
        write16(pac::TMR0L, pac::TMR0H, val);
    }
}

impl Timer0Config {
    /// Stop the timer, program prescaler, source and width, load the preload value, register the
    /// overflow callback and start the timer.
    pub fn init(&self) -> Result<Timer0> {
        if self.width == Timer0Width::Bits8 && self.preload > 0xFF {
            warn!("tmr0: preload {} does not fit 8 bits", self.preload);
            return Err(Error::InvalidArgument);
        }

        pac::T0CON.clear_bit(t0con::TMR0ON);
        match self.prescaler {
            Some(ps) => {
                pac::T0CON.clear_bit(t0con::PSA);
                pac::T0CON.write_field(t0con::T0PS, 3, ps as u8);
            }
            None => pac::T0CON.set_bit(t0con::PSA),
        }
        match self.source {
            Timer0Source::Timer => pac::T0CON.clear_bit(t0con::T0CS),
            Timer0Source::Counter(edge) => {
                pac::T0CON.set_bit(t0con::T0CS);
                pac::T0CON.write_bit(t0con::T0SE, edge == CounterEdge::Falling);
            }
        }
        pac::T0CON.write_bit(t0con::T08BIT, self.width == Timer0Width::Bits8);

        critical_section::with(|cs| PRELOAD.borrow(cs).set(self.preload));
        write_counter(self.preload);
        interrupt::attach(Source::Timer0, &HANDLERS.timer0, self.interrupt);

        pac::T0CON.set_bit(t0con::TMR0ON);
        debug!("tmr0: started, preload {}", self.preload);
        Ok(Timer0 { width: self.width })
    }
}

/// Running Timer0
#[derive(Debug)]
pub struct Timer0 {
    width: Timer0Width,
}

impl Timer0 {
    /// Current count. 8-bit mode returns the low byte only.
    pub fn read(&self) -> u16 {
        match self.width {
            Timer0Width::Bits8 => u16::from(pac::TMR0L.read()),
            Timer0Width::Bits16 => read16(pac::TMR0L, pac::TMR0H),
        }
    }

    /// Load the counter. 8-bit mode takes the low byte.
    pub fn write(&mut self, val: u16) {
        write_counter(val)
    }

    /// Stop the timer and drop its overflow callback
    pub fn deinit(self) {
        pac::T0CON.clear_bit(t0con::TMR0ON);
        interrupt::detach(Source::Timer0, &HANDLERS.timer0);
        debug!("tmr0: stopped");
    }
}

pub(crate) fn service() {
    Source::Timer0.clear_flag();
    let preload = critical_section::with(|cs| PRELOAD.borrow(cs).get());
    write_counter(preload);
    HANDLERS.timer0.fire();
}

#[cfg(not(target_os = "none"))]
pub(crate) fn reset() {
    critical_section::with(|cs| PRELOAD.borrow(cs).set(0));
}
