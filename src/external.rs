//! External edge interrupts (INT0..INT2) and PORTB change interrupts (RB4..RB7).
//!
//! INT0, INT1 and INT2 sit on RB0, RB1 and RB2 and each fire on one selectable edge. INT0 has no
//! priority bit and is always serviced from the high-priority vector.
//!
//! RB4..RB7 share one change flag. Each pin registers a rising and a falling callback; the
//! dispatcher works out which edge happened by comparing the sampled level against the last level
//! it saw (see [`crate::interrupt`]).

use crate::config;
use crate::error::{Error, Result};
use crate::gpio::{self, Direction, Port};
use crate::interrupt::{self, Handler, Priority, Source, HANDLERS};
use crate::pac::{self, intcon2};
use core::cell::Cell;
use critical_section::Mutex;

/// External interrupt line
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExtSource {
    /// INT0 on RB0
    Int0 = 0,
    /// INT1 on RB1
    Int1 = 1,
    /// INT2 on RB2
    Int2 = 2,
}

impl ExtSource {
    fn source(self) -> Source {
        match self {
            ExtSource::Int0 => Source::Int0,
            ExtSource::Int1 => Source::Int1,
            ExtSource::Int2 => Source::Int2,
        }
    }

    fn edge_bit(self) -> u8 {
        match self {
            ExtSource::Int0 => intcon2::INTEDG0,
            ExtSource::Int1 => intcon2::INTEDG1,
            ExtSource::Int2 => intcon2::INTEDG2,
        }
    }
}

/// Active edge
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    /// High to low
    Falling,
    /// Low to high
    Rising,
}

/// External interrupt descriptor
#[derive(Clone, Copy, Debug)]
pub struct ExtInterrupt {
    /// Interrupt line
    pub source: ExtSource,
    /// Edge that raises the flag
    pub edge: Edge,
    /// Vector to service from. Must be `High` for INT0.
    pub priority: Priority,
    /// Called on every active edge
    pub callback: Option<Handler>,
}

impl ExtInterrupt {
    /// Disable the line, program edge and priority, make the pin an input, register the callback,
    /// clear the flag and enable the line.
    pub fn init(&self) -> Result {
        if !config::EXT_INTERRUPT {
            warn!("ext: built without ext-interrupt");
            return Err(Error::Unreachable);
        }
        if config::PRIORITY_LEVELS
            && self.source == ExtSource::Int0
            && self.priority == Priority::Low
        {
            warn!("ext: INT0 has no low priority");
            return Err(Error::InvalidArgument);
        }

        let source = self.source.source();
        source.disable();
        pac::INTCON2.write_bit(self.source.edge_bit(), self.edge == Edge::Rising);
        interrupt::arm(source, self.priority);
        gpio::set_direction(Port::B, self.source as u8, Direction::Input);
        HANDLERS.int[self.source as usize].set(self.callback);
        source.clear_flag();
        source.enable();
        debug!("ext: INT{} armed", self.source as u8);
        Ok(())
    }

    /// Disable the line and drop its callback
    pub fn deinit(&self) -> Result {
        interrupt::detach(self.source.source(), &HANDLERS.int[self.source as usize]);
        Ok(())
    }
}

pub(crate) fn service(n: usize) {
    let source = match n {
        0 => ExtSource::Int0,
        1 => ExtSource::Int1,
        _ => ExtSource::Int2,
    };
    source.source().clear_flag();
    HANDLERS.int[source as usize].fire();
}

/// PORTB pin with change detection
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RbPin {
    /// RB4
    Rb4 = 4,
    /// RB5
    Rb5 = 5,
    /// RB6
    Rb6 = 6,
    /// RB7
    Rb7 = 7,
}

impl RbPin {
    #[inline(always)]
    fn slot_index(self) -> usize {
        self as usize - 4
    }

    #[inline(always)]
    fn mask(self) -> u8 {
        1 << (self as u8)
    }
}

impl TryFrom<u8> for RbPin {
    type Error = Error;

    fn try_from(pin: u8) -> Result<Self> {
        match pin {
            4 => Ok(RbPin::Rb4),
            5 => Ok(RbPin::Rb5),
            6 => Ok(RbPin::Rb6),
            7 => Ok(RbPin::Rb7),
            _ => Err(Error::InvalidArgument),
        }
    }
}

// Pins with a live registration, as a PORTB bit mask
static REGISTERED: Mutex<Cell<u8>> = Mutex::new(Cell::new(0));

/// PORTB change interrupt descriptor for one pin
#[derive(Clone, Copy, Debug)]
pub struct PinChangeInterrupt {
    /// Pin to watch
    pub pin: RbPin,
    /// Vector to service from. Shared by all four pins; the last `init` wins.
    pub priority: Priority,
    /// Called when the pin is seen going low to high
    pub on_rising: Option<Handler>,
    /// Called when the pin is seen going high to low
    pub on_falling: Option<Handler>,
}

impl PinChangeInterrupt {
    /// Disable the shared change interrupt, program its priority, clear the flag, make the pin an
    /// input, register both callbacks and enable the shared change interrupt again.
    pub fn init(&self) -> Result {
        if !config::PIN_CHANGE_INTERRUPT {
            warn!("rbx: built without pin-change-interrupt");
            return Err(Error::Unreachable);
        }

        let source = Source::PortBChange;
        source.disable();
        interrupt::arm(source, self.priority);
        // Reading PORTB ends the mismatch condition so the flag stays clear. The level read is
        // the reference for this pin's first edge.
        let level = pac::PORTB.read();
        interrupt::seed_pin_change(self.pin.mask(), level);
        source.clear_flag();
        gpio::set_direction(Port::B, self.pin as u8, Direction::Input);
        HANDLERS.rb_rising[self.pin.slot_index()].set(self.on_rising);
        HANDLERS.rb_falling[self.pin.slot_index()].set(self.on_falling);
        critical_section::with(|cs| {
            let reg = REGISTERED.borrow(cs);
            reg.set(reg.get() | self.pin.mask());
        });
        source.enable();
        debug!("rbx: RB{} armed", self.pin as u8);
        Ok(())
    }

    /// Drop the pin's callbacks. The shared change interrupt is disabled once no pin is
    /// registered any more.
    pub fn deinit(&self) -> Result {
        let source = Source::PortBChange;
        source.disable();
        HANDLERS.rb_rising[self.pin.slot_index()].set(None);
        HANDLERS.rb_falling[self.pin.slot_index()].set(None);
        let remaining = critical_section::with(|cs| {
            let reg = REGISTERED.borrow(cs);
            reg.set(reg.get() & !self.pin.mask());
            reg.get()
        });
        if remaining != 0 {
            source.enable();
        }
        Ok(())
    }
}

#[cfg(not(target_os = "none"))]
pub(crate) fn reset() {
    critical_section::with(|cs| REGISTERED.borrow(cs).set(0));
}

#[cfg(all(test, feature = "ext-interrupt"))]
mod ext_tests {
    use super::*;
    use crate::pac::{intcon, intcon3};
    use crate::sim;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static INT1_HITS: AtomicUsize = AtomicUsize::new(0);
    fn int1_cb() {
        INT1_HITS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn int1_rising() {
        let _s = sim::session();
        INT1_HITS.store(0, Ordering::SeqCst);
        pac::TRISB.write(0x00);
        let ext = ExtInterrupt {
            source: ExtSource::Int1,
            edge: Edge::Rising,
            priority: Priority::High,
            callback: Some(int1_cb),
        };
        ext.init().unwrap();
        assert!(pac::INTCON2.is_set(intcon2::INTEDG1));
        assert!(pac::TRISB.is_set(1));
        assert!(pac::INTCON3.is_set(intcon3::INT1IE));

        sim::raise(pac::INTCON3, intcon3::INT1IF);
        sim::service_interrupts();
        assert_eq!(INT1_HITS.load(Ordering::SeqCst), 1);
        assert!(!pac::INTCON3.is_set(intcon3::INT1IF));

        ext.deinit().unwrap();
        assert!(!pac::INTCON3.is_set(intcon3::INT1IE));
        sim::raise(pac::INTCON3, intcon3::INT1IF);
        sim::service_interrupts();
        assert_eq!(INT1_HITS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn int0_falling() {
        let _s = sim::session();
        let ext = ExtInterrupt {
            source: ExtSource::Int0,
            edge: Edge::Falling,
            priority: Priority::High,
            callback: None,
        };
        ext.init().unwrap();
        assert!(!pac::INTCON2.is_set(intcon2::INTEDG0));
        assert!(pac::INTCON.is_set(intcon::INT0IE));
    }

    #[cfg(feature = "priority-levels")]
    #[test]
    fn int0_low_priority_rejected() {
        let _s = sim::session();
        let ext = ExtInterrupt {
            source: ExtSource::Int0,
            edge: Edge::Rising,
            priority: Priority::Low,
            callback: None,
        };
        assert_eq!(ext.init(), Err(Error::InvalidArgument));
        assert_eq!(sim::write_count(), 0);
    }
}

#[cfg(all(test, feature = "pin-change-interrupt"))]
mod rbx_tests {
    use super::*;
    use crate::pac::intcon;
    use crate::sim;
    use std::sync::Mutex as StdMutex;
    use std::vec::Vec;

    static EDGES: StdMutex<Vec<&'static str>> = StdMutex::new(Vec::new());
    fn rb4_rise() {
        EDGES.lock().unwrap().push("rb4 rise");
    }
    fn rb4_fall() {
        EDGES.lock().unwrap().push("rb4 fall");
    }
    fn rb6_rise() {
        EDGES.lock().unwrap().push("rb6 rise");
    }

    fn watch(pin: RbPin, on_rising: Handler, on_falling: Option<Handler>) -> PinChangeInterrupt {
        PinChangeInterrupt {
            pin,
            priority: Priority::High,
            on_rising: Some(on_rising),
            on_falling,
        }
    }

    #[test]
    fn edges_follow_levels() {
        let _s = sim::session();
        EDGES.lock().unwrap().clear();
        sim::drive_pin(Port::B, 4, true);
        watch(RbPin::Rb4, rb4_rise, Some(rb4_fall)).init().unwrap();
        assert!(pac::INTCON.is_set(intcon::RBIE));

        sim::drive_pin(Port::B, 4, false);
        sim::service_interrupts();
        sim::drive_pin(Port::B, 4, true);
        sim::service_interrupts();
        // Plateau: flag raised by another pin, no edge on RB4
        sim::drive_pin(Port::B, 5, true);
        sim::service_interrupts();
        assert_eq!(*EDGES.lock().unwrap(), ["rb4 fall", "rb4 rise"]);
        assert!(!pac::INTCON.is_set(intcon::RBIF));
    }

    #[test]
    fn deinit_keeps_other_pins_live() {
        let _s = sim::session();
        EDGES.lock().unwrap().clear();
        let rb4 = watch(RbPin::Rb4, rb4_rise, None);
        let rb6 = watch(RbPin::Rb6, rb6_rise, None);
        rb4.init().unwrap();
        rb6.init().unwrap();

        rb4.deinit().unwrap();
        assert!(pac::INTCON.is_set(intcon::RBIE));

        // RB4 is no longer watched
        sim::drive_pin(Port::B, 4, true);
        sim::service_interrupts();
        assert!(EDGES.lock().unwrap().is_empty());
        // RB6 was low when armed
        sim::drive_pin(Port::B, 6, true);
        sim::service_interrupts();
        assert_eq!(*EDGES.lock().unwrap(), ["rb6 rise"]);

        rb6.deinit().unwrap();
        assert!(!pac::INTCON.is_set(intcon::RBIE));
    }

    #[test]
    fn rb_pin_range() {
        assert_eq!(RbPin::try_from(3), Err(Error::InvalidArgument));
        assert_eq!(RbPin::try_from(7), Ok(RbPin::Rb7));
    }
}
