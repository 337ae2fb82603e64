//! Interrupt sources, callback slots and the central dispatcher.
//!
//! The PIC18F4620 has two interrupt vectors. With the `priority-levels` feature, `RCON.IPEN` is
//! set and every source except INT0 can be assigned to the high or the low vector through its
//! priority bit; the device's vector functions call [`dispatch_high`] and [`dispatch_low`].
//! Without the feature a single flat vector serves every source and calls [`dispatch`].
//!
//! A dispatcher body visits the compiled-in sources in a fixed order (the order of
//! [`Source::ALL`]) and services each one whose enable bit and flag bit are both set. Servicing
//! clears the flag (where software can) and calls the callback registered by the owning driver's
//! `init`, if any. Sources whose Cargo feature is off are skipped without touching their
//! registers.
//!
//! Callbacks are plain `fn()` pointers held in `critical_section::Mutex` cells. Drivers write them
//! only while their source is disabled, then clear the flag and enable the source.
//!
//! PORTB change (RB4..RB7) has a single hardware flag. The dispatcher samples PORTB once, keeps a
//! last-seen level per pin and calls the rising or falling callback for every pin whose level
//! differs from the last one seen. Last-seen levels start high and are refreshed from PORTB when
//! a pin is armed.

use crate::config;
use crate::pac::{self, intcon, intcon2, intcon3, pir1, pir2, rcon, Sfr};
use core::cell::Cell;
use critical_section::Mutex;

/// Interrupt callback
pub type Handler = fn();

/// Interrupt vector a source is assigned to. Only programmed with the `priority-levels` feature.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Priority {
    /// High-priority vector (0x0008)
    #[default]
    High,
    /// Low-priority vector (0x0018)
    Low,
}

/// Callback plus priority, as carried by driver configurations
#[derive(Clone, Copy, Debug)]
pub struct Irq {
    /// Called from the dispatcher after the source flag has been cleared
    pub handler: Handler,
    /// Vector to service the source from
    pub priority: Priority,
}

impl Irq {
    /// High-priority callback
    pub const fn new(handler: Handler) -> Self {
        Irq {
            handler,
            priority: Priority::High,
        }
    }

    /// Same callback on the given vector
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// One callback slot
pub(crate) struct Slot(Mutex<Cell<Option<Handler>>>);

impl Slot {
    pub(crate) const fn new() -> Self {
        Slot(Mutex::new(Cell::new(None)))
    }

    pub(crate) fn set(&self, handler: Option<Handler>) {
        critical_section::with(|cs| self.0.borrow(cs).set(handler));
    }

    pub(crate) fn get(&self) -> Option<Handler> {
        critical_section::with(|cs| self.0.borrow(cs).get())
    }

    pub(crate) fn is_set(&self) -> bool {
        self.get().is_some()
    }

    /// Call the registered handler outside the critical section
    #[inline]
    pub(crate) fn fire(&self) {
        if let Some(handler) = self.get() {
            handler()
        }
    }
}

/// Every callback slot of the crate
pub(crate) struct Handlers {
    pub(crate) int: [Slot; 3],
    pub(crate) rb_rising: [Slot; 4],
    pub(crate) rb_falling: [Slot; 4],
    pub(crate) adc: Slot,
    pub(crate) timer0: Slot,
    pub(crate) timer1: Slot,
    pub(crate) timer2: Slot,
    pub(crate) timer3: Slot,
    pub(crate) ccp1: Slot,
    pub(crate) ccp2: Slot,
    pub(crate) eusart_tx: Slot,
    pub(crate) eusart_rx: Slot,
    pub(crate) eusart_framing: Slot,
    pub(crate) eusart_overrun: Slot,
    pub(crate) spi: Slot,
    pub(crate) i2c: Slot,
    pub(crate) i2c_overflow: Slot,
    pub(crate) i2c_bus_collision: Slot,
}

impl Handlers {
    const fn new() -> Self {
        Handlers {
            int: [Slot::new(), Slot::new(), Slot::new()],
            rb_rising: [Slot::new(), Slot::new(), Slot::new(), Slot::new()],
            rb_falling: [Slot::new(), Slot::new(), Slot::new(), Slot::new()],
            adc: Slot::new(),
            timer0: Slot::new(),
            timer1: Slot::new(),
            timer2: Slot::new(),
            timer3: Slot::new(),
            ccp1: Slot::new(),
            ccp2: Slot::new(),
            eusart_tx: Slot::new(),
            eusart_rx: Slot::new(),
            eusart_framing: Slot::new(),
            eusart_overrun: Slot::new(),
            spi: Slot::new(),
            i2c: Slot::new(),
            i2c_overflow: Slot::new(),
            i2c_bus_collision: Slot::new(),
        }
    }

    #[cfg(not(target_os = "none"))]
    fn clear(&self) {
        let singles = [
            &self.adc,
            &self.timer0,
            &self.timer1,
            &self.timer2,
            &self.timer3,
            &self.ccp1,
            &self.ccp2,
            &self.eusart_tx,
            &self.eusart_rx,
            &self.eusart_framing,
            &self.eusart_overrun,
            &self.spi,
            &self.i2c,
            &self.i2c_overflow,
            &self.i2c_bus_collision,
        ];
        let slots = self
            .int
            .iter()
            .chain(self.rb_rising.iter())
            .chain(self.rb_falling.iter())
            .chain(singles);
        for slot in slots {
            slot.set(None);
        }
    }
}

pub(crate) static HANDLERS: Handlers = Handlers::new();

// Last level seen on RB7..RB4 (upper nibble)
static RB_LAST: Mutex<Cell<u8>> = Mutex::new(Cell::new(0xF0));

/// Interrupt source, in dispatch order
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Source {
    /// External interrupt 0 (RB0)
    Int0,
    /// External interrupt 1 (RB1)
    Int1,
    /// External interrupt 2 (RB2)
    Int2,
    /// Change on RB4..RB7
    PortBChange,
    /// A/D conversion complete
    Adc,
    /// Timer0 overflow
    Timer0,
    /// Timer1 overflow
    Timer1,
    /// Timer2 to PR2 match
    Timer2,
    /// Timer3 overflow
    Timer3,
    /// CCP1 capture or compare event
    Ccp1,
    /// CCP2 capture or compare event
    Ccp2,
    /// EUSART transmit buffer empty
    EusartTx,
    /// EUSART byte received
    EusartRx,
    /// MSSP event while in SPI mode
    Spi,
    /// MSSP event while in I2C mode
    I2c,
    /// MSSP bus collision
    I2cBusCollision,
}

struct Bits {
    enable: (Sfr, u8),
    flag: (Sfr, u8),
    priority: Option<(Sfr, u8)>,
}

impl Source {
    /// Every source, in the order the dispatcher visits them
    pub const ALL: [Source; 16] = [
        Source::Int0,
        Source::Int1,
        Source::Int2,
        Source::PortBChange,
        Source::Adc,
        Source::Timer0,
        Source::Timer1,
        Source::Timer2,
        Source::Timer3,
        Source::Ccp1,
        Source::Ccp2,
        Source::EusartTx,
        Source::EusartRx,
        Source::Spi,
        Source::I2c,
        Source::I2cBusCollision,
    ];

    const fn bits(self) -> Bits {
        const fn p1(bit: u8) -> Bits {
            Bits {
                enable: (pac::PIE1, bit),
                flag: (pac::PIR1, bit),
                priority: Some((pac::IPR1, bit)),
            }
        }
        const fn p2(bit: u8) -> Bits {
            Bits {
                enable: (pac::PIE2, bit),
                flag: (pac::PIR2, bit),
                priority: Some((pac::IPR2, bit)),
            }
        }

        match self {
            Source::Int0 => Bits {
                enable: (pac::INTCON, intcon::INT0IE),
                flag: (pac::INTCON, intcon::INT0IF),
                priority: None,
            },
            Source::Int1 => Bits {
                enable: (pac::INTCON3, intcon3::INT1IE),
                flag: (pac::INTCON3, intcon3::INT1IF),
                priority: Some((pac::INTCON3, intcon3::INT1IP)),
            },
            Source::Int2 => Bits {
                enable: (pac::INTCON3, intcon3::INT2IE),
                flag: (pac::INTCON3, intcon3::INT2IF),
                priority: Some((pac::INTCON3, intcon3::INT2IP)),
            },
            Source::PortBChange => Bits {
                enable: (pac::INTCON, intcon::RBIE),
                flag: (pac::INTCON, intcon::RBIF),
                priority: Some((pac::INTCON2, intcon2::RBIP)),
            },
            Source::Timer0 => Bits {
                enable: (pac::INTCON, intcon::TMR0IE),
                flag: (pac::INTCON, intcon::TMR0IF),
                priority: Some((pac::INTCON2, intcon2::TMR0IP)),
            },
            Source::Adc => p1(pir1::ADIF),
            Source::Timer1 => p1(pir1::TMR1IF),
            Source::Timer2 => p1(pir1::TMR2IF),
            Source::Timer3 => p2(pir2::TMR3IF),
            Source::Ccp1 => p1(pir1::CCP1IF),
            Source::Ccp2 => p2(pir2::CCP2IF),
            Source::EusartTx => p1(pir1::TXIF),
            Source::EusartRx => p1(pir1::RCIF),
            Source::Spi | Source::I2c => p1(pir1::SSPIF),
            Source::I2cBusCollision => p2(pir2::BCLIF),
        }
    }

    /// Whether the Cargo feature for this source is on
    pub const fn compiled(self) -> bool {
        match self {
            Source::Int0 | Source::Int1 | Source::Int2 => config::EXT_INTERRUPT,
            Source::PortBChange => config::PIN_CHANGE_INTERRUPT,
            Source::Adc => config::ADC_INTERRUPT,
            Source::Timer0 => config::TIMER0_INTERRUPT,
            Source::Timer1 => config::TIMER1_INTERRUPT,
            Source::Timer2 => config::TIMER2_INTERRUPT,
            Source::Timer3 => config::TIMER3_INTERRUPT,
            Source::Ccp1 => config::CCP1_INTERRUPT,
            Source::Ccp2 => config::CCP2_INTERRUPT,
            Source::EusartTx => config::EUSART_TX_INTERRUPT,
            Source::EusartRx => config::EUSART_RX_INTERRUPT,
            Source::Spi => config::SPI_INTERRUPT,
            Source::I2c => config::I2C_INTERRUPT,
            Source::I2cBusCollision => config::I2C_BUS_COLLISION_INTERRUPT,
        }
    }

    /// Whether the source's enable bit is set
    #[inline]
    pub fn is_enabled(self) -> bool {
        let (reg, bit) = self.bits().enable;
        reg.is_set(bit)
    }

    /// Whether the source's flag bit is set
    #[inline]
    pub fn is_flagged(self) -> bool {
        let (reg, bit) = self.bits().flag;
        reg.is_set(bit)
    }

    /// Whether the dispatcher would service this source now: enabled, flagged, and for the two
    /// MSSP sources, the module is in the matching mode
    pub fn is_pending(self) -> bool {
        let routed = match self {
            Source::Spi => mssp_in_spi_mode(),
            Source::I2c => !mssp_in_spi_mode(),
            _ => true,
        };
        routed && self.is_enabled() && self.is_flagged()
    }

    /// Vector the source is currently assigned to. INT0 is always high priority.
    pub fn priority(self) -> Priority {
        match self.bits().priority {
            Some((reg, bit)) if !reg.is_set(bit) => Priority::Low,
            _ => Priority::High,
        }
    }

    pub(crate) fn enable(self) {
        let (reg, bit) = self.bits().enable;
        reg.set_bit(bit);
    }

    pub(crate) fn disable(self) {
        let (reg, bit) = self.bits().enable;
        reg.clear_bit(bit);
    }

    /// Clear the flag. TXIF and RCIF are read-only and clear themselves when the buffer is
    /// written or read.
    pub(crate) fn clear_flag(self) {
        if matches!(self, Source::EusartTx | Source::EusartRx) {
            return;
        }
        let (reg, bit) = self.bits().flag;
        reg.clear_bit(bit);
    }

    /// Program the priority bit. Has no effect on INT0 or without the `priority-levels` feature.
    pub(crate) fn set_priority(self, priority: Priority) {
        if !config::PRIORITY_LEVELS {
            return;
        }
        if let Some((reg, bit)) = self.bits().priority {
            reg.write_bit(bit, priority == Priority::High);
        }
    }

    fn service(self) {
        match self {
            Source::Int0 => crate::external::service(0),
            Source::Int1 => crate::external::service(1),
            Source::Int2 => crate::external::service(2),
            Source::PortBChange => service_pin_change(),
            Source::Adc => crate::adc::service(),
            Source::Timer0 => crate::timer0::service(),
            Source::Timer1 => crate::timer::service::<crate::timer::Tmr1>(),
            Source::Timer2 => crate::timer2::service(),
            Source::Timer3 => crate::timer::service::<crate::timer::Tmr3>(),
            Source::Ccp1 => crate::ccp::service(crate::ccp::CcpInstance::Ccp1),
            Source::Ccp2 => crate::ccp::service(crate::ccp::CcpInstance::Ccp2),
            Source::EusartTx => crate::serial::service_tx(),
            Source::EusartRx => crate::serial::service_rx(),
            Source::Spi => crate::spi::service(),
            Source::I2c => crate::i2c::service(),
            Source::I2cBusCollision => crate::i2c::service_bus_collision(),
        }
    }
}

fn mssp_in_spi_mode() -> bool {
    pac::SSPCON1.read_field(pac::sspcon1::SSPM, 4) <= 5
}

/// Register `irq` in `slot` and enable `source`, or leave the source disabled with an empty slot
/// when `irq` is `None`. The source is disabled while the slot is written.
pub(crate) fn attach(source: Source, slot: &Slot, irq: Option<Irq>) {
    source.disable();
    if !source.compiled() {
        if irq.is_some() {
            warn!("interrupt: callback ignored, source {} not compiled in", source as u8);
        }
        slot.set(None);
        return;
    }
    slot.set(irq.map(|irq| irq.handler));
    source.clear_flag();
    if let Some(irq) = irq {
        arm(source, irq.priority);
        source.enable();
    }
}

/// Program the priority of `source` and the global enables it needs
pub(crate) fn arm(source: Source, priority: Priority) {
    if config::PRIORITY_LEVELS {
        source.set_priority(priority);
        enable_priority_levels();
        enable_high();
        if priority == Priority::Low {
            enable_low();
        }
    } else {
        enable_global();
        enable_peripheral();
    }
}

/// Disable `source` and clear its slot
pub(crate) fn detach(source: Source, slot: &Slot) {
    source.disable();
    slot.set(None);
}

/// Set `INTCON.GIE`
#[inline]
pub fn enable_global() {
    pac::INTCON.set_bit(intcon::GIE);
}

/// Clear `INTCON.GIE`, masking every interrupt
#[inline]
pub fn disable_global() {
    pac::INTCON.clear_bit(intcon::GIE);
}

/// Set `INTCON.PEIE` so peripheral sources reach the CPU
#[inline]
pub fn enable_peripheral() {
    pac::INTCON.set_bit(intcon::PEIE);
}

/// Clear `INTCON.PEIE`
#[inline]
pub fn disable_peripheral() {
    pac::INTCON.clear_bit(intcon::PEIE);
}

/// Set `RCON.IPEN`, splitting sources between the two vectors
#[inline]
pub fn enable_priority_levels() {
    pac::RCON.set_bit(rcon::IPEN);
}

/// Clear `RCON.IPEN`, returning to the single flat vector
#[inline]
pub fn disable_priority_levels() {
    pac::RCON.clear_bit(rcon::IPEN);
}

/// Set `INTCON.GIEH`, enabling high-priority sources
#[inline]
pub fn enable_high() {
    pac::INTCON.set_bit(intcon::GIE);
}

/// Set `INTCON.GIEL`, enabling low-priority sources
#[inline]
pub fn enable_low() {
    pac::INTCON.set_bit(intcon::PEIE);
}

#[inline]
fn run(filter: impl Fn(Source) -> bool) {
    for source in Source::ALL {
        if source.compiled() && filter(source) && source.is_pending() {
            source.service();
        }
    }
}

/// Body of the single interrupt vector. Call it from the device's interrupt entry point.
#[cfg(not(feature = "priority-levels"))]
pub fn dispatch() {
    run(|_| true);
}

/// Body of the high-priority vector. Call it from the device's high-priority entry point.
#[cfg(feature = "priority-levels")]
pub fn dispatch_high() {
    run(|source| source.priority() == Priority::High);
}

/// Body of the low-priority vector. Call it from the device's low-priority entry point.
#[cfg(feature = "priority-levels")]
pub fn dispatch_low() {
    run(|source| source.priority() == Priority::Low);
}

/// Record the current level of the RB4..RB7 pins in `mask` as the reference for the next edge
pub(crate) fn seed_pin_change(mask: u8, level: u8) {
    critical_section::with(|cs| {
        let last = RB_LAST.borrow(cs);
        last.set((last.get() & !mask) | (level & mask));
    });
}

pub(crate) fn service_pin_change() {
    let level = pac::PORTB.read();
    pac::INTCON.clear_bit(intcon::RBIF);

    let changed = critical_section::with(|cs| {
        let last = RB_LAST.borrow(cs);
        let changed = (level ^ last.get()) & 0xF0;
        last.set(last.get() ^ changed);
        changed
    });

    for n in 0..4 {
        let mask = 1 << (n + 4);
        if changed & mask == 0 {
            continue;
        }
        if level & mask != 0 {
            HANDLERS.rb_rising[n].fire();
        } else {
            HANDLERS.rb_falling[n].fire();
        }
    }
}

#[cfg(not(target_os = "none"))]
pub(crate) fn reset() {
    HANDLERS.clear();
    critical_section::with(|cs| RB_LAST.borrow(cs).set(0xF0));
}

#[cfg(all(feature = "critical-section-single-core", target_os = "none"))]
mod single_core {
    use crate::config;
    use crate::pac::{self, intcon};

    struct SingleCoreCriticalSection;
    critical_section::set_impl!(SingleCoreCriticalSection);

    const MASK: u8 = if config::PRIORITY_LEVELS {
        (1 << intcon::GIE) | (1 << intcon::PEIE)
    } else {
        1 << intcon::GIE
    };

    unsafe impl critical_section::Impl for SingleCoreCriticalSection {
        unsafe fn acquire() -> u8 {
            let state = pac::INTCON.read() & MASK;
            pac::INTCON.clear_bits(MASK);
            state
        }

        unsafe fn release(state: u8) {
            pac::INTCON.set_bits(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::vec::Vec;

    static ORDER: std::sync::Mutex<Vec<&'static str>> = std::sync::Mutex::new(Vec::new());

    fn adc_cb() {
        ORDER.lock().unwrap().push("adc");
    }
    fn tmr1_cb() {
        ORDER.lock().unwrap().push("tmr1");
    }

    #[test]
    fn sources_serviced_in_order() {
        if !(config::ADC_INTERRUPT && config::TIMER1_INTERRUPT) {
            return;
        }
        let _s = sim::session();
        ORDER.lock().unwrap().clear();
        attach(Source::Timer1, &HANDLERS.timer1, Some(Irq::new(tmr1_cb)));
        attach(Source::Adc, &HANDLERS.adc, Some(Irq::new(adc_cb)));
        sim::raise(pac::PIR1, pir1::TMR1IF);
        sim::raise(pac::PIR1, pir1::ADIF);

        // ADC is visited before Timer1 regardless of which fired first
        sim::service_interrupts();
        assert_eq!(*ORDER.lock().unwrap(), ["adc", "tmr1"]);
        assert!(!Source::Adc.is_flagged());
        assert!(!Source::Timer1.is_flagged());

        sim::service_interrupts();
        assert_eq!(ORDER.lock().unwrap().len(), 2);
    }

    static HITS: AtomicUsize = AtomicUsize::new(0);
    fn hit() {
        HITS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn attach_enables_and_detach_disables() {
        if !config::TIMER2_INTERRUPT {
            return;
        }
        let _s = sim::session();
        attach(Source::Timer2, &HANDLERS.timer2, Some(Irq::new(hit)));
        assert!(Source::Timer2.is_enabled());
        assert!(pac::INTCON.is_set(intcon::GIE));
        assert!(pac::INTCON.is_set(intcon::PEIE));
        assert!(HANDLERS.timer2.is_set());

        detach(Source::Timer2, &HANDLERS.timer2);
        assert!(!Source::Timer2.is_enabled());
        assert!(!HANDLERS.timer2.is_set());
    }

    #[test]
    fn attach_without_callback_leaves_source_off() {
        let _s = sim::session();
        sim::raise(pac::PIR2, pir2::TMR3IF);
        attach(Source::Timer3, &HANDLERS.timer3, None);
        assert!(!Source::Timer3.is_enabled());
        assert!(!Source::Timer3.is_flagged());
    }

    #[test]
    fn int0_is_always_high_priority() {
        let _s = sim::session();
        assert_eq!(Source::Int0.priority(), Priority::High);
        pac::IPR1.clear_bit(pir1::ADIF);
        assert_eq!(Source::Adc.priority(), Priority::Low);
    }

    #[test]
    fn mssp_sources_follow_mode() {
        let _s = sim::session();
        pac::PIE1.set_bit(pir1::SSPIF);
        sim::raise(pac::PIR1, pir1::SSPIF);
        pac::SSPCON1.write(0x20);
        assert!(Source::Spi.is_pending());
        assert!(!Source::I2c.is_pending());
        pac::SSPCON1.write(0x28);
        assert!(!Source::Spi.is_pending());
        assert!(Source::I2c.is_pending());
    }
}
