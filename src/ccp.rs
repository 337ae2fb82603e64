//! Capture/Compare/PWM modules CCP1 and CCP2
//!
//! Each module runs in one of three modes:
//!
//! * Capture: latch the 16-bit value of Timer1 or Timer3 into `CCPRx` on a selected edge pattern
//!   of the CCPx pin.
//! * Compare: compare `CCPRx` against Timer1 or Timer3 and act on the CCPx pin on a match.
//! * PWM: drive CCPx with a period set by Timer2's `PR2` and a 10-bit duty cycle. See
//!   [`crate::pwm`].
//!
//! Which timer serves capture and compare is a single setting for both modules
//! ([`TimerRouting`]), held in `T3CON`.
//!
//! CCP1 is on RC2 and CCP2 on RC1 (the default `CCP2MX` configuration).

use crate::clock::Fosc;
use crate::error::{Error, Result};
use crate::gpio::{self, Direction, Port};
use crate::hw_traits::ccp::{self as regs, CcpRegs, CCPS};
use crate::interrupt::{self, Irq, Slot, Source, HANDLERS};
use crate::pwm::{self, Pwm};
use crate::timer2::Timer2Prescaler;

pub(crate) const MODE_OFF: u8 = 0x0;
pub(crate) const MODE_PWM: u8 = 0xC;

/// CCP module
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CcpInstance {
    /// CCP1 on RC2
    Ccp1 = 0,
    /// CCP2 on RC1
    Ccp2 = 1,
}

impl CcpInstance {
    #[inline(always)]
    pub(crate) fn regs(self) -> &'static CcpRegs {
        &CCPS[self as usize]
    }

    /// Pin number on port C
    pub const fn pin(self) -> u8 {
        match self {
            CcpInstance::Ccp1 => 2,
            CcpInstance::Ccp2 => 1,
        }
    }

    fn source(self) -> Source {
        match self {
            CcpInstance::Ccp1 => Source::Ccp1,
            CcpInstance::Ccp2 => Source::Ccp2,
        }
    }

    fn slot(self) -> &'static Slot {
        match self {
            CcpInstance::Ccp1 => &HANDLERS.ccp1,
            CcpInstance::Ccp2 => &HANDLERS.ccp2,
        }
    }
}

/// Edge pattern that triggers a capture, in `CCPxM` encoding
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CaptureEdge {
    /// Every falling edge
    EveryFalling = 0x4,
    /// Every rising edge
    EveryRising = 0x5,
    /// Every 4th rising edge
    Every4thRising = 0x6,
    /// Every 16th rising edge
    Every16thRising = 0x7,
}

/// Action on a compare match, in `CCPxM` encoding
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CompareAction {
    /// Toggle the pin
    Toggle = 0x2,
    /// Pin starts low and is driven high
    SetHigh = 0x8,
    /// Pin starts high and is driven low
    SetLow = 0x9,
    /// Pin untouched, only the interrupt flag is raised
    SoftwareInterrupt = 0xA,
    /// Reset the timer (and on CCP2 start an A/D conversion if the converter is on)
    SpecialEvent = 0xB,
}

/// Operating mode
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CcpMode {
    /// Capture the routed timer
    Capture(CaptureEdge),
    /// Compare against the routed timer
    Compare(CompareAction),
    /// Pulse-width modulation on the Timer2 time base
    Pwm {
        /// Output frequency in Hz
        frequency: u32,
        /// Prescaler Timer2 runs with. Only used to compute `PR2`; Timer2 itself is set up with
        /// [`Timer2Config`](crate::timer2::Timer2Config).
        timer2_prescaler: Timer2Prescaler,
    },
}

/// Timer used by capture and compare, in `T3CCP2:T3CCP1` encoding
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerRouting {
    /// Both modules use Timer1
    Timer1 = 0b00,
    /// CCP1 uses Timer1, CCP2 uses Timer3
    Ccp1Timer1Ccp2Timer3 = 0b01,
    /// Both modules use Timer3
    Timer3 = 0b10,
}

impl TimerRouting {
    /// Routing currently programmed
    pub fn current() -> Self {
        match regs::routing_rd() {
            0b00 => TimerRouting::Timer1,
            0b01 => TimerRouting::Ccp1Timer1Ccp2Timer3,
            _ => TimerRouting::Timer3,
        }
    }
}

/// CCP configuration
#[derive(Clone, Copy, Debug)]
pub struct CcpConfig {
    /// Module
    pub instance: CcpInstance,
    /// Operating mode
    pub mode: CcpMode,
    /// Timer routing for capture and compare. Shared by both modules; `None` keeps the current
    /// routing. Ignored in PWM mode.
    pub timer_routing: Option<TimerRouting>,
    /// Capture/compare event callback. Ignored in PWM mode.
    pub interrupt: Option<Irq>,
}

impl CcpConfig {
    /// Turn the module off, program timer routing or the PWM period, set up the pin, register
    /// the callback and turn the module on in the selected mode. `fosc` is only used in PWM mode.
    pub fn init(&self, fosc: &Fosc) -> Result<Ccp> {
        let period = match self.mode {
            CcpMode::Pwm {
                frequency,
                timer2_prescaler,
            } => Some(
                pwm::period_register(fosc, frequency, timer2_prescaler)
                    .inspect_err(|_| warn!("ccp: {} Hz not reachable", frequency))?,
            ),
            _ => None,
        };

        let instance = self.instance;
        let regs = instance.regs();
        regs.ccpm_wr(MODE_OFF);

        let mode = match self.mode {
            CcpMode::Capture(edge) => {
                self.route();
                gpio::set_direction(Port::C, instance.pin(), Direction::Input);
                edge as u8
            }
            CcpMode::Compare(action) => {
                self.route();
                gpio::set_direction(Port::C, instance.pin(), Direction::Output);
                action as u8
            }
            CcpMode::Pwm { .. } => {
                if let Some(period) = period {
                    crate::timer2::write_period(period);
                }
                gpio::set_direction(Port::C, instance.pin(), Direction::Output);
                MODE_PWM
            }
        };

        let irq = match self.mode {
            CcpMode::Pwm { .. } => None,
            _ => self.interrupt,
        };
        interrupt::attach(instance.source(), instance.slot(), irq);

        regs.ccpm_wr(mode);
        debug!("ccp{}: mode {}", instance as u8 + 1, mode);
        Ok(Ccp { instance, mode })
    }

    fn route(&self) {
        if let Some(routing) = self.timer_routing {
            regs::routing_wr(routing as u8);
        }
    }
}

/// Configured CCP module
#[derive(Debug)]
pub struct Ccp {
    instance: CcpInstance,
    mode: u8,
}

impl Ccp {
    /// Module this handle drives
    pub fn instance(&self) -> CcpInstance {
        self.instance
    }

    /// Whether a capture happened since the last call. Clears the flag.
    pub fn is_capture_ready(&mut self) -> bool {
        take_flag(self.instance)
    }

    /// Last captured timer value
    pub fn capture_value(&self) -> u16 {
        self.instance.regs().ccpr_rd()
    }

    /// Whether a compare match happened since the last call. Clears the flag.
    pub fn is_compare_complete(&mut self) -> bool {
        take_flag(self.instance)
    }

    /// Value the routed timer is compared against. Fails with `InvalidArgument` unless the
    /// module was set up for compare.
    pub fn set_compare_value(&mut self, value: u16) -> Result {
        self.expect_mode(is_compare(self.mode))?;
        self.instance.regs().ccpr_wr(value);
        Ok(())
    }

    /// Set the PWM duty cycle in percent. Values above 100 saturate. Fails with
    /// `InvalidArgument` unless the module was set up for PWM.
    pub fn pwm_set_duty(&mut self, percent: u8) -> Result {
        self.expect_mode(self.mode == MODE_PWM)?;
        pwm::set_duty_percent(self.instance, percent);
        Ok(())
    }

    /// Put the module back into PWM mode. Fails with `InvalidArgument` unless the module was
    /// set up for PWM.
    pub fn pwm_start(&mut self) -> Result {
        self.expect_mode(self.mode == MODE_PWM)?;
        pwm::start(self.instance);
        Ok(())
    }

    /// Turn the module off; the pin holds its last latch level. Fails with `InvalidArgument`
    /// unless the module was set up for PWM.
    pub fn pwm_stop(&mut self) -> Result {
        self.expect_mode(self.mode == MODE_PWM)?;
        pwm::stop(self.instance);
        Ok(())
    }

    fn expect_mode(&self, matches: bool) -> Result {
        if matches {
            Ok(())
        } else {
            warn!("ccp{}: operation not valid in mode {}", self.instance as u8 + 1, self.mode);
            Err(Error::InvalidArgument)
        }
    }

    /// PWM channel handle, if the module was set up for PWM
    pub fn into_pwm(self) -> Result<Pwm> {
        if self.mode == MODE_PWM {
            Ok(Pwm::new(self.instance))
        } else {
            Err(Error::InvalidArgument)
        }
    }

    /// Turn the module off and drop its callback
    pub fn deinit(self) {
        deinit(self.instance)
    }
}

pub(crate) fn deinit(instance: CcpInstance) {
    instance.regs().ccpm_wr(MODE_OFF);
    interrupt::detach(instance.source(), instance.slot());
    debug!("ccp{}: off", instance as u8 + 1);
}

fn is_compare(mode: u8) -> bool {
    matches!(mode, 0x2 | 0x8..=0xB)
}

fn take_flag(instance: CcpInstance) -> bool {
    let source = instance.source();
    if source.is_flagged() {
        source.clear_flag();
        true
    } else {
        false
    }
}

pub(crate) fn service(instance: CcpInstance) {
    instance.source().clear_flag();
    instance.slot().fire();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ClockConfig, Fosc};
    use crate::pac::{self, pir1, pir2, t3con};
    use crate::sim;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fosc_4mhz() -> Fosc {
        ClockConfig::primary(4_000_000).freeze().unwrap()
    }

    static CAPTURES: AtomicUsize = AtomicUsize::new(0);
    fn on_capture() {
        CAPTURES.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn capture_on_ccp1() {
        let _s = sim::session();
        let fosc = fosc_4mhz();
        pac::TRISC.write(0x00);
        let cfg = CcpConfig {
            instance: CcpInstance::Ccp1,
            mode: CcpMode::Capture(CaptureEdge::Every4thRising),
            timer_routing: Some(TimerRouting::Timer3),
            interrupt: None,
        };
        let mut ccp = cfg.init(&fosc).unwrap();
        assert_eq!(sim::peek(pac::CCP1CON) & 0x0F, 0x6);
        assert!(pac::TRISC.is_set(2));
        assert_eq!(TimerRouting::current(), TimerRouting::Timer3);
        assert!(pac::T3CON.is_set(t3con::T3CCP2));

        assert!(!ccp.is_capture_ready());
        sim::poke(pac::CCPR1L, 0x34);
        sim::poke(pac::CCPR1H, 0x12);
        sim::raise(pac::PIR1, pir1::CCP1IF);
        assert!(ccp.is_capture_ready());
        assert!(!pac::PIR1.is_set(pir1::CCP1IF));
        assert_eq!(ccp.capture_value(), 0x1234);
    }

    #[test]
    fn compare_on_ccp2() {
        let _s = sim::session();
        let fosc = fosc_4mhz();
        CAPTURES.store(0, Ordering::SeqCst);
        let cfg = CcpConfig {
            instance: CcpInstance::Ccp2,
            mode: CcpMode::Compare(CompareAction::Toggle),
            timer_routing: Some(TimerRouting::Ccp1Timer1Ccp2Timer3),
            interrupt: Some(Irq::new(on_capture)),
        };
        let mut ccp = cfg.init(&fosc).unwrap();
        assert_eq!(sim::peek(pac::CCP2CON) & 0x0F, 0x2);
        assert!(!pac::TRISC.is_set(1));
        assert!(!pac::T3CON.is_set(t3con::T3CCP2));
        assert!(pac::T3CON.is_set(t3con::T3CCP1));

        ccp.set_compare_value(0xA55A).unwrap();
        assert_eq!(sim::peek(pac::CCPR2H), 0xA5);
        assert_eq!(sim::peek(pac::CCPR2L), 0x5A);

        if crate::config::CCP2_INTERRUPT {
            sim::raise(pac::PIR2, pir2::CCP2IF);
            sim::service_interrupts();
            assert_eq!(CAPTURES.load(Ordering::SeqCst), 1);
            assert!(!ccp.is_compare_complete());
        }

        ccp.deinit();
        assert_eq!(sim::peek(pac::CCP2CON) & 0x0F, 0);
        assert!(!pac::PIE2.is_set(pir2::CCP2IF));
    }

    #[test]
    fn routing_untouched_without_override() {
        let _s = sim::session();
        let fosc = fosc_4mhz();
        pac::T3CON.write(1 << t3con::T3CCP1);
        let cfg = CcpConfig {
            instance: CcpInstance::Ccp1,
            mode: CcpMode::Compare(CompareAction::SoftwareInterrupt),
            timer_routing: None,
            interrupt: None,
        };
        cfg.init(&fosc).unwrap();
        assert_eq!(TimerRouting::current(), TimerRouting::Ccp1Timer1Ccp2Timer3);
    }

    #[test]
    fn pwm_ops_rejected_on_capture() {
        let _s = sim::session();
        let fosc = fosc_4mhz();
        let cfg = CcpConfig {
            instance: CcpInstance::Ccp1,
            mode: CcpMode::Capture(CaptureEdge::EveryRising),
            timer_routing: None,
            interrupt: None,
        };
        let mut ccp = cfg.init(&fosc).unwrap();
        sim::poke(pac::CCPR1L, 0x34);
        let writes = sim::write_count();

        assert_eq!(ccp.pwm_set_duty(50), Err(Error::InvalidArgument));
        assert_eq!(ccp.pwm_start(), Err(Error::InvalidArgument));
        assert_eq!(ccp.pwm_stop(), Err(Error::InvalidArgument));
        assert_eq!(ccp.set_compare_value(0xFFFF), Err(Error::InvalidArgument));
        assert_eq!(sim::write_count(), writes);
        assert_eq!(sim::peek(pac::CCPR1L), 0x34);
        assert_eq!(sim::peek(pac::CCP1CON) & 0x0F, 0x5);
    }

    #[test]
    fn compare_value_rejected_on_pwm() {
        let _s = sim::session();
        let fosc = fosc_4mhz();
        let cfg = CcpConfig {
            instance: CcpInstance::Ccp2,
            mode: CcpMode::Pwm {
                frequency: 1000,
                timer2_prescaler: Timer2Prescaler::Div4,
            },
            timer_routing: None,
            interrupt: None,
        };
        let mut ccp = cfg.init(&fosc).unwrap();
        assert_eq!(ccp.set_compare_value(1), Err(Error::InvalidArgument));
        assert_eq!(ccp.pwm_stop(), Ok(()));
    }

    #[test]
    fn into_pwm_needs_pwm_mode() {
        let _s = sim::session();
        let fosc = fosc_4mhz();
        let cfg = CcpConfig {
            instance: CcpInstance::Ccp1,
            mode: CcpMode::Capture(CaptureEdge::EveryFalling),
            timer_routing: None,
            interrupt: None,
        };
        assert_eq!(
            cfg.init(&fosc).unwrap().into_pwm().err(),
            Some(Error::InvalidArgument)
        );
    }
}
