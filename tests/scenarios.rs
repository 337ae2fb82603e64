//! End-to-end driver sequences on the simulated chip

use pic18f4620_mcal::adc::{
    AcquisitionTime, AdcConfig, Channel, ConversionClock, ResultFormat, VoltageReference,
};
use pic18f4620_mcal::ccp::{CcpConfig, CcpInstance, CcpMode};
use pic18f4620_mcal::clock::{ClockConfig, Fosc};
use pic18f4620_mcal::gpio::{Direction, Logic, PinConfig, Port};
use pic18f4620_mcal::i2c::{Ack, I2cConfig, I2cMode, MasterState};
use pic18f4620_mcal::interrupt::{Irq, Priority};
use pic18f4620_mcal::pac::{self, intcon};
use pic18f4620_mcal::serial::{BaudGenerator, EusartConfig, RxConfig, TxConfig};
use pic18f4620_mcal::timer0::{Timer0Config, Timer0Prescaler, Timer0Source, Timer0Width};
use pic18f4620_mcal::timer2::Timer2Prescaler;
use pic18f4620_mcal::{config, sim};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

fn fosc() -> Fosc {
    ClockConfig::primary(4_000_000).freeze().unwrap()
}

#[test]
fn led_toggles() {
    let _s = sim::session();
    let mut led = PinConfig::new(Port::B, 0, Direction::Output, Logic::High)
        .init()
        .unwrap();
    assert!(!pac::TRISB.is_set(0));

    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(led.read());
        led.toggle();
    }
    assert_eq!(seen, [Logic::High, Logic::Low, Logic::High, Logic::Low]);
}

#[test]
fn potentiometer_reading() {
    let _s = sim::session();
    let mut adc = AdcConfig {
        acquisition_time: AcquisitionTime::Tad4,
        conversion_clock: ConversionClock::FoscDiv8,
        channel: Channel::An0,
        format: ResultFormat::Right,
        reference: VoltageReference::Internal,
        interrupt: None,
    }
    .init()
    .unwrap();

    sim::set_analog(3, 0x3FF);
    assert_eq!(adc.read_blocking(Channel::An3), Ok(1023));
    sim::set_analog(3, 512);
    let value = adc.read_blocking(Channel::An3).unwrap();
    assert_eq!(value, 512);
    assert!(pac::TRISA.is_set(3));
}

static TICKS: AtomicUsize = AtomicUsize::new(0);
fn tick() {
    TICKS.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn periodic_tick() {
    if !config::TIMER0_INTERRUPT {
        return;
    }
    let _s = sim::session();
    TICKS.store(0, Ordering::SeqCst);
    let mut tmr = Timer0Config {
        prescaler: Some(Timer0Prescaler::Div16),
        source: Timer0Source::Timer,
        width: Timer0Width::Bits8,
        preload: 100,
        interrupt: Some(Irq::new(tick)),
    }
    .init()
    .unwrap();

    for n in 1..=3 {
        tmr.write(0);
        sim::raise(pac::INTCON, intcon::TMR0IF);
        sim::service_interrupts();
        assert_eq!(TICKS.load(Ordering::SeqCst), n);
        assert_eq!(tmr.read(), 100);
    }
}

#[test]
fn quarter_duty_pwm() {
    let _s = sim::session();
    let mut ccp = CcpConfig {
        instance: CcpInstance::Ccp1,
        mode: CcpMode::Pwm {
            frequency: 1000,
            timer2_prescaler: Timer2Prescaler::Div4,
        },
        timer_routing: None,
        interrupt: None,
    }
    .init(&fosc())
    .unwrap();
    ccp.pwm_set_duty(25).unwrap();
    ccp.pwm_start().unwrap();

    assert_eq!(sim::peek(pac::PR2), 249);
    let pwm = ccp.into_pwm().unwrap();
    assert_eq!(pwm.duty(), 250);
}

#[test]
fn serial_loopback() {
    let _s = sim::session();
    let mut port = EusartConfig {
        baud_rate: 9600,
        baud_gen: BaudGenerator::Async8High,
        tx: TxConfig {
            enable: true,
            ..TxConfig::default()
        },
        rx: RxConfig {
            enable: true,
            ..RxConfig::default()
        },
    }
    .init(&fosc())
    .unwrap();
    sim::set_uart_loopback(true);

    port.write_byte(0x5A).unwrap();
    assert_eq!(port.read_byte(), Ok(0x5A));
    assert_eq!(sim::uart_sent(), [0x5A]);
}

#[test]
fn eeprom_address_write() {
    let _s = sim::session();
    let mut m = I2cConfig {
        mode: I2cMode::Master { clock_hz: 100_000 },
        slew_rate: false,
        smbus: false,
        interrupt: None,
        on_receive_overflow: None,
        bus_collision: None,
    }
    .init(&fosc())
    .unwrap()
    .into_master()
    .unwrap();
    sim::set_i2c_ack(true);

    m.start().unwrap();
    assert_eq!(m.write(0x50 << 1), Ok(Ack::Ack));
    assert_eq!(m.write(0x00), Ok(Ack::Ack));
    m.stop().unwrap();

    assert_eq!(m.state(), MasterState::Idle);
    assert_eq!(sim::i2c_sent(), [0xA0, 0x00]);
}

static EDGES: Mutex<Vec<&str>> = Mutex::new(Vec::new());
fn rb4_rise() {
    EDGES.lock().unwrap().push("rise");
}
fn rb4_fall() {
    EDGES.lock().unwrap().push("fall");
}

#[test]
fn button_edges() {
    use pic18f4620_mcal::external::{PinChangeInterrupt, RbPin};

    if !config::PIN_CHANGE_INTERRUPT {
        return;
    }
    let _s = sim::session();
    EDGES.lock().unwrap().clear();
    // Button released, pin low when armed
    PinChangeInterrupt {
        pin: RbPin::Rb4,
        priority: Priority::High,
        on_rising: Some(rb4_rise),
        on_falling: Some(rb4_fall),
    }
    .init()
    .unwrap();

    for level in [true, false, true] {
        sim::drive_pin(Port::B, 4, level);
        sim::service_interrupts();
    }
    assert_eq!(*EDGES.lock().unwrap(), ["rise", "fall", "rise"]);
}
