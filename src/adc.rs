//! 10-bit analog-to-digital converter
//!
//! Thirteen inputs AN0..AN12 spread over ports A, B and E. Selecting a channel makes its pin an
//! input and, if needed, widens the `PCFG` analog/digital split so the pin is analog. Since the
//! split always covers AN0 up to some ANn, channels below the selected one become analog too.
//!
//! The converter times its own acquisition (`ACQT`), so a conversion is just "select, set GO,
//! wait for GO to clear". The blocking read bounds that wait; the interrupt variant returns right
//! after setting GO and the conversion-complete callback reads the result.

use crate::error::{Error, Result};
use crate::gpio::{self, Direction, Port};
use crate::interrupt::{self, Irq, Source, HANDLERS};
use crate::pac::{self, adcon0, adcon1, adcon2};
use crate::util::spin_until;

/// Acquisition time in `TAD` periods, in `ACQT` order
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcquisitionTime {
    /// 0 TAD, acquisition timed by software
    Tad0 = 0,
    /// 2 TAD
    Tad2 = 1,
    /// 4 TAD
    Tad4 = 2,
    /// 6 TAD
    Tad6 = 3,
    /// 8 TAD
    Tad8 = 4,
    /// 12 TAD
    Tad12 = 5,
    /// 16 TAD
    Tad16 = 6,
    /// 20 TAD
    Tad20 = 7,
}

/// Conversion clock, in `ADCS` encoding
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConversionClock {
    /// Fosc / 2
    FoscDiv2 = 0,
    /// Fosc / 8
    FoscDiv8 = 1,
    /// Fosc / 32
    FoscDiv32 = 2,
    /// Dedicated RC oscillator
    Frc = 3,
    /// Fosc / 4
    FoscDiv4 = 4,
    /// Fosc / 16
    FoscDiv16 = 5,
    /// Fosc / 64
    FoscDiv64 = 6,
}

/// Analog input
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum Channel {
    An0 = 0,
    An1,
    An2,
    An3,
    An4,
    An5,
    An6,
    An7,
    An8,
    An9,
    An10,
    An11,
    An12,
}

impl Channel {
    /// Pin the channel is bonded to
    pub const fn pin(self) -> (Port, u8) {
        match self {
            Channel::An0 => (Port::A, 0),
            Channel::An1 => (Port::A, 1),
            Channel::An2 => (Port::A, 2),
            Channel::An3 => (Port::A, 3),
            Channel::An4 => (Port::A, 5),
            Channel::An5 => (Port::E, 0),
            Channel::An6 => (Port::E, 1),
            Channel::An7 => (Port::E, 2),
            Channel::An8 => (Port::B, 2),
            Channel::An9 => (Port::B, 3),
            Channel::An10 => (Port::B, 1),
            Channel::An11 => (Port::B, 4),
            Channel::An12 => (Port::B, 0),
        }
    }
}

impl TryFrom<u8> for Channel {
    type Error = Error;

    fn try_from(n: u8) -> Result<Self> {
        const ALL: [Channel; 13] = [
            Channel::An0,
            Channel::An1,
            Channel::An2,
            Channel::An3,
            Channel::An4,
            Channel::An5,
            Channel::An6,
            Channel::An7,
            Channel::An8,
            Channel::An9,
            Channel::An10,
            Channel::An11,
            Channel::An12,
        ];
        ALL.get(usize::from(n))
            .copied()
            .ok_or(Error::InvalidArgument)
    }
}

/// Placement of the 10-bit result in `ADRESH:ADRESL`
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResultFormat {
    /// Bits 9:0 of the register pair
    Right,
    /// Bits 15:6 of the register pair
    Left,
}

/// Conversion reference
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VoltageReference {
    /// VDD and VSS
    Internal,
    /// VREF+ on AN3 and VREF- on AN2
    External,
}

/// ADC configuration
#[derive(Clone, Copy, Debug)]
pub struct AdcConfig {
    /// Acquisition time
    pub acquisition_time: AcquisitionTime,
    /// Conversion clock
    pub conversion_clock: ConversionClock,
    /// Channel selected at init
    pub channel: Channel,
    /// Result alignment
    pub format: ResultFormat,
    /// Reference voltages
    pub reference: VoltageReference,
    /// Conversion-complete callback
    pub interrupt: Option<Irq>,
}

/// Number of analog inputs enabled by a `PCFG` value
fn analog_count(pcfg: u8) -> u8 {
    match pcfg {
        0..=2 => 13,
        0xF => 0,
        n => 0xF - n,
    }
}

fn select(channel: Channel) {
    let n = channel as u8;
    pac::ADCON0.write_field(adcon0::CHS, 4, n);
    let (port, pin) = channel.pin();
    gpio::set_direction(port, pin, Direction::Input);
    if analog_count(pac::ADCON1.read_field(adcon1::PCFG, 4)) <= n {
        pac::ADCON1.write_field(adcon1::PCFG, 4, 0x0E - n);
    }
}

fn compose(format: ResultFormat, high: u8, low: u8) -> u16 {
    let (high, low) = (u16::from(high), u16::from(low));
    match format {
        ResultFormat::Right => (high << 8) | low,
        ResultFormat::Left => (high << 2) | (low >> 6),
    }
}

impl AdcConfig {
    /// Turn the converter off, program timing, alignment, channel and reference, register the
    /// callback and turn the converter on.
    pub fn init(&self) -> Result<Adc> {
        pac::ADCON0.clear_bit(adcon0::ADON);
        pac::ADCON2.write_field(adcon2::ACQT, 3, self.acquisition_time as u8);
        pac::ADCON2.write_field(adcon2::ADCS, 3, self.conversion_clock as u8);
        pac::ADCON2.write_bit(adcon2::ADFM, self.format == ResultFormat::Right);
        select(self.channel);
        let external = self.reference == VoltageReference::External;
        pac::ADCON1.write_bit(adcon1::VCFG1, external);
        pac::ADCON1.write_bit(adcon1::VCFG0, external);
        interrupt::attach(Source::Adc, &HANDLERS.adc, self.interrupt);
        pac::ADCON0.set_bit(adcon0::ADON);
        debug!("adc: on, AN{}", self.channel as u8);
        Ok(Adc {
            format: self.format,
        })
    }
}

/// Running converter
#[derive(Debug)]
pub struct Adc {
    format: ResultFormat,
}

impl Adc {
    /// Switch the multiplexer to `channel` and make its pin an analog input
    pub fn select_channel(&mut self, channel: Channel) {
        select(channel)
    }

    /// Start converting the selected channel
    pub fn start_conversion(&mut self) {
        pac::ADCON0.set_bit(adcon0::GO);
    }

    /// Whether the last conversion has finished
    pub fn is_conversion_done(&self) -> bool {
        !pac::ADCON0.is_set(adcon0::GO)
    }

    /// Result of the last conversion, 0..=1023
    pub fn result(&self) -> u16 {
        compose(self.format, pac::ADRESH.read(), pac::ADRESL.read())
    }

    /// Select `channel`, convert it and return the result
    pub fn read_blocking(&mut self, channel: Channel) -> Result<u16> {
        self.select_channel(channel);
        self.start_conversion();
        spin_until(|| self.is_conversion_done())
            .inspect_err(|_| error!("adc: conversion did not finish"))?;
        Ok(self.result())
    }

    /// Select `channel` and start converting it. The conversion-complete callback runs when the
    /// result is ready.
    pub fn start_conversion_interrupt(&mut self, channel: Channel) {
        self.select_channel(channel);
        Source::Adc.clear_flag();
        self.start_conversion();
    }

    /// Turn the converter off and drop its callback
    pub fn deinit(self) {
        pac::ADCON0.clear_bit(adcon0::ADON);
        interrupt::detach(Source::Adc, &HANDLERS.adc);
        debug!("adc: off");
    }
}

pub(crate) fn service() {
    Source::Adc.clear_flag();
    HANDLERS.adc.fire();
}
