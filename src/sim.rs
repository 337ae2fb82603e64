//! Simulated register file for hosted builds.
//!
//! When the crate is built for anything other than the bare-metal target, every [`Sfr`] access
//! lands here instead of on the bus. The register file starts at the power-on values of the
//! PIC18F4620 and models just enough peripheral behaviour to drive the blocking paths of the
//! drivers:
//!
//! * `PORTx` reads return the latch for output pins and the level set by [`drive_pin`] for input
//!   pins. Changing RB4..RB7 sets `RBIF`.
//! * Setting `GO` with the converter on completes a conversion immediately, using the value set
//!   by [`set_analog`] and the result format in `ADCON2`.
//! * Bytes written to `TXREG` are recorded and, with [`set_uart_loopback`], looped back into
//!   `RCREG`.
//! * In SPI mode a write to `SSPBUF` exchanges the byte with the value set by [`set_spi_miso`]
//!   (loopback when unset).
//! * In I2C master mode the start, repeated start, stop, receive and acknowledge sequences finish
//!   immediately; written bytes are acknowledged according to [`set_i2c_ack`].
//!
//! Hardware-driven changes can be suppressed with [`hold`], which is how tests reach the timeout
//! and missing-bus-condition paths.
//!
//! Tests must hold a [`Session`] while they touch the registers. It serialises tests on a global
//! lock and resets both the register file and the driver callback tables.

use crate::gpio::Port;
use crate::pac::*;
use std::sync::{Mutex, MutexGuard};
use std::vec::Vec;

const BASE: u16 = 0xF80;
const SIZE: usize = 0x80;

const fn idx(reg: Sfr) -> usize {
    (reg.addr() - BASE) as usize
}

struct Model {
    regs: [u8; SIZE],
    held: [u8; SIZE],
    pins: [u8; 5],
    analog: [u16; 13],
    uart_loopback: bool,
    spi_miso: Option<u8>,
    i2c_ack: bool,
    i2c_rx: u8,
    uart_sent: Vec<u8>,
    spi_sent: Vec<u8>,
    i2c_sent: Vec<u8>,
    i2c_acks: Vec<bool>,
    writes: usize,
}

impl Model {
    const fn new() -> Self {
        let mut regs = [0u8; SIZE];
        regs[idx(TRISA)] = 0xFF;
        regs[idx(TRISB)] = 0xFF;
        regs[idx(TRISC)] = 0xFF;
        regs[idx(TRISD)] = 0xFF;
        regs[idx(TRISE)] = 0x07;
        regs[idx(TXSTA)] = 0x02;
        regs[idx(T0CON)] = 0xFF;
        regs[idx(INTCON2)] = 0xF5;
        regs[idx(INTCON3)] = 0xC0;
        regs[idx(IPR1)] = 0xFF;
        regs[idx(IPR2)] = 0xFF;
        regs[idx(PR2)] = 0xFF;
        Model {
            regs,
            held: [0; SIZE],
            pins: [0; 5],
            analog: [0; 13],
            uart_loopback: false,
            spi_miso: None,
            i2c_ack: true,
            i2c_rx: 0,
            uart_sent: Vec::new(),
            spi_sent: Vec::new(),
            i2c_sent: Vec::new(),
            i2c_acks: Vec::new(),
            writes: 0,
        }
    }

    fn reg(&self, reg: Sfr) -> u8 {
        self.regs[idx(reg)]
    }

    fn bit(&self, reg: Sfr, bit: u8) -> bool {
        self.reg(reg) & (1 << bit) != 0
    }

    // Hardware-side updates. Held bits keep their value.
    fn hw_write(&mut self, reg: Sfr, val: u8) {
        let i = idx(reg);
        let held = self.held[i];
        self.regs[i] = (self.regs[i] & held) | (val & !held);
    }

    fn hw_set(&mut self, reg: Sfr, bit: u8) {
        let v = self.reg(reg) | (1 << bit);
        self.hw_write(reg, v);
    }

    fn hw_clear(&mut self, reg: Sfr, bit: u8) {
        let v = self.reg(reg) & !(1 << bit);
        self.hw_write(reg, v);
    }

    fn port_level(&self, port: usize) -> u8 {
        let tris = self.regs[idx(TRISA) + port];
        let lat = self.regs[idx(LATA) + port];
        (lat & !tris) | (self.pins[port] & tris)
    }

    fn mssp_mode(&self) -> Option<u8> {
        if self.bit(SSPCON1, sspcon1::SSPEN) {
            Some(self.reg(SSPCON1) & 0x0F)
        } else {
            None
        }
    }

    fn read(&mut self, addr: u16) -> u8 {
        let reg = Sfr::at(addr);
        let i = idx(reg);
        if (idx(PORTA)..=idx(PORTE)).contains(&i) {
            return self.port_level(i - idx(PORTA));
        }
        let val = self.regs[i];
        if reg == RCREG {
            self.hw_clear(PIR1, pir1::RCIF);
        } else if reg == SSPBUF {
            self.hw_clear(SSPSTAT, sspstat::BF);
        }
        val
    }

    fn write(&mut self, addr: u16, val: u8) {
        let reg = Sfr::at(addr);
        let i = idx(reg);
        self.writes += 1;
        if (idx(PORTA)..=idx(PORTE)).contains(&i) {
            // Writes to PORTx land in the latch
            self.regs[idx(LATA) + (i - idx(PORTA))] = val;
            return;
        }
        self.regs[i] = val;
        match reg {
            ADCON0 => self.adc_write(),
            TXSTA => {
                // Transmission is instantaneous, so the shift register always reads empty
                self.hw_set(TXSTA, txsta::TRMT);
                if self.bit(TXSTA, txsta::TXEN) {
                    self.hw_set(PIR1, pir1::TXIF);
                } else {
                    self.hw_clear(PIR1, pir1::TXIF);
                }
            }
            TXREG => self.txreg_write(val),
            SSPBUF => self.sspbuf_write(val),
            SSPCON2 => self.sspcon2_write(),
            OSCCON => self.hw_set(OSCCON, osccon::IOFS),
            _ => {}
        }
    }

    fn adc_write(&mut self) {
        if !(self.bit(ADCON0, adcon0::GO) && self.bit(ADCON0, adcon0::ADON)) {
            return;
        }
        let ch = ((self.reg(ADCON0) >> adcon0::CHS) & 0x0F) as usize;
        let v = self.analog.get(ch).copied().unwrap_or(0) & 0x3FF;
        let (high, low) = if self.bit(ADCON2, adcon2::ADFM) {
            ((v >> 8) as u8, v as u8)
        } else {
            ((v >> 2) as u8, ((v & 0x03) << 6) as u8)
        };
        self.hw_write(ADRESH, high);
        self.hw_write(ADRESL, low);
        self.hw_clear(ADCON0, adcon0::GO);
        self.hw_set(PIR1, pir1::ADIF);
    }

    fn txreg_write(&mut self, val: u8) {
        if !self.bit(TXSTA, txsta::TXEN) {
            return;
        }
        self.uart_sent.push(val);
        let receiving = self.bit(RCSTA, rcsta::SPEN) && self.bit(RCSTA, rcsta::CREN);
        if self.uart_loopback && receiving {
            if self.bit(PIR1, pir1::RCIF) {
                self.hw_set(RCSTA, rcsta::OERR);
            } else {
                self.hw_write(RCREG, val);
                self.hw_set(PIR1, pir1::RCIF);
            }
        }
        self.hw_set(TXSTA, txsta::TRMT);
        self.hw_set(PIR1, pir1::TXIF);
    }

    fn sspbuf_write(&mut self, val: u8) {
        match self.mssp_mode() {
            Some(0..=5) => {
                self.spi_sent.push(val);
                if self.bit(SSPSTAT, sspstat::BF) {
                    self.hw_set(SSPCON1, sspcon1::SSPOV);
                }
                let rx = self.spi_miso.unwrap_or(val);
                self.hw_write(SSPBUF, rx);
                self.hw_set(SSPSTAT, sspstat::BF);
                self.hw_set(PIR1, pir1::SSPIF);
            }
            Some(8) => {
                self.i2c_sent.push(val);
                let nack = !self.i2c_ack;
                let con2 = self.reg(SSPCON2);
                let con2 = if nack {
                    con2 | (1 << sspcon2::ACKSTAT)
                } else {
                    con2 & !(1 << sspcon2::ACKSTAT)
                };
                self.hw_write(SSPCON2, con2);
                self.hw_set(PIR1, pir1::SSPIF);
            }
            _ => {}
        }
    }

    fn sspcon2_write(&mut self) {
        if self.mssp_mode() != Some(8) {
            return;
        }
        if self.bit(SSPCON2, sspcon2::SEN) {
            self.hw_clear(SSPCON2, sspcon2::SEN);
            self.hw_clear(SSPSTAT, sspstat::P);
            self.hw_set(SSPSTAT, sspstat::S);
            self.hw_set(PIR1, pir1::SSPIF);
        }
        if self.bit(SSPCON2, sspcon2::RSEN) {
            self.hw_clear(SSPCON2, sspcon2::RSEN);
            self.hw_set(SSPSTAT, sspstat::S);
            self.hw_set(PIR1, pir1::SSPIF);
        }
        if self.bit(SSPCON2, sspcon2::PEN) {
            self.hw_clear(SSPCON2, sspcon2::PEN);
            self.hw_clear(SSPSTAT, sspstat::S);
            self.hw_set(SSPSTAT, sspstat::P);
            self.hw_set(PIR1, pir1::SSPIF);
        }
        if self.bit(SSPCON2, sspcon2::RCEN) {
            self.hw_clear(SSPCON2, sspcon2::RCEN);
            let rx = self.i2c_rx;
            self.hw_write(SSPBUF, rx);
            self.hw_set(SSPSTAT, sspstat::BF);
            self.hw_set(PIR1, pir1::SSPIF);
        }
        if self.bit(SSPCON2, sspcon2::ACKEN) {
            self.hw_clear(SSPCON2, sspcon2::ACKEN);
            let ack = !self.bit(SSPCON2, sspcon2::ACKDT);
            self.i2c_acks.push(ack);
            self.hw_set(PIR1, pir1::SSPIF);
        }
    }
}

static MODEL: Mutex<Model> = Mutex::new(Model::new());
static SESSION: Mutex<()> = Mutex::new(());

fn model() -> MutexGuard<'static, Model> {
    MODEL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn read(addr: u16) -> u8 {
    model().read(addr)
}

pub(crate) fn write(addr: u16, val: u8) {
    model().write(addr, val)
}

/// Exclusive access to the simulated chip. Dropping it releases the chip to the next test.
pub struct Session {
    _guard: MutexGuard<'static, ()>,
}

/// Wait for exclusive access to the simulated chip, then reset it to power-on state and clear
/// every driver callback and cache.
pub fn session() -> Session {
    let guard = SESSION.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    *model() = Model::new();
    crate::reset_state();
    Session { _guard: guard }
}

/// Drive the external level of an input pin
pub fn drive_pin(port: Port, pin: u8, high: bool) {
    let mut m = model();
    let p = port as usize;
    let before = m.port_level(p);
    if high {
        m.pins[p] |= 1 << (pin & 7);
    } else {
        m.pins[p] &= !(1 << (pin & 7));
    }
    if port == Port::B && (before ^ m.port_level(p)) & 0xF0 != 0 {
        m.hw_set(INTCON, intcon::RBIF);
    }
}

/// Set the 10-bit value the converter returns for analog channel `channel`
pub fn set_analog(channel: u8, value: u16) {
    if let Some(slot) = model().analog.get_mut(channel as usize) {
        *slot = value & 0x3FF;
    }
}

/// Connect the EUSART TX line to RX
pub fn set_uart_loopback(on: bool) {
    model().uart_loopback = on;
}

/// Bytes written to the EUSART transmitter so far
pub fn uart_sent() -> Vec<u8> {
    model().uart_sent.clone()
}

/// Byte the SPI slave shifts back on every transfer. `None` ties MISO to MOSI.
pub fn set_spi_miso(byte: Option<u8>) {
    model().spi_miso = byte;
}

/// Bytes shifted out on SPI so far
pub fn spi_sent() -> Vec<u8> {
    model().spi_sent.clone()
}

/// Whether the simulated I2C slave acknowledges written bytes
pub fn set_i2c_ack(ack: bool) {
    model().i2c_ack = ack;
}

/// Byte the simulated I2C slave returns on every master receive
pub fn set_i2c_rx(byte: u8) {
    model().i2c_rx = byte;
}

/// Bytes written by the I2C master so far
pub fn i2c_sent() -> Vec<u8> {
    model().i2c_sent.clone()
}

/// Acknowledge sequences issued by the I2C master so far (`true` = ACK)
pub fn i2c_acks_sent() -> Vec<bool> {
    model().i2c_acks.clone()
}

/// Prevent the simulated hardware from changing the bits of `reg` selected by `mask`.
/// Software writes are unaffected.
pub fn hold(reg: Sfr, mask: u8) {
    model().held[idx(reg)] |= mask;
}

/// Raw register content, without read side effects
pub fn peek(reg: Sfr) -> u8 {
    let m = model();
    let i = idx(reg);
    if (idx(PORTA)..=idx(PORTE)).contains(&i) {
        m.port_level(i - idx(PORTA))
    } else {
        m.regs[i]
    }
}

/// Overwrite a register the way the hardware would, without write side effects
pub fn poke(reg: Sfr, val: u8) {
    model().regs[idx(reg)] = val;
}

/// Set a status or flag bit the way the hardware would, e.g. a timer overflow flag
pub fn raise(reg: Sfr, bit: u8) {
    model().hw_set(reg, bit);
}

/// Number of register writes made by software since the session started
pub fn write_count() -> usize {
    model().writes
}

/// Run the interrupt vectors once, the way the CPU would on a pending interrupt
pub fn service_interrupts() {
    #[cfg(feature = "priority-levels")]
    {
        crate::interrupt::dispatch_high();
        crate::interrupt::dispatch_low();
    }
    #[cfg(not(feature = "priority-levels"))]
    crate::interrupt::dispatch();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_on_state() {
        let _s = session();
        assert_eq!(peek(TRISB), 0xFF);
        assert_eq!(peek(TRISE), 0x07);
        assert_eq!(peek(PR2), 0xFF);
        assert_eq!(write_count(), 0);
    }

    #[test]
    fn port_reads_mix_latch_and_pins() {
        let _s = session();
        TRISC.write(0xF0);
        LATC.write(0xA5);
        drive_pin(Port::C, 7, true);
        assert_eq!(PORTC.read(), 0x85);
    }

    #[test]
    fn held_bits_ignore_hardware() {
        let _s = session();
        hold(PIR1, 1 << pir1::ADIF);
        ADCON0.write(0x03);
        assert!(!PIR1.is_set(pir1::ADIF));
    }
}
