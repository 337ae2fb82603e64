use crate::pac::{self, baudcon, pir1, rcsta, txsta};

/// Baud rate generator mode bits
pub struct BrgMode {
    pub sync: bool,
    pub brgh: bool,
    pub brg16: bool,
}

/// Only call while the serial port is disabled
pub fn brg_settings(mode: BrgMode, spbrg: u16) {
    pac::TXSTA.write_bit(txsta::SYNC, mode.sync);
    pac::TXSTA.write_bit(txsta::BRGH, mode.brgh);
    pac::BAUDCON.write_bit(baudcon::BRG16, mode.brg16);
    pac::SPBRGH.write((spbrg >> 8) as u8);
    pac::SPBRG.write(spbrg as u8);
}

#[inline(always)]
pub fn spen_wr(on: bool) {
    pac::RCSTA.write_bit(rcsta::SPEN, on)
}

#[inline(always)]
pub fn txen_wr(on: bool) {
    pac::TXSTA.write_bit(txsta::TXEN, on)
}

#[inline(always)]
pub fn txen_rd() -> bool {
    pac::TXSTA.is_set(txsta::TXEN)
}

#[inline(always)]
pub fn cren_wr(on: bool) {
    pac::RCSTA.write_bit(rcsta::CREN, on)
}

#[inline(always)]
pub fn tx9_wr(on: bool) {
    pac::TXSTA.write_bit(txsta::TX9, on)
}

#[inline(always)]
pub fn rx9_wr(on: bool) {
    pac::RCSTA.write_bit(rcsta::RX9, on)
}

/// Transmit shift register empty
#[inline(always)]
pub fn trmt_rd() -> bool {
    pac::TXSTA.is_set(txsta::TRMT)
}

/// Received byte waiting in RCREG
#[inline(always)]
pub fn rcif_rd() -> bool {
    pac::PIR1.is_set(pir1::RCIF)
}

/// TXREG empty
#[inline(always)]
pub fn txif_rd() -> bool {
    pac::PIR1.is_set(pir1::TXIF)
}

/// RCSTA, for the FERR and OERR bits
#[inline(always)]
pub fn status_rd() -> u8 {
    pac::RCSTA.read()
}

/// Reading also clears RCIF and FERR
#[inline(always)]
pub fn rx_rd() -> u8 {
    pac::RCREG.read()
}

#[inline(always)]
pub fn tx_wr(byte: u8) {
    pac::TXREG.write(byte)
}
