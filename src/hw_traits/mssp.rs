use crate::pac::{self, pir1, sspcon1, sspcon2, sspstat};

/// `SSPM` codes
pub mod sspm {
    pub const SPI_MASTER_DIV4: u8 = 0x0;
    pub const SPI_MASTER_DIV16: u8 = 0x1;
    pub const SPI_MASTER_DIV64: u8 = 0x2;
    pub const SPI_MASTER_TMR2: u8 = 0x3;
    pub const SPI_SLAVE_SS: u8 = 0x4;
    pub const SPI_SLAVE: u8 = 0x5;
    pub const I2C_SLAVE7: u8 = 0x6;
    pub const I2C_SLAVE10: u8 = 0x7;
    pub const I2C_MASTER: u8 = 0x8;
    pub const I2C_SLAVE7_SP: u8 = 0xE;
    pub const I2C_SLAVE10_SP: u8 = 0xF;
}

/// Sequence-start bits of SSPCON2. Each clears itself once its sequence is done.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Sequence {
    Start = sspcon2::SEN as isize,
    RepeatedStart = sspcon2::RSEN as isize,
    Stop = sspcon2::PEN as isize,
    Receive = sspcon2::RCEN as isize,
    Acknowledge = sspcon2::ACKEN as isize,
}

#[inline(always)]
pub fn enable_wr(on: bool) {
    pac::SSPCON1.write_bit(sspcon1::SSPEN, on)
}

#[inline(always)]
pub fn sspm_wr(mode: u8) {
    pac::SSPCON1.write_field(sspcon1::SSPM, 4, mode)
}

#[inline(always)]
pub fn ckp_wr(on: bool) {
    pac::SSPCON1.write_bit(sspcon1::CKP, on)
}

#[inline(always)]
pub fn cke_wr(on: bool) {
    pac::SSPSTAT.write_bit(sspstat::CKE, on)
}

#[inline(always)]
pub fn smp_wr(on: bool) {
    pac::SSPSTAT.write_bit(sspstat::SMP, on)
}

#[inline(always)]
pub fn wcol_rd() -> bool {
    pac::SSPCON1.is_set(sspcon1::WCOL)
}

#[inline(always)]
pub fn sspov_rd() -> bool {
    pac::SSPCON1.is_set(sspcon1::SSPOV)
}

#[inline(always)]
pub fn sspov_clear() {
    pac::SSPCON1.clear_bit(sspcon1::SSPOV)
}

/// Clear WCOL and SSPOV
#[inline(always)]
pub fn errors_clear() {
    pac::SSPCON1.clear_bits((1 << sspcon1::WCOL) | (1 << sspcon1::SSPOV))
}

#[inline(always)]
pub fn bf_rd() -> bool {
    pac::SSPSTAT.is_set(sspstat::BF)
}

#[inline(always)]
pub fn stat_rd(bit: u8) -> bool {
    pac::SSPSTAT.is_set(bit)
}

/// Reading clears BF
#[inline(always)]
pub fn buf_rd() -> u8 {
    pac::SSPBUF.read()
}

#[inline(always)]
pub fn buf_wr(byte: u8) {
    pac::SSPBUF.write(byte)
}

#[inline(always)]
pub fn addr_wr(val: u8) {
    pac::SSPADD.write(val)
}

#[inline(always)]
pub fn addr_rd() -> u8 {
    pac::SSPADD.read()
}

#[inline(always)]
pub fn sspif_rd() -> bool {
    pac::PIR1.is_set(pir1::SSPIF)
}

#[inline(always)]
pub fn sspif_clear() {
    pac::PIR1.clear_bit(pir1::SSPIF)
}

#[inline(always)]
pub fn gcen_wr(on: bool) {
    pac::SSPCON2.write_bit(sspcon2::GCEN, on)
}

/// Clear every SSPCON2 bit except GCEN
#[inline(always)]
pub fn con2_reset() {
    pac::SSPCON2.clear_bits(!(1 << sspcon2::GCEN))
}

#[inline(always)]
pub fn ackstat_rd() -> bool {
    pac::SSPCON2.is_set(sspcon2::ACKSTAT)
}

#[inline(always)]
pub fn ackdt_wr(nack: bool) {
    pac::SSPCON2.write_bit(sspcon2::ACKDT, nack)
}

#[inline(always)]
pub fn sequence_start(seq: Sequence) {
    pac::SSPCON2.set_bit(seq as u8)
}

#[inline(always)]
pub fn sequence_busy(seq: Sequence) -> bool {
    pac::SSPCON2.is_set(seq as u8)
}
