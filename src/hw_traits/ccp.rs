use crate::hw_traits::timer::{read16, write16};
use crate::pac::{self, ccpcon, t3con, Sfr};

/// Control and data registers of one CCP module
pub struct CcpRegs {
    con: Sfr,
    low: Sfr,
    high: Sfr,
}

/// Indexed by CCP instance, CCP1 = 0
pub static CCPS: [CcpRegs; 2] = [
    CcpRegs::new(pac::CCP1CON, pac::CCPR1L, pac::CCPR1H),
    CcpRegs::new(pac::CCP2CON, pac::CCPR2L, pac::CCPR2H),
];

impl CcpRegs {
    const fn new(con: Sfr, low: Sfr, high: Sfr) -> Self {
        CcpRegs { con, low, high }
    }

    #[inline(always)]
    pub fn ccpm_wr(&self, mode: u8) {
        self.con.write_field(ccpcon::CCPM, 4, mode)
    }

    #[inline(always)]
    pub fn ccpm_rd(&self) -> u8 {
        self.con.read_field(ccpcon::CCPM, 4)
    }

    /// Only meaningful in capture and compare modes
    #[inline(always)]
    pub fn ccpr_rd(&self) -> u16 {
        read16(self.low, self.high)
    }

    /// Only meaningful in capture and compare modes
    #[inline(always)]
    pub fn ccpr_wr(&self, val: u16) {
        write16(self.low, self.high, val)
    }

    /// Write a 10-bit PWM duty cycle: bits 9:2 to CCPRxL, bits 1:0 to DCxB
    #[inline(always)]
    pub fn duty_wr(&self, ticks: u16) {
        self.low.write((ticks >> 2) as u8);
        self.con.write_field(ccpcon::DCB, 2, (ticks & 0x03) as u8);
    }

    #[inline(always)]
    pub fn duty_rd(&self) -> u16 {
        (u16::from(self.low.read()) << 2) | u16::from(self.con.read_field(ccpcon::DCB, 2))
    }
}

/// Program T3CON.T3CCP2:T3CCP1
#[inline(always)]
pub fn routing_wr(bits: u8) {
    pac::T3CON.write_bit(t3con::T3CCP2, bits & 0b10 != 0);
    pac::T3CON.write_bit(t3con::T3CCP1, bits & 0b01 != 0);
}

#[inline(always)]
pub fn routing_rd() -> u8 {
    (u8::from(pac::T3CON.is_set(t3con::T3CCP2)) << 1) | u8::from(pac::T3CON.is_set(t3con::T3CCP1))
}
