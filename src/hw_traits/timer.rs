use crate::interrupt::Source;
use crate::pac::{self, t1con, t3con, Sfr};

/// Read a 16-bit counter. The low byte is read first so that a latched high byte (TMR0H, or
/// TMRxH with RD16) belongs to the same sample.
#[inline(always)]
pub fn read16(low: Sfr, high: Sfr) -> u16 {
    let l = low.read();
    let h = high.read();
    (u16::from(h) << 8) | u16::from(l)
}

/// Write a 16-bit counter. The high byte goes first so that a buffered high byte is committed
/// together with the low byte.
#[inline(always)]
pub fn write16(low: Sfr, high: Sfr, val: u16) {
    high.write((val >> 8) as u8);
    low.write(val as u8);
}

/// T1CON/T3CON layout settings
pub struct TxCon {
    pub rd16: bool,
    pub ckps: u8,
    pub oscen: bool,
    pub nsync: bool,
    pub external: bool,
}

/// Timer1 and Timer3 share a register layout
pub trait Timer16 {
    const CON: Sfr;
    const TMRL: Sfr;
    const TMRH: Sfr;
    const SOURCE: Source;
    /// Bits of the control register that belong to someone else and must survive
    const KEEP: u8;
    /// Index into per-timer driver state
    const INDEX: usize;

    #[inline(always)]
    fn on() {
        Self::CON.set_bit(t1con::TMRON);
    }

    #[inline(always)]
    fn off() {
        Self::CON.clear_bit(t1con::TMRON);
    }

    #[inline(always)]
    fn is_on() -> bool {
        Self::CON.is_set(t1con::TMRON)
    }

    /// Only call while the timer is off
    fn con_settings(reg: TxCon) {
        let mut bits = u8::from(reg.rd16) << t1con::RD16;
        bits |= (reg.ckps & 0x03) << t1con::CKPS;
        bits |= u8::from(reg.oscen) << t1con::T1OSCEN;
        bits |= u8::from(reg.nsync) << t1con::NSYNC;
        bits |= u8::from(reg.external) << t1con::TMRCS;
        Self::CON.modify(|r| (r & Self::KEEP) | (bits & !Self::KEEP));
    }

    #[inline(always)]
    fn counter_rd() -> u16 {
        read16(Self::TMRL, Self::TMRH)
    }

    #[inline(always)]
    fn counter_wr(val: u16) {
        write16(Self::TMRL, Self::TMRH, val)
    }
}

/// Timer1
#[derive(Debug)]
pub struct Tmr1;
/// Timer3
#[derive(Debug)]
pub struct Tmr3;

impl Timer16 for Tmr1 {
    const CON: Sfr = pac::T1CON;
    const TMRL: Sfr = pac::TMR1L;
    const TMRH: Sfr = pac::TMR1H;
    const SOURCE: Source = Source::Timer1;
    const KEEP: u8 = 0;
    const INDEX: usize = 0;
}

impl Timer16 for Tmr3 {
    const CON: Sfr = pac::T3CON;
    const TMRL: Sfr = pac::TMR3L;
    const TMRH: Sfr = pac::TMR3H;
    const SOURCE: Source = Source::Timer3;
    const KEEP: u8 = (1 << t3con::T3CCP2) | (1 << t3con::T3CCP1);
    const INDEX: usize = 1;
}
