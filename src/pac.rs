//! Special function registers of the PIC18F4620.
//!
//! Every register is an 8-bit location in the access bank between `0xF80` and `0xFFF`. An [`Sfr`]
//! names one of them and provides volatile read/write and bit helpers on top. On the device the
//! accesses go straight to data memory; on a hosted build they go to the register file in
//! [`crate::sim`].
//!
//! Bit positions for each register live in a submodule named after it (`pac::intcon::GIE`, ...).

use crate::util::BitsExt;

/// Handle to one 8-bit special function register
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sfr(u16);

impl Sfr {
    /// Register at data memory address `addr`
    #[inline(always)]
    pub const fn at(addr: u16) -> Self {
        Sfr(addr)
    }

    /// Data memory address of the register
    #[inline(always)]
    pub const fn addr(self) -> u16 {
        self.0
    }

    /// Volatile read of the whole register
    #[inline(always)]
    pub fn read(self) -> u8 {
        backend::read(self.0)
    }

    /// Volatile write of the whole register
    #[inline(always)]
    pub fn write(self, val: u8) {
        backend::write(self.0, val)
    }

    /// Read, transform, write back
    #[inline(always)]
    pub fn modify<F: FnOnce(u8) -> u8>(self, f: F) {
        self.write(f(self.read()))
    }

    /// Set every bit that is set in `mask`
    #[inline(always)]
    pub fn set_bits(self, mask: u8) {
        self.modify(|r| r.set_mask(mask))
    }

    /// Clear every bit that is set in `mask`
    #[inline(always)]
    pub fn clear_bits(self, mask: u8) {
        self.modify(|r| r.clear_mask(mask))
    }

    /// Invert every bit that is set in `mask`
    #[inline(always)]
    pub fn toggle_bits(self, mask: u8) {
        self.modify(|r| r ^ mask)
    }

    /// Whether bit number `bit` reads as 1
    #[inline(always)]
    pub fn is_set(self, bit: u8) -> bool {
        self.read().check(bit) != 0
    }

    /// Set bit number `bit`
    #[inline(always)]
    pub fn set_bit(self, bit: u8) {
        self.modify(|r| r.set(bit))
    }

    /// Clear bit number `bit`
    #[inline(always)]
    pub fn clear_bit(self, bit: u8) {
        self.modify(|r| r.clear(bit))
    }

    /// Set or clear bit number `bit`
    #[inline(always)]
    pub fn write_bit(self, bit: u8, val: bool) {
        if val {
            self.set_bit(bit)
        } else {
            self.clear_bit(bit)
        }
    }

    /// Replace the `width`-bit field starting at bit `shift` with the low bits of `val`
    #[inline(always)]
    pub fn write_field(self, shift: u8, width: u8, val: u8) {
        let mask = field_mask(width) << shift;
        self.modify(|r| r.clear_mask(mask) | ((val << shift) & mask))
    }

    /// Read the `width`-bit field starting at bit `shift`
    #[inline(always)]
    pub fn read_field(self, shift: u8, width: u8) -> u8 {
        (self.read() >> shift) & field_mask(width)
    }
}

#[inline(always)]
const fn field_mask(width: u8) -> u8 {
    if width >= 8 {
        0xFF
    } else {
        (1u8 << width) - 1
    }
}

#[cfg(target_os = "none")]
mod backend {
    #[inline(always)]
    pub fn read(addr: u16) -> u8 {
        // SAFETY: `addr` is one of the fixed SFR addresses declared below.
        unsafe { core::ptr::read_volatile(addr as usize as *const u8) }
    }

    #[inline(always)]
    pub fn write(addr: u16, val: u8) {
        // SAFETY: `addr` is one of the fixed SFR addresses declared below.
        unsafe { core::ptr::write_volatile(addr as usize as *mut u8, val) }
    }
}

#[cfg(not(target_os = "none"))]
mod backend {
    pub(super) use crate::sim::{read, write};
}

macro_rules! sfrs {
    ($($(#[$doc:meta])* $name:ident = $addr:literal;)*) => {
        $(
            $(#[$doc])*
            pub const $name: Sfr = Sfr::at($addr);
        )*
    };
}

sfrs! {
    /// Port A input levels
    PORTA = 0xF80;
    /// Port B input levels
    PORTB = 0xF81;
    /// Port C input levels
    PORTC = 0xF82;
    /// Port D input levels
    PORTD = 0xF83;
    /// Port E input levels
    PORTE = 0xF84;
    /// Port A output latch
    LATA = 0xF89;
    /// Port B output latch
    LATB = 0xF8A;
    /// Port C output latch
    LATC = 0xF8B;
    /// Port D output latch
    LATD = 0xF8C;
    /// Port E output latch
    LATE = 0xF8D;
    /// Port A direction (1 = input)
    TRISA = 0xF92;
    /// Port B direction (1 = input)
    TRISB = 0xF93;
    /// Port C direction (1 = input)
    TRISC = 0xF94;
    /// Port D direction (1 = input)
    TRISD = 0xF95;
    /// Port E direction (1 = input)
    TRISE = 0xF96;
    /// Oscillator tuning
    OSCTUNE = 0xF9B;
    /// Peripheral interrupt enable 1
    PIE1 = 0xF9D;
    /// Peripheral interrupt flag 1
    PIR1 = 0xF9E;
    /// Peripheral interrupt priority 1
    IPR1 = 0xF9F;
    /// Peripheral interrupt enable 2
    PIE2 = 0xFA0;
    /// Peripheral interrupt flag 2
    PIR2 = 0xFA1;
    /// Peripheral interrupt priority 2
    IPR2 = 0xFA2;
    /// EUSART receive status and control
    RCSTA = 0xFAB;
    /// EUSART transmit status and control
    TXSTA = 0xFAC;
    /// EUSART transmit buffer
    TXREG = 0xFAD;
    /// EUSART receive buffer
    RCREG = 0xFAE;
    /// Baud rate generator low byte
    SPBRG = 0xFAF;
    /// Baud rate generator high byte
    SPBRGH = 0xFB0;
    /// Timer3 control
    T3CON = 0xFB1;
    /// Timer3 low byte
    TMR3L = 0xFB2;
    /// Timer3 high byte
    TMR3H = 0xFB3;
    /// Baud rate control
    BAUDCON = 0xFB8;
    /// CCP2 control
    CCP2CON = 0xFBA;
    /// CCP2 register low byte
    CCPR2L = 0xFBB;
    /// CCP2 register high byte
    CCPR2H = 0xFBC;
    /// CCP1 control
    CCP1CON = 0xFBD;
    /// CCP1 register low byte
    CCPR1L = 0xFBE;
    /// CCP1 register high byte
    CCPR1H = 0xFBF;
    /// A/D control 2
    ADCON2 = 0xFC0;
    /// A/D control 1
    ADCON1 = 0xFC1;
    /// A/D control 0
    ADCON0 = 0xFC2;
    /// A/D result low byte
    ADRESL = 0xFC3;
    /// A/D result high byte
    ADRESH = 0xFC4;
    /// MSSP control 2
    SSPCON2 = 0xFC5;
    /// MSSP control 1
    SSPCON1 = 0xFC6;
    /// MSSP status
    SSPSTAT = 0xFC7;
    /// MSSP address / baud rate
    SSPADD = 0xFC8;
    /// MSSP receive/transmit buffer
    SSPBUF = 0xFC9;
    /// Timer2 control
    T2CON = 0xFCA;
    /// Timer2 period
    PR2 = 0xFCB;
    /// Timer2 counter
    TMR2 = 0xFCC;
    /// Timer1 control
    T1CON = 0xFCD;
    /// Timer1 low byte
    TMR1L = 0xFCE;
    /// Timer1 high byte
    TMR1H = 0xFCF;
    /// Reset control
    RCON = 0xFD0;
    /// Oscillator control
    OSCCON = 0xFD3;
    /// Timer0 control
    T0CON = 0xFD5;
    /// Timer0 low byte
    TMR0L = 0xFD6;
    /// Timer0 high byte
    TMR0H = 0xFD7;
    /// Interrupt control 3
    INTCON3 = 0xFF0;
    /// Interrupt control 2
    INTCON2 = 0xFF1;
    /// Interrupt control
    INTCON = 0xFF2;
}

/// INTCON bits
pub mod intcon {
    /// Global interrupt enable (GIEH in priority mode)
    pub const GIE: u8 = 7;
    /// Peripheral interrupt enable (GIEL in priority mode)
    pub const PEIE: u8 = 6;
    /// Timer0 overflow enable
    pub const TMR0IE: u8 = 5;
    /// INT0 enable
    pub const INT0IE: u8 = 4;
    /// PORTB change enable
    pub const RBIE: u8 = 3;
    /// Timer0 overflow flag
    pub const TMR0IF: u8 = 2;
    /// INT0 flag
    pub const INT0IF: u8 = 1;
    /// PORTB change flag
    pub const RBIF: u8 = 0;
}

/// INTCON2 bits
pub mod intcon2 {
    /// PORTB pull-up disable
    pub const RBPU: u8 = 7;
    /// INT0 on rising edge
    pub const INTEDG0: u8 = 6;
    /// INT1 on rising edge
    pub const INTEDG1: u8 = 5;
    /// INT2 on rising edge
    pub const INTEDG2: u8 = 4;
    /// Timer0 overflow high priority
    pub const TMR0IP: u8 = 2;
    /// PORTB change high priority
    pub const RBIP: u8 = 0;
}

/// INTCON3 bits
pub mod intcon3 {
    /// INT2 high priority
    pub const INT2IP: u8 = 7;
    /// INT1 high priority
    pub const INT1IP: u8 = 6;
    /// INT2 enable
    pub const INT2IE: u8 = 4;
    /// INT1 enable
    pub const INT1IE: u8 = 3;
    /// INT2 flag
    pub const INT2IF: u8 = 1;
    /// INT1 flag
    pub const INT1IF: u8 = 0;
}

/// Bit positions shared by PIR1, PIE1 and IPR1
pub mod pir1 {
    /// A/D conversion complete
    pub const ADIF: u8 = 6;
    /// EUSART receive buffer full
    pub const RCIF: u8 = 5;
    /// EUSART transmit buffer empty
    pub const TXIF: u8 = 4;
    /// MSSP event
    pub const SSPIF: u8 = 3;
    /// CCP1 event
    pub const CCP1IF: u8 = 2;
    /// Timer2 to PR2 match
    pub const TMR2IF: u8 = 1;
    /// Timer1 overflow
    pub const TMR1IF: u8 = 0;
}

/// Bit positions shared by PIR2, PIE2 and IPR2
pub mod pir2 {
    /// MSSP bus collision
    pub const BCLIF: u8 = 3;
    /// Timer3 overflow
    pub const TMR3IF: u8 = 1;
    /// CCP2 event
    pub const CCP2IF: u8 = 0;
}

/// RCON bits
pub mod rcon {
    /// Interrupt priority enable
    pub const IPEN: u8 = 7;
}

/// OSCCON bits
pub mod osccon {
    /// Internal oscillator frequency select (3 bits)
    pub const IRCF: u8 = 4;
    /// Internal oscillator stable
    pub const IOFS: u8 = 2;
    /// System clock select (2 bits)
    pub const SCS: u8 = 0;
}

/// OSCTUNE bits
pub mod osctune {
    /// 4x PLL enable for the internal oscillator
    pub const PLLEN: u8 = 6;
}

/// T0CON bits
pub mod t0con {
    /// Timer0 on
    pub const TMR0ON: u8 = 7;
    /// 8-bit mode
    pub const T08BIT: u8 = 6;
    /// Clock from T0CKI
    pub const T0CS: u8 = 5;
    /// Increment on falling T0CKI edge
    pub const T0SE: u8 = 4;
    /// Prescaler bypassed
    pub const PSA: u8 = 3;
    /// Prescaler select (3 bits)
    pub const T0PS: u8 = 0;
}

/// Bit positions shared by T1CON and T3CON
pub mod t1con {
    /// 16-bit read/write
    pub const RD16: u8 = 7;
    /// Prescaler select (2 bits)
    pub const CKPS: u8 = 4;
    /// Secondary oscillator enable (Timer1 only)
    pub const T1OSCEN: u8 = 3;
    /// Do not synchronise external clock
    pub const NSYNC: u8 = 2;
    /// External clock source
    pub const TMRCS: u8 = 1;
    /// Timer on
    pub const TMRON: u8 = 0;
}

/// T3CON bits beyond those shared with T1CON
pub mod t3con {
    /// CCP timer routing, high bit
    pub const T3CCP2: u8 = 6;
    /// CCP timer routing, low bit
    pub const T3CCP1: u8 = 3;
}

/// T2CON bits
pub mod t2con {
    /// Postscaler select (4 bits)
    pub const TOUTPS: u8 = 3;
    /// Timer2 on
    pub const TMR2ON: u8 = 2;
    /// Prescaler select (2 bits)
    pub const T2CKPS: u8 = 0;
}

/// CCPxCON bits
pub mod ccpcon {
    /// PWM duty cycle low bits (2 bits)
    pub const DCB: u8 = 4;
    /// Mode select (4 bits)
    pub const CCPM: u8 = 0;
}

/// ADCON0 bits
pub mod adcon0 {
    /// Channel select (4 bits)
    pub const CHS: u8 = 2;
    /// Conversion in progress
    pub const GO: u8 = 1;
    /// Converter on
    pub const ADON: u8 = 0;
}

/// ADCON1 bits
pub mod adcon1 {
    /// Negative reference from AN2
    pub const VCFG1: u8 = 5;
    /// Positive reference from AN3
    pub const VCFG0: u8 = 4;
    /// Port configuration (4 bits)
    pub const PCFG: u8 = 0;
}

/// ADCON2 bits
pub mod adcon2 {
    /// Right-justified result
    pub const ADFM: u8 = 7;
    /// Acquisition time (3 bits)
    pub const ACQT: u8 = 3;
    /// Conversion clock (3 bits)
    pub const ADCS: u8 = 0;
}

/// TXSTA bits
pub mod txsta {
    /// Clock source select (synchronous mode)
    pub const CSRC: u8 = 7;
    /// 9-bit transmission
    pub const TX9: u8 = 6;
    /// Transmit enable
    pub const TXEN: u8 = 5;
    /// Synchronous mode
    pub const SYNC: u8 = 4;
    /// High baud rate select
    pub const BRGH: u8 = 2;
    /// Transmit shift register empty
    pub const TRMT: u8 = 1;
}

/// RCSTA bits
pub mod rcsta {
    /// Serial port enable
    pub const SPEN: u8 = 7;
    /// 9-bit reception
    pub const RX9: u8 = 6;
    /// Continuous receive enable
    pub const CREN: u8 = 4;
    /// Framing error
    pub const FERR: u8 = 2;
    /// Overrun error
    pub const OERR: u8 = 1;
}

/// BAUDCON bits
pub mod baudcon {
    /// 16-bit baud rate generator
    pub const BRG16: u8 = 3;
}

/// SSPSTAT bits
pub mod sspstat {
    /// Sample at end (SPI master) / slew rate control disabled (I2C)
    pub const SMP: u8 = 7;
    /// Transmit on active-to-idle edge (SPI) / SMBus levels (I2C)
    pub const CKE: u8 = 6;
    /// Last byte received was data, not address (I2C slave)
    pub const D_A: u8 = 5;
    /// Stop bit detected
    pub const P: u8 = 4;
    /// Start bit detected
    pub const S: u8 = 3;
    /// Read/write information of the last address match (I2C slave)
    pub const R_W: u8 = 2;
    /// 10-bit slave needs its address updated
    pub const UA: u8 = 1;
    /// Buffer full
    pub const BF: u8 = 0;
}

/// SSPCON1 bits
pub mod sspcon1 {
    /// Write collision
    pub const WCOL: u8 = 7;
    /// Receive overflow
    pub const SSPOV: u8 = 6;
    /// Module enable
    pub const SSPEN: u8 = 5;
    /// Clock polarity (SPI) / clock release (I2C slave)
    pub const CKP: u8 = 4;
    /// Mode select (4 bits)
    pub const SSPM: u8 = 0;
}

/// SSPCON2 bits
pub mod sspcon2 {
    /// General call enable
    pub const GCEN: u8 = 7;
    /// Acknowledge status from slave (1 = not acknowledged)
    pub const ACKSTAT: u8 = 6;
    /// Acknowledge data to send (1 = not acknowledge)
    pub const ACKDT: u8 = 5;
    /// Start acknowledge sequence
    pub const ACKEN: u8 = 4;
    /// Receive enable
    pub const RCEN: u8 = 3;
    /// Start stop condition
    pub const PEN: u8 = 2;
    /// Start repeated start condition
    pub const RSEN: u8 = 1;
    /// Start start condition
    pub const SEN: u8 = 0;
}
