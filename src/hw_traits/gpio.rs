use crate::pac::{self, Sfr};
use crate::util::BitsExt;

/// Direction, latch and input registers of one port
pub struct PortRegs {
    tris: Sfr,
    lat: Sfr,
    port: Sfr,
}

/// Indexed by port number, A = 0
pub static PORTS: [PortRegs; 5] = [
    PortRegs::new(pac::TRISA, pac::LATA, pac::PORTA),
    PortRegs::new(pac::TRISB, pac::LATB, pac::PORTB),
    PortRegs::new(pac::TRISC, pac::LATC, pac::PORTC),
    PortRegs::new(pac::TRISD, pac::LATD, pac::PORTD),
    PortRegs::new(pac::TRISE, pac::LATE, pac::PORTE),
];

macro_rules! reg_methods {
    ($reg:ident, $rd:ident, $wr:ident, $set:ident, $clear:ident) => {
        #[inline(always)]
        pub fn $rd(&self) -> u8 {
            self.$reg.read()
        }

        #[inline(always)]
        pub fn $wr(&self, bits: u8) {
            self.$reg.write(bits)
        }

        #[inline(always)]
        pub fn $set(&self, bits: u8) {
            self.$reg.set_bits(bits)
        }

        #[inline(always)]
        pub fn $clear(&self, bits: u8) {
            self.$reg.clear_bits(bits)
        }
    };
}

impl PortRegs {
    const fn new(tris: Sfr, lat: Sfr, port: Sfr) -> Self {
        PortRegs { tris, lat, port }
    }

    reg_methods!(tris, tris_rd, tris_wr, tris_set, tris_clear);
    reg_methods!(lat, lat_rd, lat_wr, lat_set, lat_clear);

    #[inline(always)]
    pub fn lat_toggle(&self, bits: u8) {
        self.lat.toggle_bits(bits)
    }

    #[inline(always)]
    pub fn port_rd(&self) -> u8 {
        self.port.read()
    }

    /// Make pin `pin` an input (TRIS bit set) or an output
    #[inline(always)]
    pub fn set_input(&self, pin: u8, input: bool) {
        if input {
            self.tris_set(0u8.set(pin))
        } else {
            self.tris_clear(0u8.set(pin))
        }
    }
}
