//! Peripheral drivers for the PIC18F4620, implementing [`embedded_hal`] traits.
//! Here is the [`datasheet`] for reference.
//!
//! [`embedded_hal`]: https://github.com/rust-embedded/embedded-hal
//! [`datasheet`]: https://ww1.microchip.com/downloads/en/DeviceDoc/39626e.pdf
//!
//! # Usage
//!
//! Every peripheral follows the same pattern: fill in a configuration struct, call its `init`
//! to get a driver handle, use the handle, and hand it back with `deinit`. Calling `init` again
//! with the same configuration always produces the same register state, whatever state the
//! peripheral was in.
//!
//! Interrupt callbacks are plain `fn()` pointers passed in the configuration as an
//! [`Irq`](interrupt::Irq). The driver registers them during `init`; the device's interrupt
//! entry points must call `interrupt::dispatch` (or `dispatch_high` / `dispatch_low` with the
//! `priority-levels` feature), which services every pending source in a fixed order.
//!
//! # Features
//!
//! * `priority-levels`: use the two hardware interrupt vectors instead of one.
//! * One switch per interrupt source (`adc-interrupt`, `timer0-interrupt`, ...), all on by
//!   default through `all-interrupts`. A source that is switched off is never enabled and never
//!   dispatched; its callbacks are ignored.
//! * `critical-section-single-core`: provide a `critical-section` implementation that masks the
//!   global interrupt enables.
//! * `defmt`: log driver activity through `defmt` and derive `defmt::Format` on public types.
//!
//! # Host builds
//!
//! Built for anything other than the bare-metal target, register accesses go to a simulated
//! register file in [`sim`] instead, so the drivers can be tested on the development machine.

#![cfg_attr(target_os = "none", no_std)]
#![deny(missing_docs)]

#[macro_use]
mod log;

pub mod adc;
pub mod ccp;
pub mod clock;
pub mod config;
pub mod error;
pub mod external;
pub mod gpio;
pub mod i2c;
pub mod interrupt;
pub mod pac;
pub mod prelude;
pub mod pwm;
pub mod serial;
#[cfg(not(target_os = "none"))]
pub mod sim;
pub mod spi;
pub mod timer;
pub mod timer0;
pub mod timer2;

mod hw_traits;
mod util;

pub use error::{Error, Result};

// Forget every callback and cached driver value, as after a device reset
#[cfg(not(target_os = "none"))]
pub(crate) fn reset_state() {
    interrupt::reset();
    external::reset();
    timer0::reset();
    timer::reset();
    timer2::reset();
    i2c::reset();
}
