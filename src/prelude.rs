//! Prelude

pub use crate::clock::Clock as _pic18f4620_mcal_Clock;
pub use embedded_hal::digital::InputPin as _pic18f4620_mcal_InputPin;
pub use embedded_hal::digital::OutputPin as _pic18f4620_mcal_OutputPin;
pub use embedded_hal::digital::StatefulOutputPin as _pic18f4620_mcal_StatefulOutputPin;
pub use embedded_hal::pwm::SetDutyCycle as _pic18f4620_mcal_SetDutyCycle;
