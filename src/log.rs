//! Crate-internal logging macros.
//!
//! With the `defmt` feature enabled these forward to the matching `defmt` macro. Otherwise the
//! arguments are borrowed and dropped so that values used only for logging do not trigger unused
//! warnings, and nothing is emitted.

#[cfg(feature = "defmt")]
macro_rules! __log {
    ($level:ident, $s:literal $(, $x:expr)* $(,)?) => {
        ::defmt::$level!($s $(, $x)*)
    };
}

#[cfg(not(feature = "defmt"))]
macro_rules! __log {
    ($level:ident, $s:literal $(, $x:expr)* $(,)?) => {{
        let _ = ($( & $x, )*);
    }};
}

#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => { __log!(trace, $($arg)*) };
}

macro_rules! debug {
    ($($arg:tt)*) => { __log!(debug, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! info {
    ($($arg:tt)*) => { __log!(info, $($arg)*) };
}

macro_rules! warn {
    ($($arg:tt)*) => { __log!(warn, $($arg)*) };
}

macro_rules! error {
    ($($arg:tt)*) => { __log!(error, $($arg)*) };
}
