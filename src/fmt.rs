//! Logging shims for the host-testable core.
//!
//! With the `defmt` feature these forward to `defmt`; without it (host
//! builds and tests) they type-check their arguments and emit nothing,
//! so no global logger has to be linked into test binaries.
//!
//! Brought into scope crate-wide by `#[macro_use] mod fmt;` in `lib.rs`.

#![allow(unused_macros)]

#[cfg(not(feature = "defmt"))]
macro_rules! swallow {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        $( let _ = &$arg; )*
    }};
}

macro_rules! debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::debug!($($arg)*);
        #[cfg(not(feature = "defmt"))]
        swallow!($($arg)*);
    }};
}

macro_rules! info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::info!($($arg)*);
        #[cfg(not(feature = "defmt"))]
        swallow!($($arg)*);
    }};
}

macro_rules! warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::warn!($($arg)*);
        #[cfg(not(feature = "defmt"))]
        swallow!($($arg)*);
    }};
}

macro_rules! error {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::error!($($arg)*);
        #[cfg(not(feature = "defmt"))]
        swallow!($($arg)*);
    }};
}
