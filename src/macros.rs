//! Hot-path logging macros
//!
//! Media time-update ticks and SSE blocks arrive many times per second. These
//! macros log them in debug builds and compile to nothing in release builds.

/// Per-tick debug logging - only active in debug builds
#[cfg(debug_assertions)]
#[macro_export]
macro_rules! hot_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

/// Per-tick debug logging - no-op in release builds
#[cfg(not(debug_assertions))]
#[macro_export]
macro_rules! hot_debug {
    ($($arg:tt)*) => {};
}

/// Per-tick trace logging - only active in debug builds
#[cfg(debug_assertions)]
#[macro_export]
macro_rules! hot_trace {
    ($($arg:tt)*) => { log::trace!($($arg)*) };
}

/// Per-tick trace logging - no-op in release builds
#[cfg(not(debug_assertions))]
#[macro_export]
macro_rules! hot_trace {
    ($($arg:tt)*) => {};
}
