//! Logging support for nos-process
//!
//! Thin wrappers over the `log` crate that compile to nothing when the
//! `log` feature is disabled.

/// Trace-level logging
#[macro_export]
macro_rules! proc_trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::trace!($($arg)*);
    }
}

/// Debug-level logging
#[macro_export]
macro_rules! proc_debug {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::debug!($($arg)*);
    }
}

/// Warn-level logging
#[macro_export]
macro_rules! proc_warn {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::warn!($($arg)*);
    }
}
