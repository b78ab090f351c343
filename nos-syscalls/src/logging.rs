//! Unified logging support for nos-syscalls
//!
//! This module provides a unified logging interface that compiles away when
//! the `log` feature is disabled, without requiring repetitive #[cfg]
//! attributes throughout the codebase.

/// Unified trace-level logging
#[macro_export]
macro_rules! sys_trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::trace!($($arg)*);
    }
}

/// Unified debug-level logging
#[macro_export]
macro_rules! sys_debug {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::debug!($($arg)*);
    }
}

/// Unified info-level logging
#[macro_export]
macro_rules! sys_info {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::info!($($arg)*);
    }
}

/// Unified warn-level logging
#[macro_export]
macro_rules! sys_warn {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::warn!($($arg)*);
    }
}

/// Unified error-level logging
#[macro_export]
macro_rules! sys_error {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::error!($($arg)*);
    }
}
