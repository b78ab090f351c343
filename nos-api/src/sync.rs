//! Synchronization primitives for the NOS process core
//!
//! This module provides the lock types shared by the process crates
//! for use in a no_std environment.

pub use spin::{Mutex, MutexGuard, Once};
pub use ::core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
