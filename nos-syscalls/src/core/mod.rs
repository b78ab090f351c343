//! Core system call functionality
//!
//! This module provides the core system call dispatch mechanism.

pub mod dispatcher;
pub mod traits;

// Re-export commonly used items
pub use dispatcher::{SyscallDispatcher, SyscallStats, get_dispatcher, get_stats, init_dispatcher};
pub use traits::SyscallHandler;
