//! NOS System Calls
//!
//! This crate provides the process-control system calls of the NOS kernel
//! and the mechanism that dispatches trapped calls to them.
//!
//! # Architecture
//!
//! - **Core**: the dispatcher, handler trait and call statistics
//! - **Process**: `fork`, `execv`, `_exit`, `waitpid`, `getpid` and the
//!   kernel-side program launcher
//! - **Common**: copying strings and argument vectors across the user/kernel
//!   boundary
//!
//! # Usage
//!
//! ```rust,ignore
//! use nos_syscalls::{init_syscalls, ProcessSyscalls};
//!
//! let procs = Arc::new(ProcessSyscalls::new(manager, collaborators));
//! let dispatcher = init_syscalls(&procs)?;
//! procs.run_program("/testbin/forktest", &["forktest"])?;
//!
//! // From the trap handler:
//! dispatcher.dispatch(&current_thread, &mut trap_frame);
//! ```

#![no_std]
#![allow(dead_code)]

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

pub mod logging;

// Core modules
pub mod common;
pub mod core;
pub mod process;
pub mod types;

// Re-export commonly used items
pub use crate::core::{SyscallDispatcher, SyscallHandler, SyscallStats, get_dispatcher, get_stats};
pub use process::{Collaborators, ProcessSyscalls, UserEntry, UserImage};
pub use types::*;

/// Initialize the system call subsystem
///
/// Builds the global dispatcher with every process system call registered.
pub fn init_syscalls(procs: &alloc::sync::Arc<ProcessSyscalls>) -> nos_api::Result<&'static SyscallDispatcher> {
    let dispatcher = crate::core::init_dispatcher(procs)?;
    crate::sys_info!("syscalls: {} handlers registered", dispatcher.handler_count());
    Ok(dispatcher)
}

/// Get system call statistics
pub fn get_syscall_stats() -> SyscallStats {
    get_stats()
}
