//! NOS API - Core interfaces and types for the NOS process-control core
//!
//! This crate provides the identifier types, error taxonomy and collaborator
//! interfaces shared by the process table (`nos-process`) and the process
//! system calls (`nos-syscalls`).
//!
//! # Architecture
//!
//! - **Core**: identifiers, limits, wait-status encoding and errno vocabulary
//! - **Error**: the common error type and its errno mapping
//! - **Syscall**: trap frame and system call argument/result types
//! - **Memory**: address-space interface implemented by the VM system
//! - **Fs**: vnode and VFS interfaces implemented by the file system
//! - **Process**: program loader and thread-system interfaces
//!
//! # Design Principles
//!
//! - **Dependency Inversion**: the process core depends on these traits, never
//!   on a concrete VM, file system or scheduler
//! - **Interface Segregation**: each collaborator exposes only what the
//!   process core calls
//!
//! # Usage
//!
//! ```rust
//! use nos_api::{Error, ExitStatus, Result};
//!
//! fn reap(status: ExitStatus) -> Result<i32> {
//!     status.exit_code().ok_or(Error::InvalidArgument("process was signalled"))
//! }
//!
//! assert_eq!(reap(ExitStatus::exited(3)), Ok(3));
//! ```

#![no_std]
#![allow(dead_code)]

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

pub mod core;
pub mod error;
pub mod fs;
pub mod memory;
pub mod process;
pub mod sync;
pub mod syscall;

// Re-export commonly used types
pub use crate::core::types::*;
pub use crate::error::{Error, Result};
pub use crate::fs::interface::{OpenFlags, Vfs, Vnode};
pub use crate::memory::interface::{AddressSpace, AddressSpaceProvider};
pub use crate::process::interface::{ProgramLoader, ThreadEntry, ThreadSystem};
pub use crate::syscall::types::{SyscallArgs, SyscallResult, TrapFrame};
