//! System call traits
//!
//! This module provides common traits for system calls.

use alloc::sync::Arc;

use nos_api::{Result, TrapFrame};
use nos_process::Thread;

/// System call handler trait
pub trait SyscallHandler: Send + Sync {
    /// Execute the system call on behalf of `caller`
    fn execute(&self, caller: &Arc<Thread>, frame: &TrapFrame) -> Result<isize>;

    /// Get the system call name
    fn name(&self) -> &str;

    /// Get the system call ID
    fn id(&self) -> u32;
}
