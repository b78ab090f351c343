//! System call type definitions
//!
//! This module contains system call numbers.

/// System call numbers
pub const SYS_FORK: u32 = 0;
pub const SYS_EXECV: u32 = 2;
pub const SYS_EXIT: u32 = 3;
pub const SYS_WAITPID: u32 = 4;
pub const SYS_GETPID: u32 = 5;
