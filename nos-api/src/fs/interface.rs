//! File system interface
//!
//! The process core opens program binaries and shares working directories.
//! A vnode is released by dropping its handle.

use alloc::sync::Arc;

use bitflags::bitflags;

use crate::error::Result;

bitflags! {
    /// Flags for [`Vfs::open`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u32 {
        const READ = 0x1;
        const WRITE = 0x2;
        const CREATE = 0x4;
        const EXCLUSIVE = 0x8;
        const TRUNCATE = 0x10;
        const APPEND = 0x20;
    }
}

/// An open file or directory
pub trait Vnode: Send + Sync {
    /// Reads up to `buf.len()` bytes at `offset`, returning the count read
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// File size in bytes
    fn size(&self) -> Result<u64>;
}

/// Path resolution
pub trait Vfs: Send + Sync {
    fn open(&self, path: &str, flags: OpenFlags) -> Result<Arc<dyn Vnode>>;
}
