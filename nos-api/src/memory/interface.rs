//! Address-space interface
//!
//! Implemented by the virtual memory system. The process core only creates,
//! copies, switches to and drops address spaces; it never looks inside one.
//! Dropping the last handle destroys the space.

use alloc::sync::Arc;

use crate::core::types::{Size, VirtAddr};
use crate::error::Result;

/// A user address space
pub trait AddressSpace: Send + Sync {
    /// Creates an independent copy of this space
    fn duplicate(&self) -> Result<Arc<dyn AddressSpace>>;

    /// Makes this space current on the running CPU
    fn activate(&self);

    /// Stops using this space on the running CPU
    fn deactivate(&self);

    /// Sets up the user stack and returns the initial stack pointer
    fn define_stack(&self) -> Result<VirtAddr>;

    /// Copies kernel bytes out to user memory at `dst`
    fn copy_out(&self, dst: VirtAddr, src: &[u8]) -> Result<()>;

    /// Copies user memory at `src` into a kernel buffer
    fn copy_in(&self, dst: &mut [u8], src: VirtAddr) -> Result<()>;
}

/// Factory for fresh, empty address spaces
pub trait AddressSpaceProvider: Send + Sync {
    fn create(&self) -> Result<Arc<dyn AddressSpace>>;
}

/// Reads one pointer-sized word from user memory
pub fn read_user_word(space: &dyn AddressSpace, addr: VirtAddr) -> Result<usize> {
    let mut bytes = [0u8; ::core::mem::size_of::<usize>()];
    space.copy_in(&mut bytes, addr)?;
    Ok(usize::from_ne_bytes(bytes))
}

/// Rounds `addr` down to a multiple of `align`, which must be a power of two
pub const fn align_down(addr: VirtAddr, align: Size) -> VirtAddr {
    addr & !(align - 1)
}
