//! Process management collaborator interfaces

use alloc::boxed::Box;

use crate::core::types::{ThreadId, VirtAddr};
use crate::error::Result;
use crate::fs::interface::Vnode;
use crate::memory::interface::AddressSpace;

/// Body of a newly spawned kernel thread
pub type ThreadEntry = Box<dyn FnOnce() + Send + 'static>;

/// Executable loader
pub trait ProgramLoader: Send + Sync {
    /// Loads `image` into `space` and returns the program entry point
    fn load(&self, image: &dyn Vnode, space: &dyn AddressSpace) -> Result<VirtAddr>;
}

/// Scheduler services used by the process core
pub trait ThreadSystem: Send + Sync {
    /// Starts a new kernel thread running `entry`
    fn spawn(&self, name: &str, entry: ThreadEntry) -> Result<()>;

    /// Scheduler identifier of the calling thread
    fn current(&self) -> ThreadId;

    /// Blocks the calling thread until it is woken
    ///
    /// A wakeup sent before the thread goes to sleep is kept and makes the
    /// next `sleep` return at once. Returns may be spurious.
    fn sleep(&self);

    /// Wakes `thread` if it sleeps, or lets its next `sleep` return at once
    fn wake(&self, thread: ThreadId);

    /// Terminates the calling thread
    fn exit_current(&self) -> !;
}
