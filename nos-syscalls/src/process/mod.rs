//! Process system calls
//!
//! `fork`, `execv`, `_exit`, `waitpid` and `getpid`, plus the kernel-side
//! launcher for the first user program.
//!
//! [`ProcessSyscalls`] ties the process bookkeeping in `nos-process` to the
//! collaborators the kernel provides: the VM system, the file system, the
//! program loader, the scheduler and the machine-dependent user-mode entry.

mod args;
mod exec;
mod exit;
mod fork;
mod handlers;

use alloc::sync::Arc;

use nos_api::{
    AddressSpaceProvider, Error, KERNEL_PID, Pid, ProcessConfig, ProgramLoader, Result,
    ThreadSystem, TrapFrame, VirtAddr, Vfs,
};
use nos_process::{Process, ProcessManager, Thread};

pub use args::{layout_arguments, ArgumentBlock, STRING_ALIGN};
pub use handlers::{
    ExecvHandler, ExitHandler, ForkHandler, GetpidHandler, WaitpidHandler, register_handlers,
};

/// Initial user-mode state of a freshly loaded program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserImage {
    /// Program entry point
    pub entry: VirtAddr,
    /// Initial stack pointer, just below the argument block
    pub stack_pointer: VirtAddr,
    /// Number of arguments
    pub argc: usize,
    /// User address of the argument pointer array
    pub argv: VirtAddr,
}

/// Machine-dependent transition to user mode
pub trait UserEntry: Send + Sync {
    /// Resumes a forked child from its copy of the parent's trap frame
    fn enter_forked_process(&self, thread: Arc<Thread>, frame: TrapFrame) -> !;

    /// Starts a freshly loaded program
    fn enter_new_process(&self, thread: Arc<Thread>, image: UserImage) -> !;
}

/// Services the process system calls depend on
#[derive(Clone)]
pub struct Collaborators {
    pub spaces: Arc<dyn AddressSpaceProvider>,
    pub vfs: Arc<dyn Vfs>,
    pub loader: Arc<dyn ProgramLoader>,
    pub threads: Arc<dyn ThreadSystem>,
    pub user: Arc<dyn UserEntry>,
}

/// The process system calls
pub struct ProcessSyscalls {
    manager: Arc<ProcessManager>,
    spaces: Arc<dyn AddressSpaceProvider>,
    vfs: Arc<dyn Vfs>,
    loader: Arc<dyn ProgramLoader>,
    threads: Arc<dyn ThreadSystem>,
    user: Arc<dyn UserEntry>,
}

impl ProcessSyscalls {
    pub fn new(manager: Arc<ProcessManager>, collaborators: Collaborators) -> Self {
        let Collaborators {
            spaces,
            vfs,
            loader,
            threads,
            user,
        } = collaborators;
        Self {
            manager,
            spaces,
            vfs,
            loader,
            threads,
            user,
        }
    }

    pub fn manager(&self) -> &Arc<ProcessManager> {
        &self.manager
    }

    pub fn limits(&self) -> &ProcessConfig {
        self.manager.config()
    }

    /// Identifier of the caller's process. Never fails.
    pub fn getpid(&self, caller: &Thread) -> Pid {
        caller.process().map_or(KERNEL_PID, |process| process.pid())
    }

    fn current(&self, caller: &Thread) -> Result<Arc<Process>> {
        caller.process().ok_or(Error::NoSuchProcess)
    }
}
