//! System call dispatcher
//!
//! This module provides the core system call dispatch mechanism.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;

use nos_api::{Error, TrapFrame};
use nos_process::Thread;
use spin::{Mutex, Once};

use super::traits::SyscallHandler;
use crate::process::ProcessSyscalls;

/// System call dispatcher
pub struct SyscallDispatcher {
    /// Registered system call handlers
    handlers: BTreeMap<u32, Box<dyn SyscallHandler>>,
    /// System call statistics
    stats: Mutex<SyscallStats>,
}

impl SyscallDispatcher {
    /// Create a new system call dispatcher
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
            stats: Mutex::new(SyscallStats::default()),
        }
    }

    /// Register a system call handler
    pub fn register_handler(&mut self, id: u32, handler: Box<dyn SyscallHandler>) {
        self.handlers.insert(id, handler);
    }

    /// Number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Get a system call handler
    pub fn get_handler(&self, id: u32) -> Option<&dyn SyscallHandler> {
        self.handlers.get(&id).map(|handler| handler.as_ref())
    }

    /// Dispatch the system call described by `frame`
    ///
    /// The result is written back into the frame: the return value with the
    /// error flag cleared, or the errno with the flag set. The program
    /// counter is advanced past the trap. Calls that do not return (`_exit`,
    /// a successful `execv`) never get here.
    pub fn dispatch(&self, caller: &Arc<Thread>, frame: &mut TrapFrame) -> nos_api::Result<isize> {
        let id = frame.number as u32;

        let result = match self.handlers.get(&id) {
            Some(handler) => {
                crate::sys_trace!("syscall {} ({}) from thread {}", handler.name(), id, caller.id());
                handler.execute(caller, frame)
            }
            None => {
                crate::sys_warn!("unknown syscall {} from thread {}", id, caller.id());
                Err(Error::NotImplemented)
            }
        };

        // Update statistics
        {
            let mut stats = self.stats.lock();
            stats.total_calls += 1;
            *stats.calls_by_type.entry(id).or_insert(0) += 1;
            if result.is_err() {
                stats.error_count += 1;
            }
        }

        match result {
            Ok(value) => frame.set_return(value),
            Err(err) => frame.set_error(err.errno()),
        }
        frame.advance_pc();

        result
    }

    /// Get system call statistics
    pub fn get_stats(&self) -> SyscallStats {
        self.stats.lock().clone()
    }
}

impl Default for SyscallDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// System call statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyscallStats {
    /// Total number of system calls
    pub total_calls: u64,
    /// Number of calls by type
    pub calls_by_type: BTreeMap<u32, u64>,
    /// Number of errors
    pub error_count: u64,
}

/// Global system call dispatcher
static DISPATCHER: Once<SyscallDispatcher> = Once::new();

/// Initialize the global system call dispatcher
///
/// The first call registers every handler against `procs`; later calls
/// return the dispatcher built by the first.
pub fn init_dispatcher(procs: &Arc<ProcessSyscalls>) -> nos_api::Result<&'static SyscallDispatcher> {
    let mut failure = None;
    let dispatcher = DISPATCHER.call_once(|| {
        let mut dispatcher = SyscallDispatcher::new();
        if let Err(err) = register_handlers(&mut dispatcher, procs) {
            failure = Some(err);
        }
        dispatcher
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(dispatcher),
    }
}

/// Get the global system call dispatcher
pub fn get_dispatcher() -> Option<&'static SyscallDispatcher> {
    DISPATCHER.get()
}

/// Register all system call handlers
pub fn register_handlers(
    dispatcher: &mut SyscallDispatcher,
    procs: &Arc<ProcessSyscalls>,
) -> nos_api::Result<()> {
    crate::process::register_handlers(dispatcher, procs)
}

/// Get system call statistics of the global dispatcher
pub fn get_stats() -> SyscallStats {
    get_dispatcher()
        .map(SyscallDispatcher::get_stats)
        .unwrap_or_default()
}
