//! Process and thread records

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use nos_api::{AddressSpace, Pid, ThreadId, Vnode};
use spin::Mutex;

/// In-kernel state of one running program
///
/// The parent link and exit status live in the process table, keyed by
/// [`Process::pid`]; the record holds what the process owns.
pub struct Process {
    name: String,
    pid: Pid,
    inner: Mutex<ProcessInner>,
}

struct ProcessInner {
    threads: Vec<ThreadId>,
    space: Option<Arc<dyn AddressSpace>>,
    cwd: Option<Arc<dyn Vnode>>,
    destroyed: bool,
}

impl Process {
    pub(crate) fn new(name: &str, pid: Pid) -> Self {
        Self {
            name: String::from(name),
            pid,
            inner: Mutex::new(ProcessInner {
                threads: Vec::new(),
                space: None,
                cwd: None,
                destroyed: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Current address space, if any
    pub fn address_space(&self) -> Option<Arc<dyn AddressSpace>> {
        self.inner.lock().space.clone()
    }

    /// Installs `space` and returns the previous one. The caller decides
    /// when the old space is dropped.
    pub fn replace_address_space(
        &self,
        space: Option<Arc<dyn AddressSpace>>,
    ) -> Option<Arc<dyn AddressSpace>> {
        core::mem::replace(&mut self.inner.lock().space, space)
    }

    pub fn cwd(&self) -> Option<Arc<dyn Vnode>> {
        self.inner.lock().cwd.clone()
    }

    pub fn set_cwd(&self, cwd: Option<Arc<dyn Vnode>>) -> Option<Arc<dyn Vnode>> {
        core::mem::replace(&mut self.inner.lock().cwd, cwd)
    }

    /// Identifiers of the attached threads
    pub fn threads(&self) -> Vec<ThreadId> {
        self.inner.lock().threads.clone()
    }

    pub fn thread_count(&self) -> usize {
        self.inner.lock().threads.len()
    }

    pub(crate) fn add_thread(&self, tid: ThreadId) {
        self.inner.lock().threads.push(tid);
    }

    pub(crate) fn remove_thread(&self, tid: ThreadId) -> bool {
        let mut inner = self.inner.lock();
        match inner.threads.iter().position(|t| *t == tid) {
            Some(index) => {
                inner.threads.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Drops the cwd and address space. Panics on a second call or while
    /// threads are still attached.
    pub(crate) fn teardown(&self) {
        let (space, cwd) = {
            let mut inner = self.inner.lock();
            assert!(!inner.destroyed, "process {} destroyed twice", self.pid);
            assert!(
                inner.threads.is_empty(),
                "process {} destroyed with {} attached threads",
                self.pid,
                inner.threads.len()
            );
            inner.destroyed = true;
            (inner.space.take(), inner.cwd.take())
        };
        // Released outside the record lock.
        drop(space);
        drop(cwd);
    }
}

/// Kernel thread record
pub struct Thread {
    id: ThreadId,
    name: String,
    pub(crate) process: Mutex<Option<Arc<Process>>>,
}

impl Thread {
    pub(crate) fn new(id: ThreadId, name: &str) -> Self {
        Self {
            id,
            name: String::from(name),
            process: Mutex::new(None),
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process this thread is attached to
    pub fn process(&self) -> Option<Arc<Process>> {
        self.process.lock().clone()
    }

    pub(crate) fn set_process(&self, process: Option<Arc<Process>>) -> Option<Arc<Process>> {
        core::mem::replace(&mut *self.process.lock(), process)
    }
}
