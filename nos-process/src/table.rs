//! Process table
//!
//! Maps every reserved process identifier to its parent, its exit status and
//! whether it is still running. An identifier is reserved from allocation
//! until the entry is removed, either by the parent reaping it or by the
//! process itself when nobody is left to wait for it.
//!
//! The table is protected by a short internal lock that is never held across
//! a block. Callers that implement the exit rendezvous additionally hold the
//! relevant wait-channel lock around their reads and writes; see
//! [`crate::rendezvous`].

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;

use nos_api::{Error, ExitStatus, KERNEL_PID, Pid, ProcessConfig, Result};
use spin::Mutex;

/// Bookkeeping kept for one reserved identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableEntry {
    /// Parent identifier, `KERNEL_PID` when nobody will wait for the process
    pub parent: Pid,
    /// Exit status, written once when the process exits
    pub exit_status: Option<ExitStatus>,
    /// True until the process has exited
    pub running: bool,
}

impl TableEntry {
    const fn new() -> Self {
        Self {
            parent: KERNEL_PID,
            exit_status: None,
            running: false,
        }
    }
}

struct TableInner {
    entries: BTreeMap<Pid, TableEntry>,
    /// Released identifiers below `next`
    free: BTreeSet<Pid>,
    /// Lowest identifier never handed out since the table last shrank.
    /// Wide enough to sit one past `Pid::MAX`.
    next: i64,
}

/// Process identifier table
pub struct ProcessTable {
    min: Pid,
    max: Pid,
    inner: Mutex<TableInner>,
}

impl ProcessTable {
    /// Creates an empty table handing out identifiers in `[min, max]`
    pub fn new(min: Pid, max: Pid) -> Result<Self> {
        if min <= KERNEL_PID {
            return Err(Error::InvalidArgument("identifier range must exclude the kernel pid"));
        }
        Ok(Self {
            min,
            max,
            inner: Mutex::new(TableInner {
                entries: BTreeMap::new(),
                free: BTreeSet::new(),
                next: i64::from(min),
            }),
        })
    }

    pub fn with_config(config: &ProcessConfig) -> Result<Self> {
        Self::new(config.pid_min, config.pid_max)
    }

    /// Reserves the lowest free identifier
    pub fn allocate(&self) -> Result<Pid> {
        let mut inner = self.inner.lock();
        let pid = match inner.free.pop_first() {
            Some(pid) => pid,
            None if inner.next <= i64::from(self.max) => {
                let pid = inner.next as Pid;
                inner.next += 1;
                pid
            }
            None => {
                crate::proc_warn!("process table: identifiers exhausted ({}..={})", self.min, self.max);
                return Err(Error::OutOfIdentifiers);
            }
        };
        inner.entries.insert(pid, TableEntry::new());
        crate::proc_trace!("process table: allocated pid {}", pid);
        Ok(pid)
    }

    /// True if `pid` is reserved. Identifiers outside the range never are.
    pub fn exists(&self, pid: Pid) -> bool {
        if pid < self.min || pid > self.max {
            return false;
        }
        self.inner.lock().entries.contains_key(&pid)
    }

    /// Records the parent of `pid` and marks it running
    pub fn register_parent(&self, pid: Pid, parent: Pid) -> Result<()> {
        self.update(pid, |entry| {
            entry.parent = parent;
            entry.running = true;
            Ok(())
        })
    }

    /// Records the exit status of `pid`. The status can only be set once.
    pub fn set_exit(&self, pid: Pid, status: ExitStatus) -> Result<()> {
        self.update(pid, |entry| {
            if entry.exit_status.is_some() {
                return Err(Error::InvalidArgument("exit status already recorded"));
            }
            entry.exit_status = Some(status);
            Ok(())
        })
    }

    /// Reads the exit status of an exited process
    pub fn get_exit(&self, pid: Pid) -> Result<ExitStatus> {
        let inner = self.inner.lock();
        let entry = inner.entries.get(&pid).ok_or(Error::NoSuchProcess)?;
        entry
            .exit_status
            .ok_or(Error::InvalidArgument("process has not exited"))
    }

    pub fn mark_not_running(&self, pid: Pid) -> Result<()> {
        self.update(pid, |entry| {
            entry.running = false;
            Ok(())
        })
    }

    /// False for exited and for unknown identifiers
    pub fn is_running(&self, pid: Pid) -> bool {
        self.inner
            .lock()
            .entries
            .get(&pid)
            .is_some_and(|entry| entry.running)
    }

    /// Releases `pid` so it can be handed out again
    pub fn remove(&self, pid: Pid) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.entries.remove(&pid).ok_or(Error::NoSuchProcess)?;

        if i64::from(pid) + 1 == inner.next {
            // Shrink the high-water mark instead of growing the free set.
            inner.next = i64::from(pid);
            while inner.next > i64::from(self.min) {
                let below = (inner.next - 1) as Pid;
                if !inner.free.remove(&below) {
                    break;
                }
                inner.next = i64::from(below);
            }
        } else {
            inner.free.insert(pid);
        }
        crate::proc_trace!("process table: released pid {}", pid);
        Ok(())
    }

    pub fn is_child_of(&self, pid: Pid, parent: Pid) -> bool {
        self.parent_of(pid) == Some(parent)
    }

    pub fn parent_of(&self, pid: Pid) -> Option<Pid> {
        self.inner.lock().entries.get(&pid).map(|entry| entry.parent)
    }

    /// Detaches every child of `parent`
    ///
    /// Running children are handed to the kernel so that they clean up after
    /// themselves when they exit. Children that already exited are returned;
    /// the caller reaps them.
    pub fn orphan_children(&self, parent: Pid) -> Vec<Pid> {
        let mut inner = self.inner.lock();
        let mut exited = Vec::new();
        for (pid, entry) in inner.entries.iter_mut() {
            if entry.parent != parent || *pid == parent {
                continue;
            }
            if entry.running {
                entry.parent = KERNEL_PID;
            } else {
                exited.push(*pid);
            }
        }
        exited
    }

    /// Number of reserved identifiers
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every entry, in identifier order
    pub fn snapshot(&self) -> Vec<(Pid, TableEntry)> {
        self.inner
            .lock()
            .entries
            .iter()
            .map(|(pid, entry)| (*pid, *entry))
            .collect()
    }

    fn update<F>(&self, pid: Pid, f: F) -> Result<()>
    where
        F: FnOnce(&mut TableEntry) -> Result<()>,
    {
        let mut inner = self.inner.lock();
        let entry = inner.entries.get_mut(&pid).ok_or(Error::NoSuchProcess)?;
        f(entry)
    }
}
