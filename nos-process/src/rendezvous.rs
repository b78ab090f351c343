//! Exit rendezvous
//!
//! Hands an exit status from a child to its parent exactly once.
//!
//! Lock discipline: a waiting parent holds its own channel; an exiting child
//! holds its parent's channel while it flips its liveness flag, stores its
//! status and signals. A process never holds two channel locks at once.

use alloc::sync::Arc;

use nos_api::{Error, ExitStatus, KERNEL_PID, Pid, Result, WaitOptions};

use crate::lifecycle::ProcessManager;
use crate::waitchan::WaitChannel;

/// What happened to an exiting process's status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDisposition {
    /// Stored for the parent, which was woken
    Notified(Pid),
    /// Nobody can wait for it; the entry and channel were removed
    Orphaned,
}

impl ProcessManager {
    /// Releases the children of an exiting process
    ///
    /// Under the parent's own channel lock, children that already exited are
    /// reaped and running children are handed to the kernel. A child that
    /// races with this re-checks its parent under the same lock, so it either
    /// published its status before we looked (and is reaped here) or sees the
    /// kernel as its parent afterwards.
    pub fn release_children(&self, parent: Pid) -> usize {
        let Some(channel) = self.channels.get(parent) else {
            return 0;
        };
        let _guard = channel.lock();
        let exited = self.table.orphan_children(parent);
        for child in exited.iter() {
            let _ = self.table.remove(*child);
            let _ = self.channels.destroy(*child);
            crate::proc_trace!("process {}: reaped exited child {} on exit", parent, child);
        }
        exited.len()
    }

    /// Publishes the exit status of `pid` to its parent
    ///
    /// If the parent is gone, or is the kernel, the process removes its own
    /// table entry and wait channel instead.
    pub fn report_exit(&self, pid: Pid, status: ExitStatus) -> Result<ExitDisposition> {
        loop {
            let parent = self.table.parent_of(pid).ok_or(Error::NoSuchProcess)?;
            let channel = if parent == KERNEL_PID {
                None
            } else {
                self.channels.get(parent)
            };

            let Some(channel) = channel else {
                self.table.remove(pid)?;
                let _ = self.channels.destroy(pid);
                crate::proc_debug!("process {}: {}, no parent left to notify", pid, status);
                return Ok(ExitDisposition::Orphaned);
            };

            let guard = channel.lock();
            if self.table.parent_of(pid) != Some(parent) {
                // Orphaned while we were taking the lock.
                continue;
            }
            self.table.mark_not_running(pid)?;
            self.table.set_exit(pid, status)?;
            guard.broadcast();
            crate::proc_debug!("process {}: {}, notified parent {}", pid, status, parent);
            return Ok(ExitDisposition::Notified(parent));
        }
    }

    /// Waits for child `pid` of `parent` to exit and reaps it
    ///
    /// No wait options are supported. A reaped child cannot be waited for
    /// again.
    pub fn wait_for_child(&self, parent: Pid, pid: Pid, options: WaitOptions) -> Result<ExitStatus> {
        let channel: Arc<WaitChannel> = self.channels.get(parent).ok_or(Error::NoSuchProcess)?;
        let mut guard = channel.lock();

        if !self.table.exists(pid) {
            return Err(Error::NoSuchProcess);
        }
        if !options.is_empty() {
            return Err(Error::InvalidArgument("unsupported wait options"));
        }
        if !self.table.is_child_of(pid, parent) {
            return Err(Error::InvalidArgument("not a child of the caller"));
        }

        while self.table.is_running(pid) {
            guard.wait();
        }

        let status = self.table.get_exit(pid)?;
        self.table.remove(pid)?;
        let _ = self.channels.destroy(pid);
        drop(guard);

        crate::proc_debug!("process {}: reaped child {} ({})", parent, pid, status);
        Ok(status)
    }
}
