//! Process lifecycle
//!
//! [`ProcessManager`] owns the process table, the wait-channel registry and
//! the kernel process. It creates and destroys process records, moves
//! threads in and out of them and counts live user processes.

use alloc::sync::Arc;

use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use nos_api::{Error, KERNEL_PID, Pid, ProcessConfig, Result, ThreadSystem};

use crate::record::{Process, Thread};
use crate::table::ProcessTable;
use crate::waitchan::{WaitChannel, WaitChannelRegistry};

/// Registry of every process in the system
pub struct ProcessManager {
    config: ProcessConfig,
    pub(crate) table: ProcessTable,
    pub(crate) channels: WaitChannelRegistry,
    kernel: Arc<Process>,
    next_tid: AtomicU64,
    live: AtomicUsize,
    /// Signalled when the last user process is destroyed
    idle: WaitChannel,
}

impl ProcessManager {
    /// Boots the process subsystem and creates the kernel process
    pub fn new(config: ProcessConfig, threads: Arc<dyn ThreadSystem>) -> Result<Self> {
        let table = ProcessTable::with_config(&config)?;

        // The kernel process takes an identifier like anyone else, gives it
        // back and runs as pid 0, outside the table.
        let boot_pid = table.allocate()?;
        table.remove(boot_pid)?;
        let kernel = Arc::new(Process::new("[kernel]", KERNEL_PID));

        crate::proc_debug!(
            "process manager: booted, pids {}..={}",
            config.pid_min,
            config.pid_max
        );

        Ok(Self {
            config,
            table,
            channels: WaitChannelRegistry::new(threads.clone()),
            idle: WaitChannel::new(KERNEL_PID, threads),
            kernel,
            next_tid: AtomicU64::new(1),
            live: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    pub fn channels(&self) -> &WaitChannelRegistry {
        &self.channels
    }

    pub fn channel(&self, pid: Pid) -> Option<Arc<WaitChannel>> {
        self.channels.get(pid)
    }

    pub fn kernel_process(&self) -> &Arc<Process> {
        &self.kernel
    }

    /// Number of user processes not yet destroyed
    pub fn live_processes(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Creates a process record with a fresh identifier and no address space
    pub fn create_process(&self, name: &str) -> Result<Arc<Process>> {
        let pid = self.table.allocate()?;
        self.live.fetch_add(1, Ordering::AcqRel);
        crate::proc_debug!("process {} ({}) created", pid, name);
        Ok(Arc::new(Process::new(name, pid)))
    }

    /// Creates a process that will run a user program on behalf of `parent`
    ///
    /// The new process shares the parent's working directory and gets its
    /// own wait channel. It is not registered as running yet.
    pub fn spawn_for_program(&self, name: &str, parent: &Process) -> Result<Arc<Process>> {
        let process = self.create_process(name)?;
        process.set_cwd(parent.cwd());
        if let Err(err) = self.channels.create(process.pid()) {
            self.abandon(process);
            return Err(err);
        }
        Ok(process)
    }

    /// Creates a process started by the kernel itself. Nobody waits for it,
    /// so it cleans up after itself when it exits.
    pub fn spawn_user_process(&self, name: &str) -> Result<Arc<Process>> {
        let process = self.spawn_for_program(name, &self.kernel)?;
        if let Err(err) = self.table.register_parent(process.pid(), KERNEL_PID) {
            self.abandon(process);
            return Err(err);
        }
        Ok(process)
    }

    /// Creates a thread record, not yet attached to any process
    pub fn create_thread(&self, name: &str) -> Arc<Thread> {
        let tid = self.next_tid.fetch_add(1, Ordering::Relaxed);
        Arc::new(Thread::new(tid, name))
    }

    pub fn attach_thread(&self, process: &Arc<Process>, thread: &Thread) -> Result<()> {
        let mut slot = thread.process.lock();
        if slot.is_some() {
            return Err(Error::AlreadyAttached);
        }
        process.add_thread(thread.id());
        *slot = Some(process.clone());
        Ok(())
    }

    /// Detaches `thread` from its process and returns the process
    ///
    /// # Panics
    ///
    /// Panics if the thread is not attached, or its process does not list it.
    pub fn detach_thread(&self, thread: &Thread) -> Arc<Process> {
        let process = match thread.set_process(None) {
            Some(process) => process,
            None => panic!("thread {} ({}) has no process", thread.id(), thread.name()),
        };
        if !process.remove_thread(thread.id()) {
            panic!(
                "thread {} escaped from process {}",
                thread.id(),
                process.pid()
            );
        }
        process
    }

    /// Frees a process record whose last thread has detached
    ///
    /// Releases the working directory and any address space still installed.
    /// The table entry and wait channel are left to the exit rendezvous.
    pub fn destroy_process(&self, process: Arc<Process>) {
        assert!(
            process.pid() != KERNEL_PID,
            "attempt to destroy the kernel process"
        );
        process.teardown();
        crate::proc_debug!("process {} ({}) destroyed", process.pid(), process.name());

        if self.live.fetch_sub(1, Ordering::AcqRel) == 1 {
            crate::proc_trace!("process manager: no user processes left");
            self.idle.lock().broadcast();
        }
    }

    /// Rolls back a process that never started running
    ///
    /// Removes its table entry and wait channel, then destroys the record.
    /// Any threads must have been detached already.
    pub fn abandon(&self, process: Arc<Process>) {
        let pid = process.pid();
        crate::proc_warn!("process {} abandoned before it ran", pid);
        let _ = self.table.remove(pid);
        let _ = self.channels.destroy(pid);
        self.destroy_process(process);
    }

    /// Blocks until every user process has been destroyed
    pub fn wait_until_idle(&self) {
        let mut guard = self.idle.lock();
        while self.live.load(Ordering::Acquire) > 0 {
            guard.wait();
        }
    }
}
