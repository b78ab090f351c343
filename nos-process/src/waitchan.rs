//! Wait channels
//!
//! One monitor per live process. A parent waiting for a child sleeps on its
//! own channel; an exiting child takes the parent's channel lock, publishes
//! its status and wakes the parent.
//!
//! A waiter queues itself while it still holds the lock and only then
//! releases it and sleeps. Signals are sent with the lock held, so a signal
//! sent between releasing the lock and going to sleep finds the waiter
//! queued and its wakeup is kept by the scheduler.

use alloc::collections::VecDeque;
use alloc::sync::Arc;

use hashbrown::HashMap;
use nos_api::{Error, Pid, Result, ThreadId, ThreadSystem};
use spin::{Mutex, MutexGuard};

/// Lock plus condition owned by one process
pub struct WaitChannel {
    pid: Pid,
    lock: Mutex<()>,
    /// Sleeping threads, oldest first
    waiters: Mutex<VecDeque<ThreadId>>,
    threads: Arc<dyn ThreadSystem>,
}

impl WaitChannel {
    pub fn new(pid: Pid, threads: Arc<dyn ThreadSystem>) -> Self {
        Self {
            pid,
            lock: Mutex::new(()),
            waiters: Mutex::new(VecDeque::new()),
            threads,
        }
    }

    /// Process this channel belongs to
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Acquires the channel lock. Dropping the guard releases it.
    pub fn lock(&self) -> WaitGuard<'_> {
        WaitGuard {
            channel: self,
            guard: Some(self.lock.lock()),
        }
    }

    /// Number of threads asleep on this channel
    pub fn waiter_count(&self) -> usize {
        self.waiters.lock().len()
    }
}

/// Held channel lock
pub struct WaitGuard<'a> {
    channel: &'a WaitChannel,
    guard: Option<MutexGuard<'a, ()>>,
}

impl WaitGuard<'_> {
    /// Releases the lock, sleeps until signalled, then reacquires the lock
    ///
    /// Wakeups may be spurious; callers re-check their condition in a loop.
    pub fn wait(&mut self) {
        let channel = self.channel;
        let me = channel.threads.current();
        channel.waiters.lock().push_back(me);

        self.guard = None;
        channel.threads.sleep();
        self.guard = Some(channel.lock.lock());

        // Still queued after a spurious wakeup.
        let mut waiters = channel.waiters.lock();
        if let Some(pos) = waiters.iter().position(|&tid| tid == me) {
            waiters.remove(pos);
        }
    }

    /// Wakes the longest-sleeping waiter
    pub fn signal(&self) {
        let waiter = self.channel.waiters.lock().pop_front();
        if let Some(tid) = waiter {
            self.channel.threads.wake(tid);
        }
    }

    /// Wakes every waiter
    pub fn broadcast(&self) {
        let waiters: VecDeque<ThreadId> = core::mem::take(&mut *self.channel.waiters.lock());
        for tid in waiters {
            self.channel.threads.wake(tid);
        }
    }
}

/// Identifier to wait channel map
pub struct WaitChannelRegistry {
    threads: Arc<dyn ThreadSystem>,
    channels: Mutex<HashMap<Pid, Arc<WaitChannel>>>,
}

impl WaitChannelRegistry {
    pub fn new(threads: Arc<dyn ThreadSystem>) -> Self {
        Self {
            threads,
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Creates the channel for a new process
    pub fn create(&self, pid: Pid) -> Result<Arc<WaitChannel>> {
        let mut channels = self.channels.lock();
        if channels.contains_key(&pid) {
            return Err(Error::InvalidArgument("wait channel already exists"));
        }
        let channel = Arc::new(WaitChannel::new(pid, self.threads.clone()));
        channels.insert(pid, channel.clone());
        Ok(channel)
    }

    /// Drops the registry's handle. Threads still holding the channel keep
    /// it alive until they let go.
    pub fn destroy(&self, pid: Pid) -> Result<()> {
        self.channels
            .lock()
            .remove(&pid)
            .map(|_| ())
            .ok_or(Error::NoSuchProcess)
    }

    pub fn get(&self, pid: Pid) -> Option<Arc<WaitChannel>> {
        self.channels.lock().get(&pid).cloned()
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.channels.lock().contains_key(&pid)
    }

    pub fn len(&self) -> usize {
        self.channels.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::{Condvar, mpsc};
    use std::thread;
    use std::time::Duration;

    static NEXT_ID: AtomicU64 = AtomicU64::new(1);

    std::thread_local! {
        static ID: ThreadId = NEXT_ID.fetch_add(1, Ordering::SeqCst);
    }

    /// Scheduler keeping one wakeup per thread. With a gate, every sleeper
    /// reports in and waits for permission before it actually sleeps.
    struct PermitThreads {
        granted: std::sync::Mutex<HashSet<ThreadId>>,
        cond: Condvar,
        timed_out: AtomicBool,
        gate: Option<(std::sync::Mutex<mpsc::Sender<()>>, std::sync::Mutex<mpsc::Receiver<()>>)>,
    }

    impl PermitThreads {
        fn new() -> Self {
            Self {
                granted: std::sync::Mutex::new(HashSet::new()),
                cond: Condvar::new(),
                timed_out: AtomicBool::new(false),
                gate: None,
            }
        }

        fn gated(asleep: mpsc::Sender<()>, resume: mpsc::Receiver<()>) -> Self {
            Self {
                gate: Some((std::sync::Mutex::new(asleep), std::sync::Mutex::new(resume))),
                ..Self::new()
            }
        }

        fn timed_out(&self) -> bool {
            self.timed_out.load(Ordering::SeqCst)
        }
    }

    impl ThreadSystem for PermitThreads {
        fn spawn(&self, _name: &str, _entry: nos_api::ThreadEntry) -> Result<()> {
            Err(Error::NotImplemented)
        }

        fn current(&self) -> ThreadId {
            ID.with(|id| *id)
        }

        fn sleep(&self) {
            let me = self.current();
            if let Some((asleep, resume)) = &self.gate {
                asleep.lock().unwrap().send(()).unwrap();
                resume.lock().unwrap().recv().unwrap();
            }
            let granted = self.granted.lock().unwrap();
            let (mut granted, result) = self
                .cond
                .wait_timeout_while(granted, Duration::from_secs(5), |granted| !granted.contains(&me))
                .unwrap();
            if result.timed_out() {
                self.timed_out.store(true, Ordering::SeqCst);
            }
            granted.remove(&me);
        }

        fn wake(&self, thread: ThreadId) {
            self.granted.lock().unwrap().insert(thread);
            self.cond.notify_all();
        }

        fn exit_current(&self) -> ! {
            panic!("no thread exits in these tests");
        }
    }

    fn wait_for_waiters(channel: &WaitChannel, count: usize) {
        while channel.waiter_count() != count {
            thread::yield_now();
        }
    }

    #[test]
    fn test_signal_before_sleep_is_kept() {
        let (asleep_tx, asleep_rx) = mpsc::channel();
        let (resume_tx, resume_rx) = mpsc::channel();
        let threads = Arc::new(PermitThreads::gated(asleep_tx, resume_rx));
        let channel = Arc::new(WaitChannel::new(2, threads.clone()));
        let ready = Arc::new(AtomicBool::new(false));

        let waiter = {
            let channel = channel.clone();
            let ready = ready.clone();
            thread::spawn(move || {
                let mut guard = channel.lock();
                while !ready.load(Ordering::SeqCst) {
                    guard.wait();
                }
            })
        };

        // The waiter is queued and has dropped the lock, but is not asleep.
        asleep_rx.recv().unwrap();
        {
            let guard = channel.lock();
            ready.store(true, Ordering::SeqCst);
            guard.signal();
        }
        resume_tx.send(()).unwrap();

        waiter.join().unwrap();
        assert!(!threads.timed_out());
        assert_eq!(channel.waiter_count(), 0);
    }

    #[test]
    fn test_signal_wakes_one_waiter() {
        let threads = Arc::new(PermitThreads::new());
        let channel = Arc::new(WaitChannel::new(2, threads.clone()));
        let tickets = Arc::new(spin::Mutex::new(0));

        let waiters: std::vec::Vec<_> = (0..2)
            .map(|_| {
                let channel = channel.clone();
                let tickets = tickets.clone();
                thread::spawn(move || {
                    let mut guard = channel.lock();
                    while *tickets.lock() == 0 {
                        guard.wait();
                    }
                    *tickets.lock() -= 1;
                })
            })
            .collect();
        wait_for_waiters(&channel, 2);

        for remaining in [1, 0] {
            {
                let guard = channel.lock();
                *tickets.lock() += 1;
                guard.signal();
            }
            assert_eq!(channel.waiter_count(), remaining);
            while *tickets.lock() != 0 {
                thread::yield_now();
            }
        }

        for waiter in waiters {
            waiter.join().unwrap();
        }
        assert!(!threads.timed_out());
    }

    #[test]
    fn test_broadcast_wakes_every_waiter() {
        let threads = Arc::new(PermitThreads::new());
        let channel = Arc::new(WaitChannel::new(2, threads.clone()));
        let open = Arc::new(AtomicBool::new(false));

        let waiters: std::vec::Vec<_> = (0..3)
            .map(|_| {
                let channel = channel.clone();
                let open = open.clone();
                thread::spawn(move || {
                    let mut guard = channel.lock();
                    while !open.load(Ordering::SeqCst) {
                        guard.wait();
                    }
                })
            })
            .collect();
        wait_for_waiters(&channel, 3);

        {
            let guard = channel.lock();
            open.store(true, Ordering::SeqCst);
            guard.broadcast();
        }
        assert_eq!(channel.waiter_count(), 0);

        for waiter in waiters {
            waiter.join().unwrap();
        }
        assert!(!threads.timed_out());
    }

    #[test]
    fn test_destroy_keeps_held_channel_alive() {
        let registry = WaitChannelRegistry::new(Arc::new(PermitThreads::new()));
        let created = registry.create(5).unwrap();
        assert!(matches!(registry.create(5), Err(Error::InvalidArgument(_))));

        let held = registry.get(5).unwrap();
        assert!(Arc::ptr_eq(&created, &held));
        drop(created);

        registry.destroy(5).unwrap();
        assert!(!registry.contains(5));
        assert!(registry.is_empty());
        assert_eq!(registry.destroy(5), Err(Error::NoSuchProcess));

        assert_eq!(Arc::strong_count(&held), 1);
        assert_eq!(held.pid(), 5);
        let guard = held.lock();
        guard.broadcast();
    }
}

