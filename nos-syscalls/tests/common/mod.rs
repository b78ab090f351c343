//! Host-side kernel used by the system call tests
//!
//! Kernel threads are host threads, address spaces are byte arrays, the file
//! system is a table of program images and "user mode" is a Rust closure
//! registered per program entry point.

#![allow(dead_code)]

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread::{self, JoinHandle, Thread as HostThread};
use std::time::{Duration, Instant};

use nos_api::{
    AddressSpace, AddressSpaceProvider, Error, OpenFlags, ProcessConfig, ProgramLoader, Result,
    ThreadEntry, ThreadId, ThreadSystem, TrapFrame, VirtAddr, Vfs, Vnode,
};
use nos_process::{ProcessManager, Thread};
use nos_syscalls::{Collaborators, ProcessSyscalls, UserEntry, UserImage};

/// Lowest user address of every test address space
pub const USER_BASE: VirtAddr = 0x1000_0000;

/// Size of every test address space
pub const USER_SIZE: usize = 0x1_0000;

/// Unwind payload used to end a kernel thread
pub struct ThreadExit;

/// Scheduler running kernel threads on host threads
#[derive(Default)]
pub struct TestThreads {
    handles: Mutex<Vec<JoinHandle<()>>>,
    parked: Mutex<HashMap<ThreadId, HostThread>>,
    failing_spawns: AtomicUsize,
    panicked: Arc<AtomicBool>,
}

static NEXT_HOST_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static HOST_ID: ThreadId = NEXT_HOST_ID.fetch_add(1, Ordering::SeqCst);
}

impl TestThreads {
    /// Makes the next `count` spawns fail
    pub fn fail_next_spawns(&self, count: usize) {
        self.failing_spawns.store(count, Ordering::SeqCst);
    }

    /// True once any kernel thread panicked
    pub fn panicked(&self) -> bool {
        self.panicked.load(Ordering::SeqCst)
    }

    /// Joins every thread spawned so far, propagating their panics
    pub fn join_all(&self) {
        loop {
            let handle = self.handles.lock().unwrap().pop();
            match handle {
                Some(handle) => handle.join().expect("Kernel thread panicked"),
                None => break,
            }
        }
    }
}

impl ThreadSystem for TestThreads {
    fn spawn(&self, name: &str, entry: ThreadEntry) -> Result<()> {
        let failing = self
            .failing_spawns
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(Error::OutOfMemory);
        }

        let panicked = self.panicked.clone();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(entry)) {
                    if !payload.is::<ThreadExit>() {
                        panicked.store(true, Ordering::SeqCst);
                        panic::resume_unwind(payload);
                    }
                }
            })
            .map_err(|_| Error::OutOfMemory)?;
        self.handles.lock().unwrap().push(handle);
        Ok(())
    }

    fn current(&self) -> ThreadId {
        let id = HOST_ID.with(|id| *id);
        self.parked.lock().unwrap().entry(id).or_insert_with(thread::current);
        id
    }

    fn sleep(&self) {
        thread::park();
    }

    fn wake(&self, tid: ThreadId) {
        if let Some(handle) = self.parked.lock().unwrap().get(&tid) {
            handle.unpark();
        }
    }

    fn exit_current(&self) -> ! {
        panic::resume_unwind(Box::new(ThreadExit))
    }
}

/// Shared counters for every address space a provider hands out
#[derive(Default)]
pub struct SpaceStats {
    live: AtomicUsize,
    activations: AtomicUsize,
    fail_duplicate: AtomicBool,
    fail_create: AtomicBool,
}

/// Byte-array address space covering `[USER_BASE, USER_BASE + USER_SIZE)`
pub struct TestSpace {
    id: usize,
    bytes: Mutex<Vec<u8>>,
    stats: Arc<SpaceStats>,
}

static NEXT_SPACE_ID: AtomicUsize = AtomicUsize::new(1);

impl TestSpace {
    pub fn new(stats: Arc<SpaceStats>) -> Self {
        Self::with_bytes(stats, vec![0; USER_SIZE])
    }

    fn with_bytes(stats: Arc<SpaceStats>, bytes: Vec<u8>) -> Self {
        stats.live.fetch_add(1, Ordering::SeqCst);
        Self {
            id: NEXT_SPACE_ID.fetch_add(1, Ordering::SeqCst),
            bytes: Mutex::new(bytes),
            stats,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    fn range(addr: VirtAddr, len: usize) -> Result<std::ops::Range<usize>> {
        let start = addr.checked_sub(USER_BASE).ok_or(Error::BadAddress)?;
        let end = start.checked_add(len).ok_or(Error::BadAddress)?;
        if end > USER_SIZE {
            return Err(Error::BadAddress);
        }
        Ok(start..end)
    }
}

impl Drop for TestSpace {
    fn drop(&mut self) {
        self.stats.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AddressSpace for TestSpace {
    fn duplicate(&self) -> Result<Arc<dyn AddressSpace>> {
        if self.stats.fail_duplicate.swap(false, Ordering::SeqCst) {
            return Err(Error::OutOfMemory);
        }
        let bytes = self.bytes.lock().unwrap().clone();
        Ok(Arc::new(TestSpace::with_bytes(self.stats.clone(), bytes)))
    }

    fn activate(&self) {
        self.stats.activations.fetch_add(1, Ordering::SeqCst);
    }

    fn deactivate(&self) {}

    fn define_stack(&self) -> Result<VirtAddr> {
        Ok(USER_BASE + USER_SIZE)
    }

    fn copy_out(&self, dst: VirtAddr, src: &[u8]) -> Result<()> {
        let range = Self::range(dst, src.len())?;
        self.bytes.lock().unwrap()[range].copy_from_slice(src);
        Ok(())
    }

    fn copy_in(&self, dst: &mut [u8], src: VirtAddr) -> Result<()> {
        let range = Self::range(src, dst.len())?;
        dst.copy_from_slice(&self.bytes.lock().unwrap()[range]);
        Ok(())
    }
}

/// Address-space factory with failure injection
#[derive(Default)]
pub struct TestSpaces {
    stats: Arc<SpaceStats>,
}

impl TestSpaces {
    /// Number of address spaces not yet dropped
    pub fn live(&self) -> usize {
        self.stats.live.load(Ordering::SeqCst)
    }

    pub fn activations(&self) -> usize {
        self.stats.activations.load(Ordering::SeqCst)
    }

    pub fn fail_next_duplicate(&self) {
        self.stats.fail_duplicate.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_create(&self) {
        self.stats.fail_create.store(true, Ordering::SeqCst);
    }

    pub fn standalone(&self) -> TestSpace {
        TestSpace::new(self.stats.clone())
    }
}

impl AddressSpaceProvider for TestSpaces {
    fn create(&self) -> Result<Arc<dyn AddressSpace>> {
        if self.stats.fail_create.swap(false, Ordering::SeqCst) {
            return Err(Error::OutOfMemory);
        }
        Ok(Arc::new(TestSpace::new(self.stats.clone())))
    }
}

/// Program image: the entry point, little endian
pub struct TestFile {
    data: Vec<u8>,
}

impl Vnode for TestFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let start = (offset as usize).min(self.data.len());
        let count = buf.len().min(self.data.len() - start);
        buf[..count].copy_from_slice(&self.data[start..start + count]);
        Ok(count)
    }

    fn size(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }
}

#[derive(Default)]
pub struct TestVfs {
    files: Mutex<HashMap<String, Arc<TestFile>>>,
    opened: AtomicUsize,
}

impl TestVfs {
    pub fn add(&self, path: &str, data: Vec<u8>) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), Arc::new(TestFile { data }));
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl Vfs for TestVfs {
    fn open(&self, path: &str, flags: OpenFlags) -> Result<Arc<dyn Vnode>> {
        assert!(flags.contains(OpenFlags::READ));
        let file = self.files.lock().unwrap().get(path).cloned().ok_or(Error::NotFound)?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(file)
    }
}

/// Loader that reads the entry point from the first eight bytes
pub struct TestLoader;

impl ProgramLoader for TestLoader {
    fn load(&self, image: &dyn Vnode, _space: &dyn AddressSpace) -> Result<VirtAddr> {
        let mut entry = [0u8; 8];
        if image.read_at(0, &mut entry)? != entry.len() {
            return Err(Error::InvalidInput);
        }
        Ok(u64::from_le_bytes(entry) as VirtAddr)
    }
}

/// User program body, run when a thread enters user mode at its entry point
pub type Program = Arc<dyn Fn(&Arc<ProcessSyscalls>, Arc<Thread>, UserImage) + Send + Sync>;

/// Forked-child body, selected by the first argument register of the fork
pub type ForkBody = Arc<dyn Fn(&Arc<ProcessSyscalls>, Arc<Thread>, TrapFrame) + Send + Sync>;

#[derive(Default)]
pub struct TestUser {
    procs: OnceLock<Weak<ProcessSyscalls>>,
    programs: Mutex<HashMap<VirtAddr, Program>>,
    forks: Mutex<HashMap<usize, ForkBody>>,
}

impl TestUser {
    fn procs(&self) -> Arc<ProcessSyscalls> {
        self.procs
            .get()
            .and_then(Weak::upgrade)
            .expect("Process syscalls are gone")
    }
}

impl UserEntry for TestUser {
    fn enter_forked_process(&self, thread: Arc<Thread>, frame: TrapFrame) -> ! {
        let procs = self.procs();
        let body = self
            .forks
            .lock()
            .unwrap()
            .get(&frame.args[0])
            .cloned()
            .expect("No fork body registered");
        body(&procs, thread.clone(), frame);
        procs.exit(&thread, 0)
    }

    fn enter_new_process(&self, thread: Arc<Thread>, image: UserImage) -> ! {
        let procs = self.procs();
        let program = self
            .programs
            .lock()
            .unwrap()
            .get(&image.entry)
            .cloned()
            .expect("No program at entry point");
        program(&procs, thread.clone(), image);
        procs.exit(&thread, 0)
    }
}

/// A booted test kernel
pub struct TestKernel {
    pub threads: Arc<TestThreads>,
    pub spaces: Arc<TestSpaces>,
    pub vfs: Arc<TestVfs>,
    pub user: Arc<TestUser>,
    pub procs: Arc<ProcessSyscalls>,
    next_entry: AtomicUsize,
}

impl TestKernel {
    pub fn boot() -> Self {
        Self::with_config(ProcessConfig::default())
    }

    pub fn with_config(config: ProcessConfig) -> Self {
        Self::with_vfs(config, None)
    }

    /// Boots with `vfs` in place of the in-memory file system
    pub fn with_vfs(config: ProcessConfig, vfs: Option<Arc<dyn Vfs>>) -> Self {
        let threads = Arc::new(TestThreads::default());
        let spaces = Arc::new(TestSpaces::default());
        let test_vfs = Arc::new(TestVfs::default());
        let user = Arc::new(TestUser::default());

        let manager = Arc::new(
            ProcessManager::new(config, threads.clone()).expect("Failed to boot process manager"),
        );
        let procs = Arc::new(ProcessSyscalls::new(
            manager,
            Collaborators {
                spaces: spaces.clone(),
                vfs: vfs.unwrap_or_else(|| test_vfs.clone() as Arc<dyn Vfs>),
                loader: Arc::new(TestLoader),
                threads: threads.clone(),
                user: user.clone(),
            },
        ));
        user.procs
            .set(Arc::downgrade(&procs))
            .unwrap_or_else(|_| panic!("User entry initialised twice"));

        Self {
            threads,
            spaces,
            vfs: test_vfs,
            user,
            procs,
            next_entry: AtomicUsize::new(1),
        }
    }

    /// Installs a program at `path`
    pub fn install<F>(&self, path: &str, program: F)
    where
        F: Fn(&Arc<ProcessSyscalls>, Arc<Thread>, UserImage) + Send + Sync + 'static,
    {
        let entry = 0x40_0000 + self.next_entry.fetch_add(1, Ordering::SeqCst) * 0x1000;
        self.vfs.add(path, (entry as u64).to_le_bytes().to_vec());
        self.user.programs.lock().unwrap().insert(entry, Arc::new(program));
    }

    /// Installs a file the loader rejects
    pub fn install_broken(&self, path: &str) {
        self.vfs.add(path, vec![0x7f, b'E']);
    }

    /// Registers what a forked child runs when the fork passed `token`
    pub fn on_fork<F>(&self, token: usize, body: F)
    where
        F: Fn(&Arc<ProcessSyscalls>, Arc<Thread>, TrapFrame) + Send + Sync + 'static,
    {
        self.user.forks.lock().unwrap().insert(token, Arc::new(body));
    }

    /// Starts `path` and waits for every process to finish
    pub fn run(&self, path: &str, args: &[&str]) -> i32 {
        let pid = self.procs.run_program(path, args).expect("Failed to start program");
        self.finish();
        pid
    }

    /// Waits for every process to finish and joins their threads
    ///
    /// Fails instead of hanging when a kernel thread panicked or processes
    /// are still alive after ten seconds.
    pub fn finish(&self) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while self.procs.manager().live_processes() > 0 {
            assert!(!self.threads.panicked(), "A kernel thread panicked");
            assert!(Instant::now() < deadline, "Processes still running after 10s");
            thread::yield_now();
        }
        self.threads.join_all();
    }

    /// Asserts that nothing is left of any user process
    pub fn assert_clean(&self) {
        let manager = self.procs.manager();
        assert!(manager.table().is_empty(), "leftover entries: {:?}", manager.table().snapshot());
        assert!(manager.channels().is_empty());
        assert_eq!(manager.live_processes(), 0);
        assert_eq!(self.spaces.live(), 0);
    }
}

/// Writes a NUL-terminated string into `space`
pub fn put_str(space: &dyn AddressSpace, addr: VirtAddr, s: &str) {
    let mut bytes = s.as_bytes().to_vec();
    bytes.push(0);
    space.copy_out(addr, &bytes).expect("Failed to write string");
}

/// Reads a NUL-terminated string from `space`
pub fn get_str(space: &dyn AddressSpace, mut addr: VirtAddr) -> String {
    let mut bytes = Vec::new();
    loop {
        let mut byte = [0u8; 1];
        space.copy_in(&mut byte, addr).expect("Failed to read string");
        if byte[0] == 0 {
            return String::from_utf8(bytes).expect("Invalid UTF-8");
        }
        bytes.push(byte[0]);
        addr += 1;
    }
}

/// Writes a pointer array into `space`
pub fn put_words(space: &dyn AddressSpace, addr: VirtAddr, words: &[usize]) {
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_ne_bytes()).collect();
    space.copy_out(addr, &bytes).expect("Failed to write words");
}

pub fn get_word(space: &dyn AddressSpace, addr: VirtAddr) -> usize {
    nos_api::memory::read_user_word(space, addr).expect("Failed to read word")
}
