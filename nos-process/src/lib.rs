//! NOS Process
//!
//! Process bookkeeping for the NOS kernel: identifier allocation, the
//! process table, per-process wait channels, process and thread records and
//! the parent/child exit rendezvous.
//!
//! # Architecture
//!
//! - **Table**: identifier to {parent, exit status, liveness}
//! - **Wait channels**: one monitor per live process
//! - **Records**: what a process owns (threads, address space, cwd)
//! - **Lifecycle**: creation, thread attach/detach, destruction
//! - **Rendezvous**: exit notification, orphaning and reaping
//!
//! # Usage
//!
//! ```rust,ignore
//! use nos_process::ProcessManager;
//!
//! let manager = ProcessManager::new(ProcessConfig::default(), threads)?;
//! let process = manager.spawn_user_process("/bin/sh")?;
//! ```

#![no_std]
#![allow(dead_code)]

#[cfg(any(test, feature = "std"))]
extern crate std;

extern crate alloc;

pub mod logging;

pub mod lifecycle;
pub mod record;
pub mod rendezvous;
pub mod table;
pub mod waitchan;

pub use lifecycle::ProcessManager;
pub use record::{Process, Thread};
pub use rendezvous::ExitDisposition;
pub use table::{ProcessTable, TableEntry};
pub use waitchan::{WaitChannel, WaitChannelRegistry, WaitGuard};
