//! Core types used throughout the NOS process-control core

use ::core::fmt;

use bitflags::bitflags;
use static_assertions::const_assert;

/// Process identifier type
pub type Pid = i32;

/// Kernel thread identifier type
pub type ThreadId = u64;

/// Virtual address type
pub type VirtAddr = usize;

/// Size type
pub type Size = usize;

/// Result type for operations that can fail
pub type Result<T> = ::core::result::Result<T, crate::error::Error>;

/// Identifier of the kernel pseudo-process. Never handed to user programs
/// and never present in the process table.
pub const KERNEL_PID: Pid = 0;

/// Lowest identifier handed to a user process
pub const PID_MIN: Pid = 2;

/// Highest identifier handed to a user process
pub const PID_MAX: Pid = 32767;

/// Maximum number of arguments accepted by `execv`
pub const MAX_EXEC_ARGS: usize = 10;

/// Maximum total size of the argument strings passed to `execv`, in bytes
pub const ARG_MAX: usize = 64 * 1024;

/// Maximum length of a path name, including the terminating NUL
pub const PATH_MAX: usize = 1024;

/// Signal number used when the kernel kills a process
pub const SIGKILL: i32 = 9;

const_assert!(KERNEL_PID < PID_MIN);
const_assert!(PID_MIN <= PID_MAX);
const_assert!(MAX_EXEC_ARGS > 0);
const_assert!(PATH_MAX <= ARG_MAX);

bitflags! {
    /// Options accepted by `waitpid`. The process core supports none of
    /// them; any bit set is rejected.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WaitOptions: u32 {
        const NOHANG = 0x1;
        const UNTRACED = 0x2;
    }
}

/// Represents a kernel error code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// No such file or directory
    NotFound,
    /// No such process
    NoProcess,
    /// Argument list too long
    ArgumentListTooLong,
    /// Resource temporarily unavailable
    TryAgain,
    /// Not enough memory
    OutOfMemory,
    /// Bad address
    BadAddress,
    /// File exists
    AlreadyExists,
    /// Invalid argument
    InvalidArgument,
    /// File name too long
    NameTooLong,
    /// Function not implemented
    NotSupported,
    /// Unknown error
    Unknown(i32),
}

impl KernelError {
    /// Returns the errno value reported to user programs
    pub const fn errno(self) -> i32 {
        match self {
            KernelError::NotFound => 2,
            KernelError::NoProcess => 3,
            KernelError::ArgumentListTooLong => 7,
            KernelError::TryAgain => 11,
            KernelError::OutOfMemory => 12,
            KernelError::BadAddress => 14,
            KernelError::AlreadyExists => 17,
            KernelError::InvalidArgument => 22,
            KernelError::NameTooLong => 36,
            KernelError::NotSupported => 38,
            KernelError::Unknown(code) => code,
        }
    }

    /// Maps an errno value back to a kernel error
    pub const fn from_errno(errno: i32) -> Self {
        match errno {
            2 => KernelError::NotFound,
            3 => KernelError::NoProcess,
            7 => KernelError::ArgumentListTooLong,
            11 => KernelError::TryAgain,
            12 => KernelError::OutOfMemory,
            14 => KernelError::BadAddress,
            17 => KernelError::AlreadyExists,
            22 => KernelError::InvalidArgument,
            36 => KernelError::NameTooLong,
            38 => KernelError::NotSupported,
            code => KernelError::Unknown(code),
        }
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::NotFound => write!(f, "No such file or directory"),
            KernelError::NoProcess => write!(f, "No such process"),
            KernelError::ArgumentListTooLong => write!(f, "Argument list too long"),
            KernelError::TryAgain => write!(f, "Resource temporarily unavailable"),
            KernelError::OutOfMemory => write!(f, "Not enough memory"),
            KernelError::BadAddress => write!(f, "Bad address"),
            KernelError::AlreadyExists => write!(f, "File exists"),
            KernelError::InvalidArgument => write!(f, "Invalid argument"),
            KernelError::NameTooLong => write!(f, "File name too long"),
            KernelError::NotSupported => write!(f, "Function not implemented"),
            KernelError::Unknown(code) => write!(f, "Unknown error: {}", code),
        }
    }
}

/// Encoded wait status, as reported by `waitpid`
///
/// The low two bits hold the cause and the remaining bits hold the exit
/// code or signal number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitStatus(i32);

impl ExitStatus {
    const CAUSE_MASK: i32 = 0x3;
    const EXITED: i32 = 0;
    const SIGNALED: i32 = 1;
    const CORE_DUMPED: i32 = 2;
    const STOPPED: i32 = 3;

    /// Status of a process that called `_exit(code)`
    pub const fn exited(code: i32) -> Self {
        Self((code << 2) | Self::EXITED)
    }

    /// Status of a process killed by `signal`
    pub const fn signaled(signal: i32) -> Self {
        Self((signal << 2) | Self::SIGNALED)
    }

    /// Wraps an already-encoded status word
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// The encoded status word copied out to user space
    pub const fn raw(self) -> i32 {
        self.0
    }

    pub const fn is_exited(self) -> bool {
        self.0 & Self::CAUSE_MASK == Self::EXITED
    }

    pub const fn is_signaled(self) -> bool {
        let cause = self.0 & Self::CAUSE_MASK;
        cause == Self::SIGNALED || cause == Self::CORE_DUMPED
    }

    pub const fn is_stopped(self) -> bool {
        self.0 & Self::CAUSE_MASK == Self::STOPPED
    }

    /// Exit code, if the process exited normally
    pub const fn exit_code(self) -> Option<i32> {
        if self.is_exited() {
            Some(self.0 >> 2)
        } else {
            None
        }
    }

    /// Signal number, if the process was killed
    pub const fn term_signal(self) -> Option<i32> {
        if self.is_signaled() {
            Some(self.0 >> 2)
        } else {
            None
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.exit_code(), self.term_signal()) {
            (Some(code), _) => write!(f, "exited with code {}", code),
            (_, Some(signal)) => write!(f, "killed by signal {}", signal),
            _ => write!(f, "stopped (raw status {:#x})", self.0),
        }
    }
}

/// Runtime limits for the process core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessConfig {
    /// Lowest identifier handed out
    pub pid_min: Pid,
    /// Highest identifier handed out
    pub pid_max: Pid,
    /// Maximum number of `execv` arguments
    pub max_args: usize,
    /// Maximum total size of the `execv` argument strings
    pub arg_max: usize,
    /// Maximum path length
    pub path_max: usize,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            pid_min: PID_MIN,
            pid_max: PID_MAX,
            max_args: MAX_EXEC_ARGS,
            arg_max: ARG_MAX,
            path_max: PATH_MAX,
        }
    }
}

impl ProcessConfig {
    /// Restricts the identifier range. Useful for exercising exhaustion.
    pub fn with_pid_range(mut self, min: Pid, max: Pid) -> Self {
        self.pid_min = min;
        self.pid_max = max;
        self
    }

    pub fn with_max_args(mut self, max_args: usize) -> Self {
        self.max_args = max_args;
        self
    }

    /// Number of identifiers available to user processes
    pub fn pid_capacity(&self) -> usize {
        if self.pid_max < self.pid_min {
            0
        } else {
            (self.pid_max - self.pid_min) as usize + 1
        }
    }
}
