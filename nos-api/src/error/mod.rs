//! Error handling module for the NOS process-control core

use ::core::fmt;

use crate::core::types::KernelError;

/// Common error type used throughout the process-control core
///
/// Every variant is something a system call can hand back to the caller.
/// Invariant violations inside the kernel are not represented here; they
/// panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Kernel error reported by a collaborator
    Kernel(KernelError),
    /// Out of memory
    OutOfMemory,
    /// Every process identifier is in use
    OutOfIdentifiers,
    /// No such process
    NoSuchProcess,
    /// Invalid argument
    InvalidArgument(&'static str),
    /// Empty or malformed input, such as an empty program path
    InvalidInput,
    /// Resource not found
    NotFound,
    /// Too many arguments, or argument strings too large
    ArgumentListTooLong,
    /// Path name too long
    NameTooLong,
    /// User pointer outside the caller's address space
    BadAddress,
    /// Thread already belongs to a process
    AlreadyAttached,
    /// Unknown system call
    NotImplemented,
}

impl Error {
    /// The kernel error code this error is reported as
    pub const fn kind(&self) -> KernelError {
        match self {
            Error::Kernel(err) => *err,
            Error::OutOfMemory => KernelError::OutOfMemory,
            Error::OutOfIdentifiers => KernelError::TryAgain,
            Error::NoSuchProcess => KernelError::NoProcess,
            Error::InvalidArgument(_) | Error::InvalidInput => KernelError::InvalidArgument,
            Error::NotFound => KernelError::NotFound,
            Error::ArgumentListTooLong => KernelError::ArgumentListTooLong,
            Error::NameTooLong => KernelError::NameTooLong,
            Error::BadAddress => KernelError::BadAddress,
            Error::AlreadyAttached => KernelError::AlreadyExists,
            Error::NotImplemented => KernelError::NotSupported,
        }
    }

    /// The errno value stored in the trap frame
    pub const fn errno(&self) -> i32 {
        self.kind().errno()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Kernel(err) => write!(f, "Kernel error: {}", err),
            Error::OutOfMemory => write!(f, "Out of memory"),
            Error::OutOfIdentifiers => write!(f, "Out of process identifiers"),
            Error::NoSuchProcess => write!(f, "No such process"),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::InvalidInput => write!(f, "Invalid input"),
            Error::NotFound => write!(f, "Not found"),
            Error::ArgumentListTooLong => write!(f, "Argument list too long"),
            Error::NameTooLong => write!(f, "Name too long"),
            Error::BadAddress => write!(f, "Bad address"),
            Error::AlreadyAttached => write!(f, "Thread already attached to a process"),
            Error::NotImplemented => write!(f, "Not implemented"),
        }
    }
}

impl From<KernelError> for Error {
    fn from(err: KernelError) -> Self {
        match err {
            KernelError::NotFound => Error::NotFound,
            KernelError::NoProcess => Error::NoSuchProcess,
            KernelError::OutOfMemory => Error::OutOfMemory,
            KernelError::BadAddress => Error::BadAddress,
            KernelError::NameTooLong => Error::NameTooLong,
            KernelError::ArgumentListTooLong => Error::ArgumentListTooLong,
            other => Error::Kernel(other),
        }
    }
}

/// Result type for operations that can fail
pub type Result<T> = ::core::result::Result<T, Error>;

/// Creates a new kernel error
pub fn kernel_error(err: KernelError) -> Error {
    Error::Kernel(err)
}

/// Creates a new invalid argument error
pub fn invalid_argument(msg: &'static str) -> Error {
    Error::InvalidArgument(msg)
}

/// Creates a new out of memory error
pub fn out_of_memory() -> Error {
    Error::OutOfMemory
}

/// Creates a new no such process error
pub fn no_such_process() -> Error {
    Error::NoSuchProcess
}

/// Creates a new not found error
pub fn not_found() -> Error {
    Error::NotFound
}
