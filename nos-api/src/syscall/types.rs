//! System call types

use crate::core::types::*;
use crate::error::Error;

/// Number of argument registers carried by a trap frame
pub const SYSCALL_ARG_COUNT: usize = 6;

/// Length of the trap instruction the program counter is advanced past
pub const TRAP_INSN_LEN: usize = 4;

/// Register state saved when a user thread traps into the kernel
///
/// Only the registers the system call layer reads or writes are modelled:
/// the call number, its arguments, the return value and error flag, the
/// program counter and the stack pointer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrapFrame {
    /// System call number
    pub number: usize,
    /// Argument registers
    pub args: [usize; SYSCALL_ARG_COUNT],
    /// Return value register (errno when `error` is set)
    pub retval: usize,
    /// Error flag register
    pub error: bool,
    /// Program counter at the trap
    pub pc: usize,
    /// User stack pointer at the trap
    pub sp: usize,
}

impl TrapFrame {
    /// Creates a trap frame for a call with the given arguments
    pub fn new(number: usize, args: &[usize]) -> Self {
        let mut frame = Self {
            number,
            ..Self::default()
        };
        let count = args.len().min(SYSCALL_ARG_COUNT);
        frame.args[..count].copy_from_slice(&args[..count]);
        frame
    }

    /// Stores a successful return value
    pub fn set_return(&mut self, value: isize) {
        self.retval = value as usize;
        self.error = false;
    }

    /// Stores an error code
    pub fn set_error(&mut self, errno: i32) {
        self.retval = errno as usize;
        self.error = true;
    }

    /// Moves the program counter past the trap instruction so the call is
    /// not restarted on return
    pub fn advance_pc(&mut self) {
        self.pc = self.pc.wrapping_add(TRAP_INSN_LEN);
    }

    /// Reads back the result the user program will observe
    pub fn result(&self) -> SyscallResult {
        if self.error {
            SyscallResult::Error(KernelError::from_errno(self.retval as i32))
        } else {
            SyscallResult::Success(self.retval as isize)
        }
    }

    pub fn syscall_args(&self) -> SyscallArgs {
        SyscallArgs::from_frame(self)
    }
}

/// System call arguments
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyscallArgs {
    pub arg0: usize,
    pub arg1: usize,
    pub arg2: usize,
    pub arg3: usize,
    pub arg4: usize,
    pub arg5: usize,
}

impl SyscallArgs {
    /// Extracts the argument registers of a trap frame
    pub fn from_frame(frame: &TrapFrame) -> Self {
        let [arg0, arg1, arg2, arg3, arg4, arg5] = frame.args;
        Self { arg0, arg1, arg2, arg3, arg4, arg5 }
    }

    /// Interprets an argument register as a process identifier
    pub fn pid(value: usize) -> Pid {
        value as isize as Pid
    }

    /// Interprets an argument register as a signed integer
    pub fn int(value: usize) -> i32 {
        value as isize as i32
    }
}

/// System call result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallResult {
    /// Success with return value
    Success(isize),
    /// Error with error code
    Error(KernelError),
}

impl SyscallResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SyscallResult::Success(_))
    }

    /// Returns success value if successful
    pub fn success_value(&self) -> Option<isize> {
        match self {
            SyscallResult::Success(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns error if failed
    pub fn error_value(&self) -> Option<KernelError> {
        match self {
            SyscallResult::Error(error) => Some(*error),
            _ => None,
        }
    }

    /// Converts to the single-register convention: negative errno on failure
    pub fn to_isize(&self) -> isize {
        match self {
            SyscallResult::Success(value) => *value,
            SyscallResult::Error(error) => -(error.errno() as isize),
        }
    }

    /// Converts from the single-register convention
    pub fn from_isize(value: isize) -> Self {
        if value < 0 {
            SyscallResult::Error(KernelError::from_errno((-value) as i32))
        } else {
            SyscallResult::Success(value)
        }
    }
}

impl From<Result<isize>> for SyscallResult {
    fn from(result: Result<isize>) -> Self {
        match result {
            Ok(value) => SyscallResult::Success(value),
            Err(err) => SyscallResult::Error(Error::kind(&err)),
        }
    }
}
