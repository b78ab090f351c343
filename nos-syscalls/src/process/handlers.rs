//! Trap-frame decoding for the process system calls

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use nos_api::{Error, Result, SyscallArgs, TrapFrame, WaitOptions};
use nos_process::Thread;

use super::ProcessSyscalls;
use crate::common::{copy_in_argv, copy_in_string, copy_out_status};
use crate::core::dispatcher::SyscallDispatcher;
use crate::core::traits::SyscallHandler;
use crate::types::{SYS_EXECV, SYS_EXIT, SYS_FORK, SYS_GETPID, SYS_WAITPID};

/// Register process system call handlers
pub fn register_handlers(dispatcher: &mut SyscallDispatcher, procs: &Arc<ProcessSyscalls>) -> Result<()> {
    dispatcher.register_handler(SYS_FORK, Box::new(ForkHandler::new(procs.clone())));
    dispatcher.register_handler(SYS_EXECV, Box::new(ExecvHandler::new(procs.clone())));
    dispatcher.register_handler(SYS_EXIT, Box::new(ExitHandler::new(procs.clone())));
    dispatcher.register_handler(SYS_WAITPID, Box::new(WaitpidHandler::new(procs.clone())));
    dispatcher.register_handler(SYS_GETPID, Box::new(GetpidHandler::new(procs.clone())));
    Ok(())
}

macro_rules! process_handler {
    ($name:ident) => {
        pub struct $name {
            procs: Arc<ProcessSyscalls>,
        }

        impl $name {
            pub fn new(procs: Arc<ProcessSyscalls>) -> Self {
                Self { procs }
            }
        }
    };
}

process_handler!(ForkHandler);
process_handler!(ExecvHandler);
process_handler!(ExitHandler);
process_handler!(WaitpidHandler);
process_handler!(GetpidHandler);

/// `pid_t fork(void)`
impl SyscallHandler for ForkHandler {
    fn execute(&self, caller: &Arc<Thread>, frame: &TrapFrame) -> Result<isize> {
        self.procs.fork(caller, frame).map(|pid| pid as isize)
    }

    fn name(&self) -> &str {
        "fork"
    }

    fn id(&self) -> u32 {
        SYS_FORK
    }
}

/// `int execv(const char *program, char **args)`
impl SyscallHandler for ExecvHandler {
    fn execute(&self, caller: &Arc<Thread>, frame: &TrapFrame) -> Result<isize> {
        let args = frame.syscall_args();
        let (path, argv) = self.copy_in(caller, &args)?;
        match self.procs.exec_image(caller, path, argv)? {}
    }

    fn name(&self) -> &str {
        "execv"
    }

    fn id(&self) -> u32 {
        SYS_EXECV
    }
}

impl ExecvHandler {
    fn copy_in(&self, caller: &Thread, args: &SyscallArgs) -> Result<(String, Vec<String>)> {
        let limits = *self.procs.limits();
        let process = caller.process().ok_or(Error::NoSuchProcess)?;
        let space = process.address_space().ok_or(Error::BadAddress)?;

        let path = copy_in_string(space.as_ref(), args.arg0, limits.path_max)?;
        let argv = copy_in_argv(space.as_ref(), args.arg1, limits.max_args, limits.arg_max)?;
        Ok((path, argv))
    }
}

/// `void _exit(int code)`
impl SyscallHandler for ExitHandler {
    fn execute(&self, caller: &Arc<Thread>, frame: &TrapFrame) -> Result<isize> {
        self.procs.exit(caller, SyscallArgs::int(frame.args[0]))
    }

    fn name(&self) -> &str {
        "_exit"
    }

    fn id(&self) -> u32 {
        SYS_EXIT
    }
}

/// `pid_t waitpid(pid_t pid, int *status, int options)`
impl SyscallHandler for WaitpidHandler {
    fn execute(&self, caller: &Arc<Thread>, frame: &TrapFrame) -> Result<isize> {
        let args = frame.syscall_args();
        let pid = SyscallArgs::pid(args.arg0);
        let options = u32::try_from(args.arg2)
            .map(WaitOptions::from_bits_retain)
            .map_err(|_| Error::InvalidArgument("unsupported wait options"))?;

        let status = self.procs.waitpid(caller, pid, options)?;
        if args.arg1 != 0 {
            let process = caller.process().ok_or(Error::NoSuchProcess)?;
            let space = process.address_space().ok_or(Error::BadAddress)?;
            copy_out_status(space.as_ref(), args.arg1, status)?;
        }
        Ok(pid as isize)
    }

    fn name(&self) -> &str {
        "waitpid"
    }

    fn id(&self) -> u32 {
        SYS_WAITPID
    }
}

/// `pid_t getpid(void)`
impl SyscallHandler for GetpidHandler {
    fn execute(&self, caller: &Arc<Thread>, _frame: &TrapFrame) -> Result<isize> {
        Ok(self.procs.getpid(caller) as isize)
    }

    fn name(&self) -> &str {
        "getpid"
    }

    fn id(&self) -> u32 {
        SYS_GETPID
    }
}
