//! _exit and waitpid

use nos_api::{ExitStatus, Pid, Result, WaitOptions};
use nos_process::Thread;

use super::ProcessSyscalls;

impl ProcessSyscalls {
    /// Terminates the caller's process with exit code `code`
    pub fn exit(&self, caller: &Thread, code: i32) -> ! {
        self.terminate(caller, ExitStatus::exited(code))
    }

    /// Waits for child `pid` of the caller to exit and returns its status
    pub fn waitpid(&self, caller: &Thread, pid: Pid, options: WaitOptions) -> Result<ExitStatus> {
        let process = self.current(caller)?;
        self.manager.wait_for_child(process.pid(), pid, options)
    }

    /// Tears down the caller's process and ends the calling thread
    pub(super) fn terminate(&self, caller: &Thread, status: ExitStatus) -> ! {
        match caller.process() {
            Some(process) => {
                let pid = process.pid();
                let reaped = self.manager.release_children(pid);
                if reaped > 0 {
                    crate::sys_trace!("exit: pid {} reaped {} unclaimed children", pid, reaped);
                }
                if let Err(err) = self.manager.report_exit(pid, status) {
                    crate::sys_error!("exit: pid {} could not publish its status: {}", pid, err);
                }

                if let Some(space) = process.replace_address_space(None) {
                    space.deactivate();
                }
                drop(process);

                let process = self.manager.detach_thread(caller);
                self.manager.destroy_process(process);
            }
            None => {
                crate::sys_warn!("exit: thread {} has no process", caller.id());
            }
        }
        self.threads.exit_current()
    }
}
