//! fork

use alloc::boxed::Box;
use alloc::sync::Arc;

use nos_api::{Error, Pid, Result, TrapFrame};
use nos_process::{Process, Thread};

use super::{ProcessSyscalls, UserEntry};

impl ProcessSyscalls {
    /// Duplicates the caller's process
    ///
    /// Returns the child's identifier. The child starts on a new thread from
    /// a copy of `frame`, observing a return value of 0. On failure every
    /// resource taken for the child is released again.
    pub fn fork(&self, caller: &Arc<Thread>, frame: &TrapFrame) -> Result<Pid> {
        let parent = self.current(caller)?;
        let space = parent
            .address_space()
            .ok_or(Error::InvalidArgument("process has no address space"))?;

        let child = self.manager.spawn_for_program(parent.name(), &parent)?;
        let pid = child.pid();

        let child_space = match space.duplicate() {
            Ok(child_space) => child_space,
            Err(err) => {
                crate::sys_warn!("fork: pid {} could not copy address space: {}", parent.pid(), err);
                self.manager.abandon(child);
                return Err(err);
            }
        };
        drop(space);
        child.replace_address_space(Some(child_space));

        if let Err(err) = self.register_child(&parent, pid) {
            self.manager.abandon(child);
            return Err(err);
        }

        let thread = self.manager.create_thread(caller.name());
        if let Err(err) = self.manager.attach_thread(&child, &thread) {
            self.manager.abandon(child);
            return Err(err);
        }

        let user = self.user.clone();
        let entry_thread = thread.clone();
        let child_frame = *frame;
        let spawned = self.threads.spawn(
            thread.name(),
            Box::new(move || enter_forked_child(user, entry_thread, child_frame)),
        );
        if let Err(err) = spawned {
            crate::sys_warn!("fork: pid {} could not start child thread: {}", parent.pid(), err);
            let child = self.manager.detach_thread(&thread);
            self.manager.abandon(child);
            return Err(Error::OutOfMemory);
        }

        crate::sys_debug!("fork: pid {} created child {}", parent.pid(), pid);
        Ok(pid)
    }

    /// Links the child to its parent under the parent's channel lock
    fn register_child(&self, parent: &Process, child: Pid) -> Result<()> {
        let channel = self
            .manager
            .channel(parent.pid())
            .ok_or(Error::NoSuchProcess)?;
        let _guard = channel.lock();
        self.manager.table().register_parent(child, parent.pid())
    }
}

fn enter_forked_child(user: Arc<dyn UserEntry>, thread: Arc<Thread>, mut frame: TrapFrame) -> ! {
    if let Some(space) = thread.process().and_then(|process| process.address_space()) {
        space.activate();
    }
    frame.set_return(0);
    frame.advance_pc();
    user.enter_forked_process(thread, frame)
}
