//! execv and the kernel program launcher

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use core::convert::Infallible;

use nos_api::{AddressSpace, Error, ExitStatus, OpenFlags, Pid, Result, SIGKILL, Vnode};
use nos_process::Thread;

use super::args::layout_arguments;
use super::{ProcessSyscalls, UserEntry, UserImage};

impl ProcessSyscalls {
    /// Replaces the caller's program with the binary at `path`
    ///
    /// Only returns on failure. Errors detected before the old address
    /// space is discarded are returned to the caller; a failure after that
    /// kills the process.
    pub fn execv(&self, caller: &Arc<Thread>, path: &str, args: &[&str]) -> Result<Infallible> {
        let argv: Vec<String> = args.iter().map(|arg| String::from(*arg)).collect();
        self.exec_image(caller, String::from(path), argv)
    }

    /// [`execv`](Self::execv) with arguments already copied into the kernel
    pub fn exec_image(&self, caller: &Arc<Thread>, path: String, argv: Vec<String>) -> Result<Infallible> {
        self.check_arguments(&path, &argv)?;
        let process = self.current(caller)?;
        let image = self.vfs.open(&path, OpenFlags::READ)?;
        let space = self.spaces.create()?;

        // Point of no return: the old image is released here.
        if let Some(old) = process.replace_address_space(Some(space.clone())) {
            old.deactivate();
        }
        space.activate();

        let prepared = self.prepare_image(image.as_ref(), space.as_ref(), &argv);
        drop((space, image, process, argv));

        match prepared {
            Ok(user_image) => {
                crate::sys_debug!("execv: thread {} now running {}", caller.id(), path);
                drop(path);
                self.user.enter_new_process(caller.clone(), user_image)
            }
            Err(err) => {
                crate::sys_error!("execv: {} failed after the old image was released: {}", path, err);
                drop(path);
                self.terminate(caller, ExitStatus::signaled(SIGKILL))
            }
        }
    }

    /// Starts the program at `path` in a new process with no parent
    ///
    /// This is how the kernel launches the first user program. The new
    /// process cleans up after itself when it exits.
    pub fn run_program(&self, path: &str, args: &[&str]) -> Result<Pid> {
        let argv: Vec<String> = args.iter().map(|arg| String::from(*arg)).collect();
        self.check_arguments(path, &argv)?;

        let image = self.vfs.open(path, OpenFlags::READ)?;
        let process = self.manager.spawn_user_process(path)?;
        let pid = process.pid();
        let thread = self.manager.create_thread(path);

        let prepared = self
            .spaces
            .create()
            .and_then(|space| {
                process.replace_address_space(Some(space.clone()));
                self.prepare_image(image.as_ref(), space.as_ref(), &argv)
            })
            .and_then(|user_image| {
                self.manager.attach_thread(&process, &thread)?;
                Ok(user_image)
            });
        let user_image = match prepared {
            Ok(user_image) => user_image,
            Err(err) => {
                crate::sys_warn!("run_program: {} failed to start: {}", path, err);
                self.manager.abandon(process);
                return Err(err);
            }
        };
        drop((process, image));

        let user = self.user.clone();
        let entry_thread = thread.clone();
        let spawned = self.threads.spawn(
            path,
            Box::new(move || enter_new_child(user, entry_thread, user_image)),
        );
        if let Err(err) = spawned {
            crate::sys_warn!("run_program: {} could not start its thread: {}", path, err);
            let process = self.manager.detach_thread(&thread);
            self.manager.abandon(process);
            return Err(Error::OutOfMemory);
        }

        crate::sys_info!("run_program: started {} as pid {}", path, pid);
        Ok(pid)
    }

    fn check_arguments(&self, path: &str, argv: &[String]) -> Result<()> {
        let limits = self.limits();
        if path.is_empty() {
            return Err(Error::InvalidInput);
        }
        if path.len() >= limits.path_max {
            return Err(Error::NameTooLong);
        }
        if argv.len() > limits.max_args {
            return Err(Error::ArgumentListTooLong);
        }
        let total: usize = argv.iter().map(|arg| arg.len() + 1).sum();
        if total > limits.arg_max {
            return Err(Error::ArgumentListTooLong);
        }
        Ok(())
    }

    /// Loads the binary, sets up the stack and copies the arguments out
    fn prepare_image(
        &self,
        image: &dyn Vnode,
        space: &dyn AddressSpace,
        argv: &[String],
    ) -> Result<UserImage> {
        let entry = self.loader.load(image, space)?;
        let stack_top = space.define_stack()?;
        let block = layout_arguments(space, stack_top, argv)?;
        Ok(UserImage {
            entry,
            stack_pointer: block.stack_pointer,
            argc: block.argc,
            argv: block.argv,
        })
    }
}

fn enter_new_child(user: Arc<dyn UserEntry>, thread: Arc<Thread>, image: UserImage) -> ! {
    if let Some(space) = thread.process().and_then(|process| process.address_space()) {
        space.activate();
    }
    user.enter_new_process(thread, image)
}
