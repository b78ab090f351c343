//! Common system call utilities
//!
//! Copying strings, argument vectors and status words between the kernel and
//! a caller's address space.

use alloc::string::String;
use alloc::vec::Vec;

use core::mem::size_of;

use nos_api::memory::read_user_word;
use nos_api::{AddressSpace, Error, ExitStatus, Result, VirtAddr};

/// Copies a NUL-terminated string in from user memory
///
/// `max` bounds the string including its terminator.
pub fn copy_in_string(space: &dyn AddressSpace, addr: VirtAddr, max: usize) -> Result<String> {
    if addr == 0 {
        return Err(Error::BadAddress);
    }
    let mut bytes = Vec::new();
    loop {
        if bytes.len() >= max {
            return Err(Error::NameTooLong);
        }
        let at = addr.checked_add(bytes.len()).ok_or(Error::BadAddress)?;
        let mut byte = [0u8; 1];
        space.copy_in(&mut byte, at)?;
        if byte[0] == 0 {
            break;
        }
        bytes.push(byte[0]);
    }
    String::from_utf8(bytes).map_err(|_| Error::InvalidInput)
}

/// Copies a NULL-terminated `argv` array in from user memory
///
/// A null `argv` is an empty argument list. At most `max_args` strings are
/// accepted, with at most `arg_max` bytes between them counting terminators.
pub fn copy_in_argv(
    space: &dyn AddressSpace,
    argv: VirtAddr,
    max_args: usize,
    arg_max: usize,
) -> Result<Vec<String>> {
    let mut args = Vec::new();
    if argv == 0 {
        return Ok(args);
    }

    let mut total = 0;
    loop {
        let slot = args
            .len()
            .checked_mul(size_of::<usize>())
            .and_then(|offset| argv.checked_add(offset))
            .ok_or(Error::BadAddress)?;
        let ptr = read_user_word(space, slot)?;
        if ptr == 0 {
            break;
        }
        if args.len() == max_args {
            return Err(Error::ArgumentListTooLong);
        }
        let arg = copy_in_string(space, ptr, arg_max - total).map_err(|err| match err {
            Error::NameTooLong => Error::ArgumentListTooLong,
            other => other,
        })?;
        total += arg.len() + 1;
        args.push(arg);
    }
    Ok(args)
}

/// Copies an encoded wait status out to user memory
pub fn copy_out_status(space: &dyn AddressSpace, addr: VirtAddr, status: ExitStatus) -> Result<()> {
    space.copy_out(addr, &status.raw().to_ne_bytes())
}
