//! User argument block layout
//!
//! Below the initial stack pointer a new program finds its argument strings,
//! each NUL-terminated and padded to a 4-byte boundary, the first argument
//! highest in memory. Below the strings sits the NULL-terminated array of
//! pointers to them, aligned to the pointer size. The stack pointer and
//! `argv` both point at that array.

use alloc::string::String;
use alloc::vec::Vec;

use core::mem::size_of;

use nos_api::memory::align_down;
use nos_api::{AddressSpace, Error, Result, VirtAddr};

/// Alignment of each argument string
pub const STRING_ALIGN: usize = 4;

/// Where the argument block ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgumentBlock {
    pub argc: usize,
    pub argv: VirtAddr,
    pub stack_pointer: VirtAddr,
}

/// Writes `args` below `stack_top` in `space`
pub fn layout_arguments(
    space: &dyn AddressSpace,
    stack_top: VirtAddr,
    args: &[String],
) -> Result<ArgumentBlock> {
    let mut sp = align_down(stack_top, STRING_ALIGN);
    let mut pointers: Vec<VirtAddr> = Vec::with_capacity(args.len() + 1);

    for arg in args {
        let padded = (arg.len() + 1).next_multiple_of(STRING_ALIGN);
        sp = sp.checked_sub(padded).ok_or(Error::ArgumentListTooLong)?;

        let mut bytes = Vec::with_capacity(padded);
        bytes.extend_from_slice(arg.as_bytes());
        bytes.resize(padded, 0);
        space.copy_out(sp, &bytes)?;
        pointers.push(sp);
    }
    pointers.push(0);

    let table_len = pointers.len() * size_of::<VirtAddr>();
    sp = sp.checked_sub(table_len).ok_or(Error::ArgumentListTooLong)?;
    sp = align_down(sp, size_of::<VirtAddr>());

    let mut table = Vec::with_capacity(table_len);
    for ptr in &pointers {
        table.extend_from_slice(&ptr.to_ne_bytes());
    }
    space.copy_out(sp, &table)?;

    Ok(ArgumentBlock {
        argc: args.len(),
        argv: sp,
        stack_pointer: sp,
    })
}
