//! Architecture backends for continuation capture and restore.
//!
//! Each backend provides the same three pieces:
//!
//! - `switch_context(from, to)`: push the callee-saved state onto the
//!   current stack, store the stack pointer into `from`, load the stack
//!   pointer from `to` and pop its state.
//! - `restore_context(to)`: the second half of `switch_context` only.
//! - `initial_frame(top, args)`: lay out a frame that `restore_context`
//!   pops into the entry shim, which then calls the runtime trampoline with
//!   `args` as its three arguments.

#[cfg(target_arch = "x86_64")]
mod x86_64;
#[cfg(target_arch = "x86_64")]
pub(crate) use self::x86_64::{initial_frame, restore_context, switch_context};

#[cfg(target_arch = "aarch64")]
mod aarch64;
#[cfg(target_arch = "aarch64")]
pub(crate) use self::aarch64::{initial_frame, restore_context, switch_context};

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
compile_error!("green-threads supports x86_64 and aarch64 only");
