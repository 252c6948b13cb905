//! Saved execution continuations.
//!
//! A [`Context`] is the stack pointer of a suspended thread. Everything else
//! the thread needs to resume (callee-saved registers, floating-point control
//! state, the resume address) sits on its own stack below that pointer.

use crate::arch;
use crate::stack_guard::Stack;

#[repr(C)]
#[derive(Debug, Default)]
pub(crate) struct Context {
    pub sp: usize,
}

impl Context {
    /// Fabricates a continuation that, when restored, calls the runtime
    /// trampoline with `args` as if it had just captured itself there.
    pub fn synthesize(stack: &mut Stack, args: [usize; 3]) -> Self {
        let sp = unsafe { arch::initial_frame(stack.top(), args) };
        debug_assert!(stack.contains(sp));
        Context { sp }
    }

    /// Captures the running continuation into `from`, then resumes `to`.
    /// Returns when a later switch or restore resumes `from`.
    ///
    /// # Safety
    /// `to` must hold a continuation produced by [`Context::synthesize`] or a
    /// previous switch, whose stack is still allocated. Both pointers must
    /// stay valid until the caller is resumed.
    #[inline(always)]
    pub unsafe fn switch(from: *mut Context, to: *const Context) {
        arch::switch_context(from, to);
    }

    /// Resumes `to` without saving the running continuation.
    ///
    /// # Safety
    /// Same requirements on `to` as [`Context::switch`]. The caller's stack
    /// is abandoned.
    #[inline(always)]
    pub unsafe fn restore(to: *const Context) -> ! {
        arch::restore_context(to)
    }
}
