//! AArch64 (AAPCS64) context switching.
//!
//! The saved frame holds x19..x28, the frame pointer x29, the link register
//! x30 and the low halves of v8..v15, 160 bytes in total.

use crate::context::Context;
use core::arch::naked_asm;

const FRAME_WORDS: usize = 20;

#[unsafe(naked)]
pub(crate) unsafe extern "C" fn switch_context(from: *mut Context, to: *const Context) {
    naked_asm!(
        "sub sp, sp, #0xa0",
        "stp x19, x20, [sp, #0x00]",
        "stp x21, x22, [sp, #0x10]",
        "stp x23, x24, [sp, #0x20]",
        "stp x25, x26, [sp, #0x30]",
        "stp x27, x28, [sp, #0x40]",
        "stp x29, x30, [sp, #0x50]",
        "stp d8, d9, [sp, #0x60]",
        "stp d10, d11, [sp, #0x70]",
        "stp d12, d13, [sp, #0x80]",
        "stp d14, d15, [sp, #0x90]",
        "mov x9, sp",
        "str x9, [x0]",
        "ldr x9, [x1]",
        "mov sp, x9",
        "ldp x19, x20, [sp, #0x00]",
        "ldp x21, x22, [sp, #0x10]",
        "ldp x23, x24, [sp, #0x20]",
        "ldp x25, x26, [sp, #0x30]",
        "ldp x27, x28, [sp, #0x40]",
        "ldp x29, x30, [sp, #0x50]",
        "ldp d8, d9, [sp, #0x60]",
        "ldp d10, d11, [sp, #0x70]",
        "ldp d12, d13, [sp, #0x80]",
        "ldp d14, d15, [sp, #0x90]",
        "add sp, sp, #0xa0",
        "ret",
    );
}

#[unsafe(naked)]
pub(crate) unsafe extern "C" fn restore_context(to: *const Context) -> ! {
    naked_asm!(
        "ldr x9, [x0]",
        "mov sp, x9",
        "ldp x19, x20, [sp, #0x00]",
        "ldp x21, x22, [sp, #0x10]",
        "ldp x23, x24, [sp, #0x20]",
        "ldp x25, x26, [sp, #0x30]",
        "ldp x27, x28, [sp, #0x40]",
        "ldp x29, x30, [sp, #0x50]",
        "ldp d8, d9, [sp, #0x60]",
        "ldp d10, d11, [sp, #0x70]",
        "ldp d12, d13, [sp, #0x80]",
        "ldp d14, d15, [sp, #0x90]",
        "add sp, sp, #0xa0",
        "ret",
    );
}

/// First code a new thread executes; the trampoline arguments arrive in
/// x19..x21.
#[unsafe(naked)]
unsafe extern "C" fn entry_shim() -> ! {
    naked_asm!(
        "mov x0, x19",
        "mov x1, x20",
        "mov x2, x21",
        "mov x29, xzr",
        "bl {trampoline}",
        "brk #0x1",
        trampoline = sym crate::runtime::trampoline,
    );
}

/// # Safety
/// `top` must be 16-byte aligned with at least 160 writable bytes below it.
pub(crate) unsafe fn initial_frame(top: *mut u8, args: [usize; 3]) -> usize {
    let mut frame = [0usize; FRAME_WORDS];
    frame[0] = args[0]; // x19
    frame[1] = args[1]; // x20
    frame[2] = args[2]; // x21
    frame[11] = entry_shim as *const () as usize; // x30
    let sp = (top as *mut usize).sub(FRAME_WORDS);
    core::ptr::copy_nonoverlapping(frame.as_ptr(), sp, FRAME_WORDS);
    sp as usize
}
