//! x86_64 System V context switching.
//!
//! Saved frame, from the stored stack pointer upwards:
//!
//! ```text
//! sp + 0   MXCSR (low 4 bytes), x87 control word (bytes 4..6)
//! sp + 8   r15
//! sp + 16  r14
//! sp + 24  r13
//! sp + 32  r12
//! sp + 40  rbx
//! sp + 48  rbp
//! sp + 56  return address
//! ```

use crate::context::Context;
use core::arch::naked_asm;

/// MXCSR and x87 control word values a fresh thread starts with.
const DEFAULT_CONTROL_WORDS: usize = (0x037F << 32) | 0x1F80;

#[unsafe(naked)]
pub(crate) unsafe extern "C" fn switch_context(from: *mut Context, to: *const Context) {
    naked_asm!(
        "push rbp",
        "push rbx",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "sub rsp, 8",
        "stmxcsr dword ptr [rsp]",
        "fnstcw word ptr [rsp + 4]",
        "mov [rdi], rsp",
        "mov rsp, [rsi]",
        "ldmxcsr dword ptr [rsp]",
        "fldcw word ptr [rsp + 4]",
        "add rsp, 8",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "ret",
    );
}

#[unsafe(naked)]
pub(crate) unsafe extern "C" fn restore_context(to: *const Context) -> ! {
    naked_asm!(
        "mov rsp, [rdi]",
        "ldmxcsr dword ptr [rsp]",
        "fldcw word ptr [rsp + 4]",
        "add rsp, 8",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "ret",
    );
}

/// First code a new thread executes. The synthesized frame parks the
/// trampoline arguments in r12..r14; rsp is 16-byte aligned here, so the
/// call leaves the trampoline with the alignment the ABI expects.
#[unsafe(naked)]
unsafe extern "C" fn entry_shim() -> ! {
    naked_asm!(
        "mov rdi, r12",
        "mov rsi, r13",
        "mov rdx, r14",
        "call {trampoline}",
        "ud2",
        trampoline = sym crate::runtime::trampoline,
    );
}

/// # Safety
/// `top` must be 16-byte aligned with at least 64 writable bytes below it.
pub(crate) unsafe fn initial_frame(top: *mut u8, args: [usize; 3]) -> usize {
    let frame: [usize; 8] = [
        DEFAULT_CONTROL_WORDS,
        0,       // r15
        args[2], // r14
        args[1], // r13
        args[0], // r12
        0,       // rbx
        0,       // rbp
        entry_shim as *const () as usize,
    ];
    let sp = (top as *mut usize).sub(frame.len());
    core::ptr::copy_nonoverlapping(frame.as_ptr(), sp, frame.len());
    sp as usize
}
