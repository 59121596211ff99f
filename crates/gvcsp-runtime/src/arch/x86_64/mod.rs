//! x86_64 (System V) context switching

use std::arch::naked_asm;

use super::ContextEntry;

/// Callee-saved registers of a suspended context.
///
/// Field offsets are hard-coded in `switch_context`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SavedRegs {
    pub rsp: u64, // 0x00
    pub rip: u64, // 0x08
    pub rbx: u64, // 0x10
    pub rbp: u64, // 0x18
    pub r12: u64, // 0x20
    pub r13: u64, // 0x28
    pub r14: u64, // 0x30
    pub r15: u64, // 0x38
}

/// Prepare `regs` so that switching to it runs `entry(arg)` on the stack
/// ending at `stack_top`.
///
/// # Safety
///
/// `regs` must be valid for writes and `stack_top` must be the top of a
/// mapped, writable stack that outlives the context.
pub unsafe fn init_context(regs: *mut SavedRegs, stack_top: *mut u8, entry: ContextEntry, arg: usize) {
    // The trampoline starts with rsp 16-aligned; its `call` then leaves the
    // entry with rsp = 8 (mod 16) like any other function.
    let sp = (stack_top as usize) & !0xF;

    let regs = &mut *regs;
    *regs = SavedRegs::default();
    regs.rsp = sp as u64;
    regs.rip = context_trampoline as usize as u64;
    regs.r12 = entry as usize as u64;
    regs.r13 = arg as u64;
}

/// First code run by a fresh context: `entry(arg)` with entry in r12 and
/// arg in r13.
#[unsafe(naked)]
unsafe extern "C" fn context_trampoline() {
    naked_asm!(
        "mov rdi, r13",
        "call r12",
        // entry is `-> !`
        "ud2",
    );
}

/// Save the running context into `from` and resume `to`.
///
/// Returns when some other context switches back into `from`.
///
/// # Safety
///
/// `to` must hold a context produced by `init_context` or by an earlier
/// `switch_context`, whose stack is still mapped and not running anywhere.
#[unsafe(naked)]
pub unsafe extern "C" fn switch_context(_from: *mut SavedRegs, _to: *const SavedRegs) {
    naked_asm!(
        // save into rdi
        "mov [rdi + 0x00], rsp",
        "lea rax, [rip + 2f]",
        "mov [rdi + 0x08], rax",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], rbp",
        "mov [rdi + 0x20], r12",
        "mov [rdi + 0x28], r13",
        "mov [rdi + 0x30], r14",
        "mov [rdi + 0x38], r15",
        // load from rsi
        "mov r15, [rsi + 0x38]",
        "mov r14, [rsi + 0x30]",
        "mov r13, [rsi + 0x28]",
        "mov r12, [rsi + 0x20]",
        "mov rbp, [rsi + 0x18]",
        "mov rbx, [rsi + 0x10]",
        "mov rsp, [rsi + 0x00]",
        "jmp qword ptr [rsi + 0x08]",
        // resumed: rsp points at our caller's return address
        "2:",
        "ret",
    );
}
