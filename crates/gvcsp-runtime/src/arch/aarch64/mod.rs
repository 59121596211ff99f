//! aarch64 (AAPCS64) context switching

use std::arch::naked_asm;

use super::ContextEntry;

/// Callee-saved registers of a suspended context: x19-x28, fp, lr, sp
/// and the low halves of v8-v15.
///
/// Field offsets are hard-coded in `switch_context`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SavedRegs {
    pub x: [u64; 10], // 0x00 x19..x28
    pub fp: u64,      // 0x50
    pub lr: u64,      // 0x58
    pub sp: u64,      // 0x60
    pub d: [u64; 8],  // 0x68 d8..d15
}

/// Prepare `regs` so that switching to it runs `entry(arg)` on the stack
/// ending at `stack_top`.
///
/// # Safety
///
/// `regs` must be valid for writes and `stack_top` must be the top of a
/// mapped, writable stack that outlives the context.
pub unsafe fn init_context(regs: *mut SavedRegs, stack_top: *mut u8, entry: ContextEntry, arg: usize) {
    let regs = &mut *regs;
    *regs = SavedRegs::default();
    regs.sp = ((stack_top as usize) & !0xF) as u64;
    regs.lr = context_trampoline as usize as u64;
    regs.x[0] = entry as usize as u64; // x19
    regs.x[1] = arg as u64; // x20
}

#[unsafe(naked)]
unsafe extern "C" fn context_trampoline() {
    naked_asm!(
        "mov x0, x20",
        "blr x19",
        // entry is `-> !`
        "brk #0",
    );
}

/// Save the running context into `from` and resume `to`.
///
/// # Safety
///
/// Same contract as the x86_64 backend.
#[unsafe(naked)]
pub unsafe extern "C" fn switch_context(_from: *mut SavedRegs, _to: *const SavedRegs) {
    naked_asm!(
        "stp x19, x20, [x0, #0x00]",
        "stp x21, x22, [x0, #0x10]",
        "stp x23, x24, [x0, #0x20]",
        "stp x25, x26, [x0, #0x30]",
        "stp x27, x28, [x0, #0x40]",
        "stp x29, x30, [x0, #0x50]",
        "mov x9, sp",
        "str x9, [x0, #0x60]",
        "stp d8, d9, [x0, #0x68]",
        "stp d10, d11, [x0, #0x78]",
        "stp d12, d13, [x0, #0x88]",
        "stp d14, d15, [x0, #0x98]",
        "ldp x19, x20, [x1, #0x00]",
        "ldp x21, x22, [x1, #0x10]",
        "ldp x23, x24, [x1, #0x20]",
        "ldp x25, x26, [x1, #0x30]",
        "ldp x27, x28, [x1, #0x40]",
        "ldp x29, x30, [x1, #0x50]",
        "ldr x9, [x1, #0x60]",
        "mov sp, x9",
        "ldp d8, d9, [x1, #0x68]",
        "ldp d10, d11, [x1, #0x78]",
        "ldp d12, d13, [x1, #0x88]",
        "ldp d14, d15, [x1, #0x98]",
        // lr is either our caller or the trampoline
        "ret",
    );
}
