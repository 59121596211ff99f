//! Stack arena
//!
//! One virtual reservation holds every task stack as a fixed-size slot:
//!
//! ```text
//! slot i:  [ guard page (PROT_NONE) | stack (RW) ........ ]  <- top
//! ```
//!
//! Stacks grow down into their own guard page, so an overflow faults
//! instead of running into a neighbour. Stacks are handed out and
//! returned by slot index; nothing outside the arena keeps a stack
//! address past `release`.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        use unix as sys;
    } else {
        compile_error!("gvcsp stack arena requires a unix platform");
    }
}

use gvcsp_core::constants::GUARD_SIZE;
use gvcsp_core::{MemoryError, RuntimeResult, SlotAllocator};

/// A stack slot checked out of the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stack {
    pub slot: u32,
    pub top: *mut u8,
}

unsafe impl Send for Stack {}
unsafe impl Sync for Stack {}

pub struct StackArena {
    base: *mut u8,
    total_size: usize,
    slot_size: usize,
    stack_size: usize,
    slots: SlotAllocator,
}

// The arena only hands out disjoint slots; the base pointer is never
// dereferenced by the arena itself.
unsafe impl Send for StackArena {}
unsafe impl Sync for StackArena {}

impl StackArena {
    /// Reserve `slots` stacks of at least `stack_size` bytes each.
    pub fn new(slots: u32, stack_size: usize) -> Result<Self, MemoryError> {
        let page = sys::page_size();
        let stack_size = stack_size.div_ceil(page) * page;
        let guard = GUARD_SIZE.div_ceil(page) * page;
        let slot_size = guard + stack_size;
        let total_size = (slots as usize)
            .checked_mul(slot_size)
            .ok_or(MemoryError::TooManySlots)?;

        let base = sys::reserve(total_size)?;
        tracing::debug!(slots, stack_size, total_size, "stack arena reserved");

        Ok(Self {
            base,
            total_size,
            slot_size,
            stack_size,
            slots: SlotAllocator::new(slots),
        })
    }

    #[inline]
    fn slot_base(&self, slot: u32) -> *mut u8 {
        debug_assert!(slot < self.slots.max_slots());
        unsafe { self.base.add(slot as usize * self.slot_size) }
    }

    /// Check out a stack; `NoStackSlots` when every slot is in use.
    pub fn allocate(&self) -> RuntimeResult<Stack> {
        let slot = self.slots.allocate()?;
        let top = unsafe { self.slot_base(slot).add(self.slot_size) };
        let bottom = unsafe { top.sub(self.stack_size) };
        if let Err(e) = sys::make_accessible(bottom, self.stack_size) {
            self.slots.release(slot);
            return Err(e.into());
        }
        Ok(Stack { slot, top })
    }

    /// Return a stack. Its pages are dropped; the mapping stays so the slot
    /// can be reused without another mprotect.
    pub fn release(&self, slot: u32) {
        let bottom = unsafe { self.slot_base(slot).add(self.slot_size - self.stack_size) };
        if let Err(e) = sys::discard(bottom, self.stack_size) {
            tracing::warn!(slot, error = %e, "failed to discard stack pages");
        }
        self.slots.release(slot);
    }

    #[inline]
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    #[inline]
    pub fn in_use(&self) -> u32 {
        self.slots.in_use()
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.slots.max_slots()
    }
}

impl Drop for StackArena {
    fn drop(&mut self) {
        if let Err(e) = sys::unreserve(self.base, self.total_size) {
            tracing::warn!(error = %e, "failed to unmap stack arena");
        }
    }
}
