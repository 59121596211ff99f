//! Stack slot allocator
//!
//! Hands out indices into the stack arena. Freed indices go on a LIFO
//! stack so a recently released (still warm) slot is reused first; fresh
//! indices are taken from a bump counter only when the free stack is empty.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::error::{RuntimeError, RuntimeResult};
use crate::spinlock::SpinLock;

pub struct SlotAllocator {
    free: SpinLock<Vec<u32>>,
    next_fresh: AtomicU32,
    max_slots: u32,
    in_use: AtomicU32,
}

impl SlotAllocator {
    pub fn new(max_slots: u32) -> Self {
        Self {
            free: SpinLock::new(Vec::new()),
            next_fresh: AtomicU32::new(0),
            max_slots,
            in_use: AtomicU32::new(0),
        }
    }

    /// Take a slot index, or `NoStackSlots` when all are in use.
    pub fn allocate(&self) -> RuntimeResult<u32> {
        if let Some(slot) = self.free.lock().pop() {
            self.in_use.fetch_add(1, Ordering::Relaxed);
            return Ok(slot);
        }

        let mut current = self.next_fresh.load(Ordering::Acquire);
        loop {
            if current >= self.max_slots {
                return Err(RuntimeError::NoStackSlots);
            }
            match self.next_fresh.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.in_use.fetch_add(1, Ordering::Relaxed);
                    return Ok(current);
                }
                Err(seen) => current = seen,
            }
        }
    }

    /// Return a slot. Each index must be released exactly once per allocation.
    pub fn release(&self, slot: u32) {
        debug_assert!(slot < self.max_slots);
        let mut free = self.free.lock();
        debug_assert!(!free.contains(&slot), "slot {} released twice", slot);
        free.push(slot);
        self.in_use.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn in_use(&self) -> u32 {
        self.in_use.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn max_slots(&self) -> u32 {
        self.max_slots
    }

    /// Indices never handed out so far
    #[inline]
    pub fn fresh_remaining(&self) -> u32 {
        self.max_slots
            .saturating_sub(self.next_fresh.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fresh_then_exhausted() {
        let alloc = SlotAllocator::new(3);
        assert_eq!(alloc.allocate(), Ok(0));
        assert_eq!(alloc.allocate(), Ok(1));
        assert_eq!(alloc.allocate(), Ok(2));
        assert_eq!(alloc.allocate(), Err(RuntimeError::NoStackSlots));
        assert_eq!(alloc.in_use(), 3);
        assert_eq!(alloc.fresh_remaining(), 0);
    }

    #[test]
    fn test_reuse_is_lifo() {
        let alloc = SlotAllocator::new(8);
        let a = alloc.allocate().unwrap();
        let b = alloc.allocate().unwrap();
        alloc.release(a);
        alloc.release(b);
        assert_eq!(alloc.allocate().unwrap(), b);
        assert_eq!(alloc.allocate().unwrap(), a);
        assert_eq!(alloc.in_use(), 2);
    }

    #[test]
    fn test_concurrent_allocations_are_distinct() {
        let alloc = Arc::new(SlotAllocator::new(4000));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let alloc = alloc.clone();
                thread::spawn(move || (0..1000).map(|_| alloc.allocate().unwrap()).collect::<Vec<_>>())
            })
            .collect();
        let mut seen = HashSet::new();
        for h in handles {
            for slot in h.join().unwrap() {
                assert!(seen.insert(slot));
            }
        }
        assert_eq!(seen.len(), 4000);
        assert_eq!(alloc.allocate(), Err(RuntimeError::NoStackSlots));
    }
}
