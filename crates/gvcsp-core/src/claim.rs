//! Alt claim word
//!
//! Several parties race to complete a parked alt: writers on any of its
//! channels and the timer. Whoever moves the word from `(epoch, OPEN)` to
//! `(epoch, winner)` owns the wakeup; everyone else backs off. Stale
//! parties carry an old epoch and can never match.
//!
//! Layout: high 32 bits epoch, low 32 bits winner.

use core::sync::atomic::{AtomicU64, Ordering};

const OPEN: u32 = u32::MAX;
const TIMEOUT: u32 = u32::MAX - 1;

#[inline]
const fn pack(epoch: u32, winner: u32) -> u64 {
    ((epoch as u64) << 32) | winner as u64
}

#[inline]
const fn unpack(word: u64) -> (u32, u32) {
    ((word >> 32) as u32, word as u32)
}

/// Outcome of a claimed alt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Branch(u32),
    Timeout,
}

impl Winner {
    #[inline]
    const fn encode(self) -> u32 {
        match self {
            Winner::Branch(i) => i,
            Winner::Timeout => TIMEOUT,
        }
    }
}

/// Per-task claim word, reused by every alt the task runs
pub struct AltClaim {
    word: AtomicU64,
}

impl AltClaim {
    /// Epoch 0, already closed: nothing can claim until `begin`.
    pub const fn new() -> Self {
        Self { word: AtomicU64::new(pack(0, TIMEOUT)) }
    }

    /// Open a new epoch and return it.
    ///
    /// Only the owning task calls this, and only between alts.
    pub fn begin(&self) -> u32 {
        let (epoch, _) = unpack(self.word.load(Ordering::Acquire));
        let next = epoch.wrapping_add(1);
        self.word.store(pack(next, OPEN), Ordering::SeqCst);
        next
    }

    /// Single CAS from `(epoch, OPEN)` to `(epoch, winner)`.
    #[inline]
    pub fn try_claim(&self, epoch: u32, winner: Winner) -> bool {
        debug_assert!(!matches!(winner, Winner::Branch(i) if i >= TIMEOUT));
        self.word
            .compare_exchange(
                pack(epoch, OPEN),
                pack(epoch, winner.encode()),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Winner recorded for `epoch`, if that epoch has been claimed.
    pub fn winner(&self, epoch: u32) -> Option<Winner> {
        let (e, w) = unpack(self.word.load(Ordering::Acquire));
        if e != epoch {
            return None;
        }
        match w {
            OPEN => None,
            TIMEOUT => Some(Winner::Timeout),
            i => Some(Winner::Branch(i)),
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        unpack(self.word.load(Ordering::Acquire)).1 == OPEN
    }

    #[inline]
    pub fn epoch(&self) -> u32 {
        unpack(self.word.load(Ordering::Acquire)).0
    }
}

impl Default for AltClaim {
    fn default() -> Self {
        Self::new()
    }
}
