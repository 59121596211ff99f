//! Per-worker deques with batch stealing
//!
//! The owner pushes at the tail and pops the head of its own FIFO deque
//! without cross-thread synchronization. When it runs dry it steals half
//! of a peer's deque, starting from a pseudo-random victim.

use crossbeam_deque::{Steal, Stealer, Worker};

use super::SchedulingPolicy;
use crate::config::PolicyKind;

pub struct WorkStealing<T> {
    local: Worker<T>,
    peers: Vec<Stealer<T>>,
    seed: u32,
}

impl<T> WorkStealing<T> {
    /// One policy per worker; each sees every other worker as a peer.
    pub fn group(workers: usize) -> Vec<Self> {
        let locals: Vec<Worker<T>> = (0..workers).map(|_| Worker::new_fifo()).collect();
        let stealers: Vec<Stealer<T>> = locals.iter().map(Worker::stealer).collect();

        locals
            .into_iter()
            .enumerate()
            .map(|(i, local)| {
                let peers = stealers
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != i)
                    .map(|(_, s)| s.clone())
                    .collect();
                Self {
                    local,
                    peers,
                    seed: (i as u32).wrapping_mul(0x9E37_79B9) | 1,
                }
            })
            .collect()
    }

    #[inline]
    fn next_victim(&mut self) -> usize {
        // xorshift32
        let mut x = self.seed;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.seed = x;
        x as usize % self.peers.len()
    }

    fn steal(&mut self) -> Option<T> {
        if self.peers.is_empty() {
            return None;
        }
        let start = self.next_victim();
        for k in 0..self.peers.len() {
            let victim = &self.peers[(start + k) % self.peers.len()];
            loop {
                match victim.steal_batch_and_pop(&self.local) {
                    Steal::Success(item) => return Some(item),
                    Steal::Empty => break,
                    Steal::Retry => std::hint::spin_loop(),
                }
            }
        }
        None
    }
}

impl<T: Send> SchedulingPolicy<T> for WorkStealing<T> {
    #[inline]
    fn enqueue(&mut self, item: T) {
        self.local.push(item);
    }

    fn pick_next(&mut self) -> Option<T> {
        self.local.pop().or_else(|| self.steal())
    }

    fn has_ready(&self) -> bool {
        !self.local.is_empty()
    }

    fn len(&self) -> usize {
        self.local.len()
    }

    fn shares_work(&self) -> bool {
        !self.peers.is_empty()
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::WorkStealing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_fifo() {
        let mut ws = WorkStealing::group(1).pop().unwrap();
        ws.enqueue(1);
        ws.enqueue(2);
        assert_eq!(ws.pick_next(), Some(1));
        assert_eq!(ws.pick_next(), Some(2));
        assert_eq!(ws.pick_next(), None);
        assert!(!ws.shares_work());
    }

    #[test]
    fn test_idle_worker_steals() {
        let mut group = WorkStealing::group(2);
        let mut thief = group.pop().unwrap();
        let mut owner = group.pop().unwrap();
        for i in 0..8 {
            owner.enqueue(i);
        }
        let stolen = thief.pick_next().unwrap();
        assert_eq!(stolen, 0);
        // the rest of the batch landed in the thief's deque
        let moved = thief.len();
        assert_eq!(moved + owner.len() + 1, 8);

        let mut all: Vec<_> = std::iter::once(stolen)
            .chain(std::iter::from_fn(|| thief.local.pop()))
            .chain(std::iter::from_fn(|| owner.local.pop()))
            .collect();
        all.sort();
        assert_eq!(all, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_steal_across_threads() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let mut group = WorkStealing::group(3);
        let mut owner = group.remove(0);
        for i in 0..3000usize {
            owner.enqueue(i);
        }
        let total = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = group
            .into_iter()
            .map(|mut thief| {
                let total = total.clone();
                std::thread::spawn(move || {
                    while let Some(v) = thief.pick_next() {
                        total.fetch_add(v + 1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        while let Some(v) = owner.pick_next() {
            total.fetch_add(v + 1, Ordering::Relaxed);
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(total.load(Ordering::Relaxed), 3000 * 3001 / 2);
    }
}
