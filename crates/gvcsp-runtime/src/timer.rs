//! Deadline-ordered queues
//!
//! Each worker keeps two: plain sleepers, and alt-parked tasks with a
//! deadline. Entries are keyed by `(deadline, seq)` so equal deadlines stay
//! in insertion order and any entry can be removed by key.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimerKey {
    pub deadline: Instant,
    seq: u64,
}

pub struct TimerQueue<T> {
    entries: BTreeMap<TimerKey, T>,
    seq: u64,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self { entries: BTreeMap::new(), seq: 0 }
    }

    pub fn insert(&mut self, deadline: Instant, item: T) -> TimerKey {
        let key = TimerKey { deadline, seq: self.seq };
        self.seq += 1;
        self.entries.insert(key, item);
        key
    }

    pub fn remove(&mut self, key: TimerKey) -> Option<T> {
        self.entries.remove(&key)
    }

    /// Pop the earliest entry if its deadline is at or before `now`.
    pub fn pop_expired(&mut self, now: Instant) -> Option<T> {
        let entry = self.entries.first_entry()?;
        if entry.key().deadline > now {
            return None;
        }
        Some(entry.remove())
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.keys().next().map(|k| k.deadline)
    }

    /// Time until the earliest deadline, zero if already due.
    pub fn time_until_next(&self, now: Instant) -> Option<Duration> {
        self.next_deadline().map(|d| d.saturating_duration_since(now))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pops_in_deadline_order() {
        let base = Instant::now();
        let mut q = TimerQueue::new();
        q.insert(base + Duration::from_millis(30), "c");
        q.insert(base + Duration::from_millis(10), "a");
        q.insert(base + Duration::from_millis(20), "b");

        assert_eq!(q.next_deadline(), Some(base + Duration::from_millis(10)));
        assert_eq!(q.pop_expired(base), None);

        let now = base + Duration::from_millis(25);
        assert_eq!(q.pop_expired(now), Some("a"));
        assert_eq!(q.pop_expired(now), Some("b"));
        // stops at the first future deadline
        assert_eq!(q.pop_expired(now), None);
        assert_eq!(q.len(), 1);
        assert_eq!(q.time_until_next(now), Some(Duration::from_millis(5)));
    }

    #[test]
    fn test_equal_deadlines_keep_insertion_order() {
        let at = Instant::now();
        let mut q = TimerQueue::new();
        for i in 0..4 {
            q.insert(at, i);
        }
        let order: Vec<_> = std::iter::from_fn(|| q.pop_expired(at)).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_remove_by_key() {
        let at = Instant::now();
        let mut q = TimerQueue::new();
        let k1 = q.insert(at, 1);
        let _k2 = q.insert(at, 2);
        assert_eq!(q.remove(k1), Some(1));
        assert_eq!(q.remove(k1), None);
        assert_eq!(q.pop_expired(at), Some(2));
        assert!(q.is_empty());
    }
}
