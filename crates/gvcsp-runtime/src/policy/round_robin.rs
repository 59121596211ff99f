//! Strict FIFO, no cross-worker stealing

use std::collections::VecDeque;

use super::SchedulingPolicy;
use crate::config::PolicyKind;

pub struct RoundRobin<T> {
    queue: VecDeque<T>,
}

impl<T> RoundRobin<T> {
    pub fn new() -> Self {
        Self { queue: VecDeque::new() }
    }
}

impl<T> Default for RoundRobin<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> SchedulingPolicy<T> for RoundRobin<T> {
    #[inline]
    fn enqueue(&mut self, item: T) {
        self.queue.push_back(item);
    }

    #[inline]
    fn pick_next(&mut self) -> Option<T> {
        self.queue.pop_front()
    }

    fn has_ready(&self) -> bool {
        !self.queue.is_empty()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::RoundRobin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut rr = RoundRobin::new();
        for i in 0..5 {
            rr.enqueue(i);
        }
        // a yielded item goes behind everything already queued
        let first = rr.pick_next().unwrap();
        rr.enqueue(first);
        let order: Vec<_> = std::iter::from_fn(|| rr.pick_next()).collect();
        assert_eq!(order, vec![1, 2, 3, 4, 0]);
        assert!(!rr.has_ready());
        assert!(!rr.shares_work());
    }
}
