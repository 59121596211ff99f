//! Ready-queue policies
//!
//! Each worker owns exactly one policy instance and is the only thread that
//! enqueues into it or picks from it. Work stealing reaches into peers only
//! through their `Stealer` handles.

mod round_robin;
mod work_stealing;

pub use round_robin::RoundRobin;
pub use work_stealing::WorkStealing;

use crate::config::PolicyKind;

pub trait SchedulingPolicy<T>: Send {
    /// Append a runnable item at the tail.
    fn enqueue(&mut self, item: T);

    /// Next item to run: local head first, then (if supported) a steal.
    fn pick_next(&mut self) -> Option<T>;

    /// Whether the local queue holds anything.
    fn has_ready(&self) -> bool;

    /// Local queue length.
    fn len(&self) -> usize;

    /// True when idle peers should be woken to take surplus work.
    fn shares_work(&self) -> bool {
        false
    }

    fn kind(&self) -> PolicyKind;
}

/// Build one policy per worker.
pub fn build<T: Send + 'static>(kind: PolicyKind, workers: usize) -> Vec<Box<dyn SchedulingPolicy<T>>> {
    match kind {
        PolicyKind::RoundRobin => (0..workers)
            .map(|_| Box::new(RoundRobin::new()) as Box<dyn SchedulingPolicy<T>>)
            .collect(),
        PolicyKind::WorkStealing => WorkStealing::group(workers)
            .into_iter()
            .map(|p| Box::new(p) as Box<dyn SchedulingPolicy<T>>)
            .collect(),
    }
}
