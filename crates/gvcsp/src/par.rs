//! Fork-join over the task API
//!
//! `Par` spawns one task per job and blocks the caller until every one of
//! them has terminated. It only uses `spawn` and `join`; the children are
//! scheduled like any other task. A failing child aborts the process like
//! any task panic, so there is nothing to cancel.

use gvcsp_core::TaskArgs;
use gvcsp_runtime::{Ctx, TaskHandle};
use tracing::debug;

type Job = Box<dyn FnOnce(&Ctx) + Send + 'static>;

/// A group of jobs run in parallel by `run`.
#[derive(Default)]
pub struct Par {
    jobs: Vec<Job>,
}

impl Par {
    pub fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    pub fn spawn<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&Ctx) + Send + 'static,
    {
        self.jobs.push(Box::new(f));
        self
    }

    pub fn spawn_with(self, f: fn(&Ctx, &TaskArgs), args: TaskArgs) -> Self {
        self.spawn(move |cx| f(cx, &args))
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Spawn every job, then join them in order. Returns immediately for an
    /// empty group.
    pub fn run(self, cx: &Ctx) {
        if self.jobs.is_empty() {
            return;
        }
        let n = self.jobs.len();
        let handles: Vec<TaskHandle> = self.jobs.into_iter().map(|job| cx.spawn(job)).collect();
        for h in &handles {
            cx.join(h);
        }
        debug!(task = %cx.id(), jobs = n, "par joined");
    }
}

impl<F> FromIterator<F> for Par
where
    F: FnOnce(&Ctx) + Send + 'static,
{
    fn from_iter<I: IntoIterator<Item = F>>(iter: I) -> Self {
        iter.into_iter().fold(Par::new(), Par::spawn)
    }
}

/// Run every job of `jobs` as its own task and wait for all of them.
pub fn par<I, F>(cx: &Ctx, jobs: I)
where
    I: IntoIterator<Item = F>,
    F: FnOnce(&Ctx) + Send + 'static,
{
    jobs.into_iter().collect::<Par>().run(cx);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_counts_jobs() {
        fn noop(_: &Ctx, _: &TaskArgs) {}
        let p = Par::new()
            .spawn(|_| {})
            .spawn_with(noop, TaskArgs::new().with(1).with(2));
        assert_eq!(p.len(), 2);
        assert!(!p.is_empty());
        assert!(Par::new().is_empty());
    }

    #[test]
    fn test_collect_from_iter() {
        let p: Par = (0..4).map(|_| |_: &Ctx| {}).collect();
        assert_eq!(p.len(), 4);
    }
}
