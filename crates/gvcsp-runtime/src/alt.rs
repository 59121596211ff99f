//! Alt: wait on several channel reads and an optional deadline
//!
//! ```rust,ignore
//! let mut a = 0u64;
//! let mut b = 0u64;
//! match Alt::new()
//!     .recv(&c1, &mut a)
//!     .recv(&c2, &mut b)
//!     .timeout(Duration::from_millis(50))
//!     .select(cx)
//! {
//!     Selected::Branch(0) => println!("c1: {a}"),
//!     Selected::Branch(_) => println!("c2: {b}"),
//!     Selected::Timeout => println!("timed out"),
//! }
//! ```
//!
//! Every way an alt can resolve (a branch enabling against a pending
//! writer, a writer completing a registered guard, the deadline) goes
//! through one CAS on the task's claim word, so exactly one of them
//! transfers data and wakes the task.

use std::marker::PhantomData;
use std::time::{Duration, Instant};

use gvcsp_core::{Location, Winner};
use tracing::trace;

use crate::channel::{Chan, Enable, RawChan};
use crate::runtime::Ctx;
use crate::scheduler;
use crate::timer::TimerKey;
use crate::worker::{with_worker, AltTimer};

/// Result of `Alt::select`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selected {
    /// Index of the branch that received, in the order branches were added
    Branch(usize),
    Timeout,
}

impl Selected {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Selected::Timeout)
    }

    pub fn branch(&self) -> Option<usize> {
        match *self {
            Selected::Branch(i) => Some(i),
            Selected::Timeout => None,
        }
    }
}

struct Branch<'a> {
    chan: &'a RawChan,
    buf: *mut u8,
    _buf: PhantomData<&'a mut [u8]>,
}

/// A one-shot selection over channel reads.
pub struct Alt<'a> {
    branches: Vec<Branch<'a>>,
    deadline: Option<Instant>,
}

impl<'a> Alt<'a> {
    pub fn new() -> Self {
        Self { branches: Vec::new(), deadline: None }
    }

    /// Add a branch reading `chan` into `buf`.
    pub fn read(mut self, chan: &'a RawChan, buf: &'a mut [u8]) -> Self {
        chan.assert_payload(buf.len());
        self.branches.push(Branch {
            chan,
            buf: buf.as_mut_ptr(),
            _buf: PhantomData,
        });
        self
    }

    /// Add a branch reading a typed channel into `slot`.
    pub fn recv<T: Copy + Send + 'static>(mut self, chan: &'a Chan<T>, slot: &'a mut T) -> Self {
        self.branches.push(Branch {
            chan: chan.raw(),
            buf: slot as *mut T as *mut u8,
            _buf: PhantomData,
        });
        self
    }

    pub fn deadline(mut self, at: Instant) -> Self {
        self.deadline = Some(at);
        self
    }

    /// Deadline `after` from now. One too far out to represent leaves the
    /// alt without a deadline.
    pub fn timeout(mut self, after: Duration) -> Self {
        self.deadline = Instant::now().checked_add(after);
        self
    }

    /// Block until one branch receives or the deadline passes.
    ///
    /// Panics when there is neither a branch nor a deadline.
    pub fn select(self, cx: &Ctx) -> Selected {
        assert!(
            !self.branches.is_empty() || self.deadline.is_some(),
            "alt needs at least one branch or a deadline"
        );
        let task = cx.task();
        let epoch = task.claim.begin();
        task.prepare_park(Location::AltParked { deadline: self.deadline });

        let mut enabled = 0;
        let mut outcome = Enable::Registered;
        for (i, b) in self.branches.iter().enumerate() {
            outcome = unsafe { b.chan.alt_enable(cx, epoch, i as u32, b.buf) };
            if outcome != Enable::Registered {
                break;
            }
            enabled = i + 1;
        }

        let mut timer: Option<(usize, TimerKey)> = None;
        match outcome {
            Enable::Fired => task.cancel_park(),
            Enable::Lost => scheduler::park(task),
            Enable::Registered => match self.deadline {
                Some(at) if at <= Instant::now() => {
                    if task.claim.try_claim(epoch, Winner::Timeout) {
                        task.cancel_park();
                    } else {
                        // a writer won in the meantime; its wakeup is on the way
                        scheduler::park(task);
                    }
                }
                Some(at) => {
                    timer = Some(with_worker(|w| {
                        let key = w.alt_sleepers.borrow_mut().insert(
                            at,
                            AltTimer { task: task.clone(), epoch },
                        );
                        (w.id, key)
                    }));
                    scheduler::park(task);
                }
                None => scheduler::park(task),
            },
        }

        for (i, b) in self.branches[..enabled].iter().enumerate() {
            b.chan.alt_disable(cx, epoch, i as u32);
        }
        if let Some((worker, key)) = timer {
            cx.rt().cancel_alt_timer(worker, key);
        }

        let selected = match task.claim.winner(epoch) {
            Some(Winner::Branch(i)) => Selected::Branch(i as usize),
            Some(Winner::Timeout) => Selected::Timeout,
            None => panic!("task {}: alt resumed without a winner", task.id()),
        };
        trace!(task = %task.id(), ?selected, "alt resolved");
        selected
    }
}

impl Default for Alt<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::{PolicyKind, RuntimeConfig};
    use crate::runtime::Runtime;

    fn runtime() -> Runtime {
        Runtime::new(
            RuntimeConfig::new()
                .num_workers(1)
                .max_tasks(32)
                .pin_workers(false),
        )
        .unwrap()
    }

    #[test]
    fn test_pending_writer_fires_immediately() {
        let rt = runtime();
        let (sel, v) = rt.block_on(|cx| {
            let c1 = Chan::<u32>::new();
            let c2 = Chan::<u32>::new();
            let tx = c2.clone();
            cx.spawn(move |cx| tx.write(cx, 7));
            cx.yield_now();
            assert_eq!(c2.raw().pending_writers(), 1);

            let (mut a, mut b) = (0u32, 0u32);
            let sel = Alt::new().recv(&c1, &mut a).recv(&c2, &mut b).select(cx);
            // the branch before the winner was registered and then removed
            assert_eq!(c1.raw().pending_guards(), 0);
            (sel, b)
        });
        assert_eq!(sel, Selected::Branch(1));
        assert_eq!(v, 7);
    }

    #[test]
    fn test_deadline_only() {
        let rt = runtime();
        let elapsed = rt.block_on(|cx| {
            let start = Instant::now();
            let sel = Alt::new().timeout(Duration::from_millis(20)).select(cx);
            assert!(sel.is_timeout());
            start.elapsed()
        });
        assert!(elapsed >= Duration::from_millis(20));
    }

    #[test]
    fn test_past_deadline_times_out_without_parking() {
        let rt = runtime();
        let sel = rt.block_on(|cx| {
            let c = RawChan::new(4);
            let mut buf = [0u8; 4];
            let sel = Alt::new().read(&c, &mut buf).deadline(Instant::now()).select(cx);
            assert_eq!(c.pending_guards(), 0);
            sel
        });
        assert_eq!(sel, Selected::Timeout);
    }

    #[test]
    fn test_writer_completes_registered_guard() {
        let rt = runtime();
        let got = rt.block_on(|cx| {
            let c = Chan::<u64>::new();
            let tx = c.clone();
            cx.spawn(move |cx| {
                cx.yield_now();
                tx.write(cx, 99);
            });
            let mut v = 0u64;
            let sel = Alt::new().recv(&c, &mut v).select(cx);
            assert_eq!(sel, Selected::Branch(0));
            assert_eq!(c.raw().pending_guards(), 0);
            v
        });
        assert_eq!(got, 99);
    }

    #[test]
    fn test_huge_timeout_waits_without_deadline() {
        let rt = runtime();
        let (sel, v) = rt.block_on(|cx| {
            let c = Chan::<u16>::new();
            let tx = c.clone();
            cx.spawn(move |cx| {
                cx.yield_now();
                tx.write(cx, 5);
            });
            let mut v = 0u16;
            let sel = Alt::new().recv(&c, &mut v).timeout(Duration::MAX).select(cx);
            (sel, v)
        });
        assert_eq!(sel, Selected::Branch(0));
        assert_eq!(v, 5);
    }

    #[test]
    fn test_resolved_alt_leaves_no_timer_behind() {
        // Waiters may be stolen while parked, so many of them resume on a
        // worker other than the one holding their alt-sleep entry.
        const TASKS: usize = 200;
        let rt = Runtime::new(
            RuntimeConfig::new()
                .num_workers(4)
                .policy(PolicyKind::WorkStealing)
                .max_tasks(2 * TASKS + 8)
                .pin_workers(false),
        )
        .unwrap();
        let tasks = rt.block_on(|cx| {
            let mut tasks = Vec::new();
            let mut handles = Vec::new();
            for _ in 0..TASKS {
                let c = Chan::<u64>::new();
                let rx = c.clone();
                let waiter = cx.spawn(move |cx| {
                    let mut v = 0u64;
                    Alt::new()
                        .recv(&rx, &mut v)
                        .timeout(Duration::from_secs(30))
                        .select(cx);
                });
                tasks.push(Arc::downgrade(waiter.task()));
                handles.push(waiter);
                handles.push(cx.spawn(move |cx| c.write(cx, 1)));
            }
            for h in &handles {
                cx.join(h);
            }
            tasks
        });

        // workers drop their references on their next loop pass
        let start = Instant::now();
        let mut referenced = TASKS;
        while start.elapsed() < Duration::from_secs(2) {
            referenced = tasks.iter().filter(|t| t.strong_count() > 0).count();
            if referenced == 0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(referenced, 0);
    }
}
