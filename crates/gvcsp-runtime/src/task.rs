//! Task records
//!
//! A task is shared (`Arc`) between its handles, the queue it sits on, and
//! the worker running it. Its saved registers are only touched by the one
//! thread switching into or out of it; the park word decides who that is.
//!
//! Park word:
//!
//! ```text
//! RUNNING --prepare_park--> PARKING --loop after switch--> PARKED
//!                              |                             |
//!                        wake: NOTIFIED                wake: RUNNING + schedule
//!                              |
//!                  loop after switch: RUNNING + enqueue
//! ```
//!
//! Whichever side moves last enqueues the task, so it is resumed exactly
//! once per wakeup and never before its context has been saved.

use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use gvcsp_core::state::IllegalTransition;
use gvcsp_core::{AltClaim, Location, SpinLock, TaskId, TaskState};

use crate::arch::SavedRegs;
use crate::runtime::Ctx;

pub(crate) type TaskRef = Arc<Task>;
pub(crate) type TaskBody = Box<dyn FnOnce(&Ctx) + Send + 'static>;

const RUNNING: u8 = 0;
const PARKING: u8 = 1;
const PARKED: u8 = 2;
const NOTIFIED: u8 = 3;

#[derive(Default)]
struct JoinState {
    done: bool,
    waiters: Vec<TaskRef>,
}

pub(crate) struct Task {
    id: TaskId,
    slot: u32,
    regs: UnsafeCell<SavedRegs>,
    body: SpinLock<Option<TaskBody>>,
    park: AtomicU8,
    owner: AtomicUsize,
    location: SpinLock<Location>,
    join: SpinLock<JoinState>,
    pub(crate) claim: AltClaim,
}

// `regs` is only accessed by the thread that holds the task per the park
// handshake; everything else is atomic or behind a lock.
unsafe impl Send for Task {}
unsafe impl Sync for Task {}

impl Task {
    pub(crate) fn new(slot: u32, owner: usize, body: TaskBody) -> Self {
        Self {
            id: TaskId::next(),
            slot,
            regs: UnsafeCell::new(SavedRegs::default()),
            body: SpinLock::new(Some(body)),
            park: AtomicU8::new(RUNNING),
            owner: AtomicUsize::new(owner),
            location: SpinLock::new(Location::Unscheduled),
            join: SpinLock::new(JoinState::default()),
            claim: AltClaim::new(),
        }
    }

    /// Rebuild a counted reference from the address handed to the entry
    /// trampoline.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `Arc::as_ptr` of a task that is still alive.
    pub(crate) unsafe fn clone_from_raw(ptr: *const Task) -> TaskRef {
        Arc::increment_strong_count(ptr);
        Arc::from_raw(ptr)
    }

    #[inline]
    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    #[inline]
    pub(crate) fn slot(&self) -> u32 {
        self.slot
    }

    #[inline]
    pub(crate) fn regs_ptr(&self) -> *mut SavedRegs {
        self.regs.get()
    }

    #[inline]
    pub(crate) fn owner(&self) -> usize {
        self.owner.load(Ordering::Acquire)
    }

    pub(crate) fn take_body(&self) -> Option<TaskBody> {
        self.body.lock().take()
    }

    pub(crate) fn location(&self) -> Location {
        *self.location.lock()
    }

    pub(crate) fn state(&self) -> TaskState {
        self.location().state()
    }

    /// Checked location change; an illegal move is fatal.
    pub(crate) fn move_to(&self, next: Location) -> Location {
        match self.location.with(|loc| loc.transition(next)) {
            Ok(prev) => prev,
            Err(e) => self.fatal(e),
        }
    }

    #[cold]
    fn fatal(&self, e: IllegalTransition) -> ! {
        tracing::error!(task = %self.id, from = ?e.from, to = ?e.to, "illegal task transition");
        panic!("task {}: {}", self.id, e)
    }

    /// Ready -> Running on `worker`. Anything but a ready task is fatal.
    pub(crate) fn begin_run(&self, worker: usize) {
        let moved = self.location.with(|loc| match *loc {
            Location::Ready => loc.transition(Location::Running),
            other => Err(IllegalTransition { from: other, to: Location::Running }),
        });
        if let Err(e) = moved {
            self.fatal(e);
        }
        self.owner.store(worker, Ordering::Release);
        debug_assert_eq!(self.park.load(Ordering::Acquire), RUNNING);
    }

    /// Announce an imminent park. Must happen before the task becomes
    /// reachable by any waker.
    pub(crate) fn prepare_park(&self, at: Location) {
        self.park.store(PARKING, Ordering::SeqCst);
        self.move_to(at);
    }

    /// Undo `prepare_park` when an alt resolved itself before parking.
    pub(crate) fn cancel_park(&self) {
        if self
            .park
            .compare_exchange(PARKING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            panic!("task {}: park cancelled after a wakeup", self.id);
        }
        self.move_to(Location::Running);
    }

    /// Called by the loop after the task switched out to park.
    /// Returns `true` when a wakeup already arrived and the caller must
    /// enqueue the task.
    pub(crate) fn settle_park(&self) -> bool {
        match self
            .park
            .compare_exchange(PARKING, PARKED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => false,
            Err(NOTIFIED) => {
                self.park.store(RUNNING, Ordering::Release);
                true
            }
            Err(other) => panic!("task {}: parked with park word {}", self.id, other),
        }
    }

    /// Blocked -> Ready. Returns `true` when the caller must schedule the
    /// task; `false` when the parking loop will do it.
    pub(crate) fn wake(&self) -> bool {
        self.move_to(Location::Ready);
        loop {
            match self.park.load(Ordering::Acquire) {
                PARKING => {
                    if self
                        .park
                        .compare_exchange(PARKING, NOTIFIED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return false;
                    }
                }
                PARKED => {
                    if self
                        .park
                        .compare_exchange(PARKED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return true;
                    }
                }
                other => panic!("task {}: woken with park word {}", self.id, other),
            }
        }
    }

    /// Register `waiter` on this task's join list unless already terminated.
    /// On success the waiter has been prepared to park.
    pub(crate) fn add_joiner(&self, waiter: &TaskRef) -> bool {
        let mut join = self.join.lock();
        if join.done {
            return false;
        }
        waiter.prepare_park(Location::Joining { target: self.id });
        join.waiters.push(waiter.clone());
        true
    }

    /// Mark terminated and hand back everyone blocked in `join`.
    pub(crate) fn finish_join(&self) -> Vec<TaskRef> {
        let mut join = self.join.lock();
        join.done = true;
        std::mem::take(&mut join.waiters)
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.join.lock().done
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("slot", &self.slot)
            .field("location", &self.location())
            .finish()
    }
}

/// Handle to a spawned task, used to join it.
#[derive(Clone)]
pub struct TaskHandle {
    task: TaskRef,
}

impl TaskHandle {
    pub(crate) fn new(task: TaskRef) -> Self {
        Self { task }
    }

    pub(crate) fn task(&self) -> &TaskRef {
        &self.task
    }

    pub fn id(&self) -> TaskId {
        self.task.id()
    }

    pub fn is_terminated(&self) -> bool {
        self.task.is_terminated()
    }

    pub fn state(&self) -> TaskState {
        self.task.state()
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskHandle").field(&self.task.id()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> TaskRef {
        Arc::new(Task::new(0, 0, Box::new(|_: &Ctx| {})))
    }

    fn run(t: &Task) {
        t.move_to(Location::Ready);
        t.begin_run(0);
    }

    #[test]
    fn test_wake_before_settle_is_notified() {
        let t = task();
        run(&t);
        t.prepare_park(Location::ChannelWait);
        // waker got there before the loop
        assert!(!t.wake());
        assert!(t.settle_park());
        assert_eq!(t.location(), Location::Ready);
        t.begin_run(0);
    }

    #[test]
    fn test_wake_after_settle_schedules() {
        let t = task();
        run(&t);
        t.prepare_park(Location::ChannelWait);
        assert!(!t.settle_park());
        assert!(t.wake());
        assert_eq!(t.state(), TaskState::Ready);
    }

    #[test]
    #[should_panic(expected = "illegal task transition")]
    fn test_double_wake_is_fatal() {
        let t = task();
        run(&t);
        t.prepare_park(Location::ChannelWait);
        t.settle_park();
        t.wake();
        t.wake();
    }

    #[test]
    #[should_panic(expected = "illegal task transition")]
    fn test_double_terminate_is_fatal() {
        let t = task();
        run(&t);
        t.move_to(Location::Terminated);
        t.move_to(Location::Terminated);
    }

    #[test]
    fn test_join_list() {
        let target = task();
        let waiter = task();
        run(&waiter);
        assert!(target.add_joiner(&waiter));
        assert_eq!(waiter.state(), TaskState::Waiting);

        let woken = target.finish_join();
        assert_eq!(woken.len(), 1);
        assert!(target.is_terminated());
        // late joiners do not park
        let late = task();
        assert!(!target.add_joiner(&late));
    }

    #[test]
    fn test_alt_cancel_park() {
        let t = task();
        run(&t);
        t.prepare_park(Location::AltParked { deadline: None });
        t.cancel_park();
        assert_eq!(t.location(), Location::Running);
    }
}
