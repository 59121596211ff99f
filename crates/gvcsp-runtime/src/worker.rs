//! Worker threads and the scheduling loop
//!
//! Every worker is an OS thread running one scheduler. The scheduler loop
//! runs on its own context (a stack slot from the arena), separate from
//! the thread's original stack; tasks always switch back to the loop,
//! never directly to each other.
//!
//! State split:
//! - `WorkerShared`: what other threads may touch (remote queue, alt timer
//!   cancellations, parker)
//! - `Worker`: thread-confined state, reachable from the running task
//!   through a thread-local pointer

use std::cell::{Cell, RefCell, UnsafeCell};
use std::ptr;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Instant;

use crossbeam_queue::SegQueue;
use gvcsp_core::{RuntimeResult, TaskId, Winner};
use tracing::{debug, trace};

use crate::affinity;
use crate::arch::{init_context, switch_context, SavedRegs};
use crate::parking::{new_parking, WorkerParking};
use crate::policy::SchedulingPolicy;
use crate::runtime::RuntimeInner;
use crate::scheduler::Switch;
use crate::task::TaskRef;
use crate::timer::{TimerKey, TimerQueue};

/// Cross-thread face of a worker
pub(crate) struct WorkerShared {
    /// Tasks submitted or woken by other threads
    pub(crate) remote: SegQueue<TaskRef>,
    /// Alt-sleep entries to drop, sent by alts that resumed elsewhere
    pub(crate) cancelled: SegQueue<TimerKey>,
    pub(crate) parker: Box<dyn WorkerParking>,
}

impl WorkerShared {
    pub(crate) fn new() -> Self {
        Self {
            remote: SegQueue::new(),
            cancelled: SegQueue::new(),
            parker: new_parking(),
        }
    }
}

/// Alt-sleep entry: fires only if it wins the claim for `epoch`
pub(crate) struct AltTimer {
    pub(crate) task: TaskRef,
    pub(crate) epoch: u32,
}

pub(crate) struct Worker {
    pub(crate) id: usize,
    pub(crate) rt: Arc<RuntimeInner>,
    policy: RefCell<Box<dyn SchedulingPolicy<TaskRef>>>,
    pub(crate) sleepers: RefCell<TimerQueue<TaskRef>>,
    pub(crate) alt_sleepers: RefCell<TimerQueue<AltTimer>>,
    terminated: RefCell<Vec<TaskRef>>,
    running: Cell<TaskId>,
    switch: Cell<Switch>,
    loop_regs: UnsafeCell<SavedRegs>,
    origin_regs: UnsafeCell<SavedRegs>,
}

thread_local! {
    static CURRENT: Cell<*const Worker> = const { Cell::new(ptr::null()) };
}

// Tasks migrate between threads across a context switch; keep the TLS
// lookup out of line so its address is never reused after a switch.
#[inline(never)]
fn current_ptr() -> *const Worker {
    CURRENT.with(|c| c.get())
}

#[inline(never)]
fn set_current(worker: *const Worker) {
    CURRENT.with(|c| c.set(worker));
}

/// Run `f` with the worker owning this thread, if any. The reference must
/// not be held across a context switch.
pub(crate) fn with_current<R>(f: impl FnOnce(Option<&Worker>) -> R) -> R {
    let worker = current_ptr();
    f(unsafe { worker.as_ref() })
}

/// Like `with_current`, for code that only runs on worker threads.
pub(crate) fn with_worker<R>(f: impl FnOnce(&Worker) -> R) -> R {
    with_current(|w| match w {
        Some(w) => f(w),
        None => panic!("gvcsp task operation called outside a worker thread"),
    })
}

pub(crate) fn current_worker_id() -> Option<usize> {
    with_current(|w| w.map(|w| w.id))
}

/// Body of worker thread `id`: set up the loop context, report readiness,
/// run the loop until shutdown.
pub(crate) fn run_worker(
    rt: Arc<RuntimeInner>,
    id: usize,
    policy: Box<dyn SchedulingPolicy<TaskRef>>,
    ready: Sender<RuntimeResult<()>>,
) {
    if rt.config.pin_workers {
        affinity::pin_current_thread(id);
    }

    let loop_stack = match rt.arena.allocate() {
        Ok(stack) => stack,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let worker = Worker {
        id,
        rt: rt.clone(),
        policy: RefCell::new(policy),
        sleepers: RefCell::new(TimerQueue::new()),
        alt_sleepers: RefCell::new(TimerQueue::new()),
        terminated: RefCell::new(Vec::new()),
        running: Cell::new(TaskId::NONE),
        switch: Cell::new(Switch::Yield),
        loop_regs: UnsafeCell::new(SavedRegs::default()),
        origin_regs: UnsafeCell::new(SavedRegs::default()),
    };
    unsafe {
        init_context(
            worker.loop_regs.get(),
            loop_stack.top,
            loop_entry,
            &worker as *const Worker as usize,
        );
    }
    set_current(&worker);
    debug!(worker = id, policy = %worker.policy.borrow().kind(), "worker started");
    let _ = ready.send(Ok(()));
    drop(ready);

    unsafe { switch_context(worker.origin_regs.get(), worker.loop_regs.get()) };

    set_current(ptr::null());
    rt.arena.release(loop_stack.slot);
    debug!(worker = id, "worker stopped");
}

extern "C" fn loop_entry(arg: usize) -> ! {
    let worker = unsafe { &*(arg as *const Worker) };
    worker.run();
    unsafe { switch_context(worker.loop_regs.get(), worker.origin_regs.get()) };
    unreachable!("worker loop resumed after exit")
}

impl Worker {
    #[inline]
    fn shared(&self) -> &WorkerShared {
        &self.rt.workers[self.id]
    }

    #[inline]
    pub(crate) fn loop_regs_ptr(&self) -> *const SavedRegs {
        self.loop_regs.get()
    }

    #[inline]
    pub(crate) fn set_switch(&self, reason: Switch) {
        self.switch.set(reason);
    }

    fn run(&self) {
        loop {
            if self.rt.should_exit() {
                break;
            }
            self.reclaim_terminated();
            self.drain_remote();
            self.drain_cancelled();
            self.wake_expired(Instant::now());

            let next = self.policy.borrow_mut().pick_next();
            match next {
                Some(task) => self.resume(task),
                None => self.idle(),
            }
        }
        self.reclaim_terminated();
    }

    fn reclaim_terminated(&self) {
        let done = std::mem::take(&mut *self.terminated.borrow_mut());
        for task in done {
            trace!(worker = self.id, task = %task.id(), "reclaim");
            self.rt.arena.release(task.slot());
        }
    }

    fn drain_remote(&self) {
        let shared = self.shared();
        if shared.remote.is_empty() {
            return;
        }
        let share = {
            let mut policy = self.policy.borrow_mut();
            while let Some(task) = shared.remote.pop() {
                policy.enqueue(task);
            }
            policy.shares_work() && policy.len() > 1
        };
        if share {
            self.rt.wake_idle_peer(self.id);
        }
    }

    fn drain_cancelled(&self) {
        let shared = self.shared();
        if shared.cancelled.is_empty() {
            return;
        }
        let mut alt_sleepers = self.alt_sleepers.borrow_mut();
        while let Some(key) = shared.cancelled.pop() {
            // None when the entry already expired here
            alt_sleepers.remove(key);
        }
    }

    fn wake_expired(&self, now: Instant) {
        loop {
            let next = self.sleepers.borrow_mut().pop_expired(now);
            let Some(task) = next else { break };
            trace!(worker = self.id, task = %task.id(), "sleep expired");
            self.rt.unpark(task);
        }
        loop {
            let next = self.alt_sleepers.borrow_mut().pop_expired(now);
            let Some(AltTimer { task, epoch }) = next else { break };
            // A rendezvous may have won already; then this entry is inert.
            if task.claim.try_claim(epoch, Winner::Timeout) {
                trace!(worker = self.id, task = %task.id(), "alt timeout");
                self.rt.unpark(task);
            }
        }
    }

    fn resume(&self, task: TaskRef) {
        task.begin_run(self.id);
        self.running.set(task.id());
        trace!(worker = self.id, task = %task.id(), "resume");

        unsafe { switch_context(self.loop_regs.get(), task.regs_ptr()) };

        self.running.set(TaskId::NONE);
        match self.switch.get() {
            Switch::Yield => self.enqueue_local(task),
            Switch::Park => {
                if task.settle_park() {
                    self.enqueue_local(task);
                }
            }
            Switch::Terminate => self.terminated.borrow_mut().push(task),
        }
    }

    /// Spin briefly (re-checking for work), then park until the earliest
    /// deadline, the park timeout, or an unpark.
    fn idle(&self) {
        let shared = self.shared();
        for _ in 0..self.rt.config.idle_spins {
            if !shared.remote.is_empty() || !shared.cancelled.is_empty() || self.rt.should_exit() {
                return;
            }
            let stolen = self.policy.borrow_mut().pick_next();
            if let Some(task) = stolen {
                self.resume(task);
                return;
            }
            std::hint::spin_loop();
        }

        let now = Instant::now();
        let mut timeout = self.rt.config.park_timeout;
        let due = [
            self.sleepers.borrow().time_until_next(now),
            self.alt_sleepers.borrow().time_until_next(now),
        ];
        for d in due.into_iter().flatten() {
            timeout = timeout.min(d);
        }
        if timeout.is_zero() {
            return;
        }
        shared.parker.park(Some(timeout));
    }

    /// Queue a runnable task on this worker's policy.
    pub(crate) fn enqueue_local(&self, task: TaskRef) {
        let share = {
            let mut policy = self.policy.borrow_mut();
            policy.enqueue(task);
            policy.shares_work() && policy.len() > 1
        };
        if share {
            self.rt.wake_idle_peer(self.id);
        }
    }

    /// Whether anything besides the caller could run right now.
    pub(crate) fn has_other_work(&self) -> bool {
        if self.policy.borrow().has_ready() || !self.shared().remote.is_empty() {
            return true;
        }
        let now = Instant::now();
        let due = |d: Option<Instant>| d.is_some_and(|d| d <= now);
        due(self.sleepers.borrow().next_deadline()) || due(self.alt_sleepers.borrow().next_deadline())
    }
}
