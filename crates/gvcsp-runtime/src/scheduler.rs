//! Task-side scheduling primitives
//!
//! Everything here runs on a task's own stack and ends by switching back to
//! the worker loop, which finishes the job based on the recorded `Switch`.

use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use gvcsp_core::Location;
use tracing::{error, trace};

use crate::arch::switch_context;
use crate::runtime::Ctx;
use crate::task::{Task, TaskRef};
use crate::worker::with_worker;

/// Why a task handed control back to its worker loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Switch {
    /// Still runnable; requeue at the tail
    Yield,
    /// Blocked; requeued only by a wakeup
    Park,
    /// Finished; release its stack
    Terminate,
}

/// Save the running task and resume its worker loop. Returns when the task
/// is next scheduled, possibly on another worker.
pub(crate) fn switch_out(task: &Task, reason: Switch) {
    let loop_regs = with_worker(|w| {
        w.set_switch(reason);
        w.loop_regs_ptr()
    });
    unsafe { switch_context(task.regs_ptr(), loop_regs) };
}

/// Switch out after `prepare_park`; returns once woken.
#[inline]
pub(crate) fn park(task: &Task) {
    switch_out(task, Switch::Park);
}

pub(crate) fn yield_now(cx: &Ctx) {
    if !with_worker(|w| w.has_other_work()) {
        return;
    }
    let task = cx.task();
    task.move_to(Location::Ready);
    switch_out(task, Switch::Yield);
}

pub(crate) fn sleep(cx: &Ctx, duration: Duration) {
    match Instant::now().checked_add(duration) {
        Some(deadline) => sleep_until(cx, deadline),
        // no representable deadline; only a wakeup ends this
        None => {
            let task = cx.task();
            task.prepare_park(Location::Sleeping { deadline: None });
            park(task);
        }
    }
}

pub(crate) fn sleep_until(cx: &Ctx, deadline: Instant) {
    if deadline <= Instant::now() {
        return;
    }
    let task = cx.task();
    task.prepare_park(Location::Sleeping { deadline: Some(deadline) });
    with_worker(|w| {
        w.sleepers.borrow_mut().insert(deadline, task.clone());
    });
    park(task);
}

pub(crate) fn join(cx: &Ctx, target: &TaskRef) {
    let task = cx.task();
    assert!(task.id() != target.id(), "task {} cannot join itself", task.id());
    if target.add_joiner(task) {
        park(task);
    }
}

fn terminate(cx: Ctx) -> ! {
    let task = cx.task().clone();
    let rt = cx.rt().clone();
    drop(cx);

    task.move_to(Location::Terminated);
    // joiners may read the live count as soon as they run
    rt.task_finished();
    for waiter in task.finish_join() {
        rt.unpark(waiter);
    }
    trace!(task = %task.id(), "terminated");

    let regs = task.regs_ptr();
    let loop_regs = with_worker(|w| {
        w.set_switch(Switch::Terminate);
        w.loop_regs_ptr()
    });
    // The loop keeps its own reference; none may stay on this stack.
    drop(task);
    drop(rt);
    unsafe { switch_context(regs, loop_regs) };
    unreachable!("terminated task resumed")
}

/// First frame of every task stack.
pub(crate) extern "C" fn task_entry(arg: usize) -> ! {
    let task = unsafe { Task::clone_from_raw(arg as *const Task) };
    let rt = with_worker(|w| w.rt.clone());
    let cx = Ctx::new(rt, task);

    if let Some(body) = cx.task().take_body() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| body(&cx))) {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(task = %cx.id(), panic = %msg, "task panicked, aborting");
            std::process::abort();
        }
    }
    terminate(cx)
}
