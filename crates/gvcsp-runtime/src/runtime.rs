//! Runtime handle and task context
//!
//! ```rust,ignore
//! use gvcsp_runtime::{Chan, Runtime, RuntimeConfig};
//!
//! let rt = Runtime::new(RuntimeConfig::from_env())?;
//! let answer = rt.block_on(|cx| {
//!     let chan = Chan::<u64>::new();
//!     let tx = chan.clone();
//!     cx.spawn(move |cx| tx.write(cx, 42));
//!     chan.read(cx)
//! });
//! assert_eq!(answer, 42);
//! ```

use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use gvcsp_core::{Location, RuntimeError, RuntimeResult, TaskArgs, TaskId, WorkerError};
use tracing::{error, info, trace};

use crate::arch::init_context;
use crate::config::RuntimeConfig;
use crate::memory::StackArena;
use crate::policy;
use crate::scheduler::{self, task_entry};
use crate::task::{Task, TaskBody, TaskHandle, TaskRef};
use crate::timer::TimerKey;
use crate::worker::{current_worker_id, run_worker, with_current, with_worker, WorkerShared};

/// State shared by the runtime handle and every worker thread
pub(crate) struct RuntimeInner {
    pub(crate) config: RuntimeConfig,
    pub(crate) workers: Vec<WorkerShared>,
    pub(crate) arena: StackArena,
    live: AtomicUsize,
    shutdown: AtomicBool,
    next_worker: AtomicUsize,
}

impl RuntimeInner {
    /// Allocate a stack and build a task that will start in `body`.
    /// The task is left unscheduled.
    pub(crate) fn create_task(&self, owner: usize, body: TaskBody) -> RuntimeResult<TaskRef> {
        let stack = self.arena.allocate()?;
        let task = Arc::new(Task::new(stack.slot, owner, body));
        unsafe {
            init_context(task.regs_ptr(), stack.top, task_entry, Arc::as_ptr(&task) as usize);
        }
        self.live.fetch_add(1, Ordering::SeqCst);
        trace!(task = %task.id(), owner, slot = stack.slot, "task created");
        Ok(task)
    }

    /// Wake a blocked task.
    pub(crate) fn unpark(&self, task: TaskRef) {
        if task.wake() {
            self.schedule(task);
        }
    }

    /// Queue a ready task on the worker that last ran it.
    fn schedule(&self, task: TaskRef) {
        let owner = task.owner();
        let here = with_current(|w| w.filter(|w| ptr::eq(Arc::as_ptr(&w.rt), self)).map(|w| w.id));
        if here == Some(owner) {
            with_worker(|w| w.enqueue_local(task));
        } else {
            self.submit_remote(owner, task);
        }
    }

    pub(crate) fn submit_remote(&self, worker: usize, task: TaskRef) {
        let shared = &self.workers[worker];
        shared.remote.push(task);
        shared.parker.unpark();
    }

    /// Wake one parked worker other than `from` so it can steal.
    /// Drop an alt-sleep entry held by `worker`. Another worker's queue is
    /// only touched by its own loop, so the key is handed over to it.
    pub(crate) fn cancel_alt_timer(&self, worker: usize, key: TimerKey) {
        let removed = with_current(|w| match w {
            Some(w) if w.id == worker && ptr::eq(Arc::as_ptr(&w.rt), self) => {
                w.alt_sleepers.borrow_mut().remove(key);
                true
            }
            _ => false,
        });
        if !removed {
            let shared = &self.workers[worker];
            shared.cancelled.push(key);
            shared.parker.unpark();
        }
    }

    pub(crate) fn wake_idle_peer(&self, from: usize) {
        let n = self.workers.len();
        for k in 1..n {
            let peer = &self.workers[(from + k) % n];
            if peer.parker.is_parked() {
                peer.parker.unpark();
                return;
            }
        }
    }

    fn wake_all(&self) {
        for w in &self.workers {
            w.parker.unpark();
        }
    }

    #[inline]
    pub(crate) fn should_exit(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst) && self.live.load(Ordering::SeqCst) == 0
    }

    pub(crate) fn task_finished(&self) {
        let prev = self.live.fetch_sub(1, Ordering::SeqCst);
        if prev == 1 && self.shutdown.load(Ordering::SeqCst) {
            self.wake_all();
        }
    }

    #[inline]
    fn live_tasks(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// A pool of worker threads running stackful tasks.
///
/// Dropping the runtime shuts it down, which waits for every task.
pub struct Runtime {
    inner: Arc<RuntimeInner>,
    threads: Vec<JoinHandle<()>>,
}

impl Runtime {
    /// Start the workers. Returns once every worker is ready to run tasks.
    pub fn new(config: RuntimeConfig) -> RuntimeResult<Self> {
        config.validate()?;
        config.log();

        let workers = config.resolved_workers();
        // one extra slot per worker for its loop context
        let slots = (config.max_tasks + workers) as u32;
        let arena = StackArena::new(slots, config.stack_size)?;
        let policies = policy::build::<TaskRef>(config.policy, workers);
        let kind = config.policy;

        let inner = Arc::new(RuntimeInner {
            config,
            workers: (0..workers).map(|_| WorkerShared::new()).collect(),
            arena,
            live: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            next_worker: AtomicUsize::new(0),
        });
        let mut rt = Runtime {
            inner: inner.clone(),
            threads: Vec::with_capacity(workers),
        };

        let (ready_tx, ready_rx) = mpsc::channel();
        for (id, policy) in policies.into_iter().enumerate() {
            let inner = inner.clone();
            let ready = ready_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("gvcsp-worker-{id}"))
                .spawn(move || run_worker(inner, id, policy, ready))
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;
            rt.threads.push(handle);
        }
        drop(ready_tx);

        for _ in 0..rt.threads.len() {
            match ready_rx.recv() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(WorkerError::Panicked.into()),
            }
        }

        info!(workers, policy = %kind, "gvcsp runtime started");
        Ok(rt)
    }

    /// Spawn a task from outside the runtime. Panics if no stack slot is
    /// free or the runtime is shutting down; see `try_spawn`.
    pub fn spawn<F>(&self, f: F) -> TaskHandle
    where
        F: FnOnce(&Ctx) + Send + 'static,
    {
        self.try_spawn(f)
            .unwrap_or_else(|e| panic!("gvcsp spawn failed: {e}"))
    }

    pub fn try_spawn<F>(&self, f: F) -> RuntimeResult<TaskHandle>
    where
        F: FnOnce(&Ctx) + Send + 'static,
    {
        if self.inner.shutdown.load(Ordering::SeqCst) {
            return Err(RuntimeError::ShuttingDown);
        }
        let owner = self.inner.next_worker.fetch_add(1, Ordering::Relaxed) % self.inner.workers.len();
        let task = self.inner.create_task(owner, Box::new(f))?;
        task.move_to(Location::Ready);
        let handle = TaskHandle::new(task.clone());
        self.inner.submit_remote(owner, task);
        Ok(handle)
    }

    /// Run `f` as a task and block the calling thread until it returns.
    ///
    /// Must not be called from a worker thread.
    pub fn block_on<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Ctx) -> R + Send + 'static,
        R: Send + 'static,
    {
        assert!(
            current_worker_id().is_none(),
            "block_on called from a gvcsp worker thread"
        );
        let slot = Arc::new((Mutex::new(None), Condvar::new()));
        let done = slot.clone();
        self.spawn(move |cx| {
            let value = f(cx);
            let (lock, cv) = &*done;
            *lock.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
            cv.notify_one();
        });

        let (lock, cv) = &*slot;
        let mut guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(value) = guard.take() {
                return value;
            }
            guard = cv.wait(guard).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Stop accepting external spawns, wait for every live task to finish
    /// and join the workers. Idempotent.
    pub fn shutdown(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.inner.wake_all();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                error!("gvcsp worker thread panicked");
            }
        }
        info!("gvcsp runtime stopped");
    }

    pub fn num_workers(&self) -> usize {
        self.inner.workers.len()
    }

    /// Tasks created and not yet terminated.
    pub fn live_tasks(&self) -> usize {
        self.inner.live_tasks()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The running task's view of the runtime. Only valid on that task's
/// stack; it cannot leave the task.
pub struct Ctx {
    rt: Arc<RuntimeInner>,
    task: TaskRef,
    _not_send: PhantomData<*const ()>,
}

impl Ctx {
    pub(crate) fn new(rt: Arc<RuntimeInner>, task: TaskRef) -> Self {
        Self { rt, task, _not_send: PhantomData }
    }

    #[inline]
    pub(crate) fn task(&self) -> &TaskRef {
        &self.task
    }

    #[inline]
    pub(crate) fn rt(&self) -> &Arc<RuntimeInner> {
        &self.rt
    }

    pub fn id(&self) -> TaskId {
        self.task.id()
    }

    /// Worker currently running this task. May change across any
    /// blocking call.
    pub fn worker_id(&self) -> usize {
        with_worker(|w| w.id)
    }

    /// Spawn a child task on this worker. Panics if no stack slot is free.
    pub fn spawn<F>(&self, f: F) -> TaskHandle
    where
        F: FnOnce(&Ctx) + Send + 'static,
    {
        self.try_spawn(f)
            .unwrap_or_else(|e| panic!("gvcsp spawn failed: {e}"))
    }

    pub fn try_spawn<F>(&self, f: F) -> RuntimeResult<TaskHandle>
    where
        F: FnOnce(&Ctx) + Send + 'static,
    {
        let owner = with_worker(|w| w.id);
        let task = self.rt.create_task(owner, Box::new(f))?;
        task.move_to(Location::Ready);
        let handle = TaskHandle::new(task.clone());
        with_worker(|w| w.enqueue_local(task));
        Ok(handle)
    }

    /// Spawn a plain function with a small word-sized argument list.
    pub fn spawn_with(&self, f: fn(&Ctx, &TaskArgs), args: TaskArgs) -> TaskHandle {
        self.spawn(move |cx| f(cx, &args))
    }

    /// Let other ready tasks on this worker run. Returns immediately when
    /// there are none.
    pub fn yield_now(&self) {
        scheduler::yield_now(self);
    }

    /// Block until `handle`'s task terminates.
    pub fn join(&self, handle: &TaskHandle) {
        scheduler::join(self, handle.task());
    }

    pub fn sleep(&self, duration: Duration) {
        scheduler::sleep(self, duration);
    }

    pub fn sleep_until(&self, deadline: Instant) {
        scheduler::sleep_until(self, deadline);
    }

    pub fn live_tasks(&self) -> usize {
        self.rt.live_tasks()
    }

    pub fn num_workers(&self) -> usize {
        self.rt.workers.len()
    }
}

impl std::fmt::Debug for Ctx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ctx").field("task", &self.task.id()).finish()
    }
}
