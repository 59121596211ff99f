//! Unbuffered rendezvous channels
//!
//! A channel moves a fixed-size payload directly from the writer's buffer
//! into the reader's buffer; nothing is ever stored in the channel itself.
//! Whichever side arrives second completes the transfer and wakes the
//! first, so it never blocks.
//!
//! Pending operations wait in FIFO order. Alt branches register *guards*
//! on a separate queue; a writer offers to guards first, and a guard only
//! takes the payload if it wins its alt's claim.

use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::mem::{self, MaybeUninit};
use std::ptr;
use std::sync::Arc;

use gvcsp_core::{Location, SpinLock, Winner};

use crate::runtime::Ctx;
use crate::scheduler;
use crate::task::TaskRef;

/// Buffer address of a blocked operation. Valid while its task is parked.
#[derive(Clone, Copy)]
struct BufPtr(*mut u8);

unsafe impl Send for BufPtr {}

struct PendingEnd {
    task: TaskRef,
    buf: BufPtr,
}

struct AltGuard {
    task: TaskRef,
    epoch: u32,
    branch: u32,
    buf: BufPtr,
}

#[derive(Default)]
struct ChanState {
    readers: VecDeque<PendingEnd>,
    writers: VecDeque<PendingEnd>,
    guards: VecDeque<AltGuard>,
}

struct ChanInner {
    size: usize,
    state: SpinLock<ChanState>,
}

impl Drop for ChanInner {
    fn drop(&mut self) {
        let st = self.state.lock();
        debug_assert!(
            st.readers.is_empty() && st.writers.is_empty() && st.guards.is_empty(),
            "channel dropped with pending operations"
        );
    }
}

/// Outcome of enabling an alt branch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Enable {
    /// A writer was pending and this branch won; the transfer is done.
    Fired,
    /// A writer was pending but another party already won the alt.
    Lost,
    /// Nothing to take yet; a guard now waits on the channel.
    Registered,
}

/// Untyped channel carrying payloads of exactly `size` bytes.
#[derive(Clone)]
pub struct RawChan {
    inner: Arc<ChanInner>,
}

impl RawChan {
    pub fn new(size: usize) -> Self {
        Self {
            inner: Arc::new(ChanInner {
                size,
                state: SpinLock::new(ChanState::default()),
            }),
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.inner.size
    }

    #[inline]
    pub(crate) fn assert_payload(&self, len: usize) {
        assert!(
            len == self.inner.size,
            "channel payload is {} bytes, got {}",
            self.inner.size,
            len
        );
    }

    /// Send `payload`, blocking until a reader or alt takes it.
    pub fn write(&self, cx: &Ctx, payload: &[u8]) {
        self.assert_payload(payload.len());
        unsafe { self.write_raw(cx, payload.as_ptr()) }
    }

    /// Receive into `buf`, blocking until a writer arrives.
    pub fn read(&self, cx: &Ctx, buf: &mut [u8]) {
        self.assert_payload(buf.len());
        unsafe { self.read_raw(cx, buf.as_mut_ptr()) }
    }

    /// # Safety
    ///
    /// `src` must be readable for `size()` bytes until this returns.
    pub(crate) unsafe fn write_raw(&self, cx: &Ctx, src: *const u8) {
        let size = self.inner.size;
        let task = cx.task();
        let mut st = self.inner.state.lock();

        while let Some(guard) = st.guards.pop_front() {
            // A guard whose alt already resolved is dropped here.
            if guard.task.claim.try_claim(guard.epoch, Winner::Branch(guard.branch)) {
                copy_payload(src, guard.buf.0, size);
                drop(st);
                cx.rt().unpark(guard.task);
                return;
            }
        }

        if let Some(reader) = st.readers.pop_front() {
            copy_payload(src, reader.buf.0, size);
            drop(st);
            cx.rt().unpark(reader.task);
            return;
        }

        task.prepare_park(Location::ChannelWait);
        st.writers.push_back(PendingEnd {
            task: task.clone(),
            buf: BufPtr(src as *mut u8),
        });
        drop(st);
        scheduler::park(task);
    }

    /// # Safety
    ///
    /// `dst` must be writable for `size()` bytes until this returns.
    pub(crate) unsafe fn read_raw(&self, cx: &Ctx, dst: *mut u8) {
        let size = self.inner.size;
        let task = cx.task();
        let mut st = self.inner.state.lock();

        if let Some(writer) = st.writers.pop_front() {
            copy_payload(writer.buf.0, dst, size);
            drop(st);
            cx.rt().unpark(writer.task);
            return;
        }

        task.prepare_park(Location::ChannelWait);
        st.readers.push_back(PendingEnd {
            task: task.clone(),
            buf: BufPtr(dst),
        });
        drop(st);
        scheduler::park(task);
    }

    /// Enable alt branch `branch` of the calling task for claim `epoch`.
    ///
    /// # Safety
    ///
    /// `buf` must be writable for `size()` bytes until the guard is
    /// disabled or the alt has resolved.
    pub(crate) unsafe fn alt_enable(&self, cx: &Ctx, epoch: u32, branch: u32, buf: *mut u8) -> Enable {
        let task = cx.task();
        let mut st = self.inner.state.lock();

        match st.writers.pop_front() {
            Some(writer) => {
                if task.claim.try_claim(epoch, Winner::Branch(branch)) {
                    let writer = self.alt_read(writer, buf);
                    drop(st);
                    cx.rt().unpark(writer);
                    Enable::Fired
                } else {
                    st.writers.push_front(writer);
                    Enable::Lost
                }
            }
            None => {
                st.guards.push_back(AltGuard {
                    task: task.clone(),
                    epoch,
                    branch,
                    buf: BufPtr(buf),
                });
                Enable::Registered
            }
        }
    }

    /// Complete a won branch against `writer`; returns the task to wake.
    /// Caller holds the channel lock.
    unsafe fn alt_read(&self, writer: PendingEnd, buf: *mut u8) -> TaskRef {
        copy_payload(writer.buf.0, buf, self.inner.size);
        writer.task
    }

    /// Remove a guard registered by `alt_enable`. Absence is fine: a
    /// writer removes the guard it completes.
    pub(crate) fn alt_disable(&self, cx: &Ctx, epoch: u32, branch: u32) {
        let id = cx.id();
        self.inner
            .state
            .lock()
            .guards
            .retain(|g| !(g.task.id() == id && g.epoch == epoch && g.branch == branch));
    }

    pub fn pending_readers(&self) -> usize {
        self.inner.state.lock().readers.len()
    }

    pub fn pending_writers(&self) -> usize {
        self.inner.state.lock().writers.len()
    }

    /// Alt guards currently registered.
    pub fn pending_guards(&self) -> usize {
        self.inner.state.lock().guards.len()
    }
}

impl fmt::Debug for RawChan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawChan").field("size", &self.inner.size).finish()
    }
}

/// Fixed-width copy between two payload buffers.
#[inline]
unsafe fn copy_payload(src: *const u8, dst: *mut u8, size: usize) {
    match size {
        0 => {}
        1 => dst.write(src.read()),
        2 => (dst as *mut u16).write_unaligned((src as *const u16).read_unaligned()),
        4 => (dst as *mut u32).write_unaligned((src as *const u32).read_unaligned()),
        8 => (dst as *mut u64).write_unaligned((src as *const u64).read_unaligned()),
        _ => ptr::copy_nonoverlapping(src, dst, size),
    }
}

/// Channel of `T` values, moved by bitwise copy.
pub struct Chan<T> {
    raw: RawChan,
    _marker: PhantomData<fn(T) -> T>,
}

impl<T: Copy + Send + 'static> Chan<T> {
    pub fn new() -> Self {
        Self {
            raw: RawChan::new(mem::size_of::<T>()),
            _marker: PhantomData,
        }
    }

    pub fn write(&self, cx: &Ctx, value: T) {
        unsafe { self.raw.write_raw(cx, &value as *const T as *const u8) }
    }

    pub fn read(&self, cx: &Ctx) -> T {
        let mut slot = MaybeUninit::<T>::uninit();
        unsafe {
            self.raw.read_raw(cx, slot.as_mut_ptr() as *mut u8);
            slot.assume_init()
        }
    }
}

impl<T> Chan<T> {
    #[inline]
    pub fn raw(&self) -> &RawChan {
        &self.raw
    }
}

impl<T: Copy + Send + 'static> Default for Chan<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Chan<T> {
    fn clone(&self) -> Self {
        Self {
            raw: self.raw.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Chan<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Chan").field(&self.raw.size()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::runtime::Runtime;

    fn runtime(workers: usize) -> Runtime {
        Runtime::new(
            RuntimeConfig::new()
                .num_workers(workers)
                .max_tasks(64)
                .pin_workers(false),
        )
        .unwrap()
    }

    #[test]
    fn test_copy_widths() {
        for size in [0usize, 1, 2, 3, 4, 8, 13] {
            let src: Vec<u8> = (1..=size as u8).collect();
            let mut dst = vec![0u8; size];
            unsafe { copy_payload(src.as_ptr(), dst.as_mut_ptr(), size) };
            assert_eq!(src, dst);
        }
    }

    #[test]
    #[should_panic(expected = "channel payload is 8 bytes, got 4")]
    fn test_size_mismatch_panics() {
        RawChan::new(8).assert_payload(4);
    }

    #[test]
    fn test_raw_write_read() {
        let rt = runtime(1);
        let got = rt.block_on(|cx| {
            let chan = RawChan::new(3);
            let tx = chan.clone();
            cx.spawn(move |cx| tx.write(cx, &[7, 8, 9]));
            let mut buf = [0u8; 3];
            chan.read(cx, &mut buf);
            buf
        });
        assert_eq!(got, [7, 8, 9]);
    }

    #[test]
    fn test_writer_parks_until_read() {
        let rt = runtime(1);
        rt.block_on(|cx| {
            let chan = Chan::<u64>::new();
            let tx = chan.clone();
            let writer = cx.spawn(move |cx| tx.write(cx, 42));
            // let the writer run and park
            cx.yield_now();
            assert_eq!(chan.raw().pending_writers(), 1);
            assert!(!writer.is_terminated());

            assert_eq!(chan.read(cx), 42);
            assert_eq!(chan.raw().pending_writers(), 0);
            cx.join(&writer);
        });
    }
}
