//! Linux futex parking
//!
//! Futex word: 0 = no token, 1 = token pending.
//!
//! park:   consume a token if present; otherwise publish `parked`, re-check,
//!         then FUTEX_WAIT while the word is 0.
//! unpark: set the word to 1; FUTEX_WAKE only if it was 0 and the worker
//!         has published `parked`.
//!
//! Both sides use SeqCst on the word and on `parked`, so at least one of
//! them observes the other's write.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use super::WorkerParking;

pub struct FutexParking {
    word: AtomicU32,
    parked: AtomicBool,
}

impl FutexParking {
    pub fn new() -> Self {
        Self {
            word: AtomicU32::new(0),
            parked: AtomicBool::new(false),
        }
    }

    #[inline]
    fn take_token(&self) -> bool {
        self.word.swap(0, Ordering::SeqCst) == 1
    }

    fn futex_wait(&self, timeout: Option<Duration>) {
        let ts = timeout.map(|d| libc::timespec {
            tv_sec: d.as_secs().min(i64::MAX as u64) as libc::time_t,
            tv_nsec: d.subsec_nanos() as libc::c_long,
        });
        let ts_ptr = ts
            .as_ref()
            .map_or(std::ptr::null(), |t| t as *const libc::timespec);
        // ETIMEDOUT, EAGAIN and EINTR all mean "go look for work".
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.word.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                0u32,
                ts_ptr,
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }

    fn futex_wake(&self) {
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.word.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                1i32,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }
}

impl Default for FutexParking {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerParking for FutexParking {
    fn park(&self, timeout: Option<Duration>) -> bool {
        if self.take_token() {
            return true;
        }
        self.parked.store(true, Ordering::SeqCst);
        if self.word.load(Ordering::SeqCst) == 0 {
            self.futex_wait(timeout);
        }
        self.parked.store(false, Ordering::SeqCst);
        self.take_token()
    }

    fn unpark(&self) {
        if self.word.swap(1, Ordering::SeqCst) == 0 && self.parked.load(Ordering::SeqCst) {
            self.futex_wake();
        }
    }

    fn is_parked(&self) -> bool {
        self.parked.load(Ordering::Relaxed)
    }
}
