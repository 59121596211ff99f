//! Worker parking
//!
//! Each worker owns one parker. The worker parks on it when it has nothing
//! to run; remote submissions, idle-peer wakeups and shutdown unpark it.
//!
//! Unpark leaves a token when the worker is not parked, so a wakeup that
//! races with the decision to park is never lost: the next `park` consumes
//! the token and returns immediately.

use std::time::Duration;

pub trait WorkerParking: Send + Sync {
    /// Block the owning worker until unparked or `timeout` elapses.
    ///
    /// Returns `true` when a token was consumed. Callers re-check for work
    /// either way.
    fn park(&self, timeout: Option<Duration>) -> bool;

    /// Hand a token to the worker, waking it if parked.
    fn unpark(&self);

    /// Whether the worker is blocked in `park` right now (a hint).
    fn is_parked(&self) -> bool;
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        pub use futex_linux::FutexParking as PlatformParking;
    } else {
        mod fallback;
        pub use fallback::CondvarParking as PlatformParking;
    }
}

pub fn new_parking() -> Box<dyn WorkerParking> {
    Box::new(PlatformParking::new())
}
