//! Portable parking on `Mutex` + `Condvar`, for targets without futex.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::WorkerParking;

pub struct CondvarParking {
    token: Mutex<bool>,
    cv: Condvar,
    parked: AtomicBool,
}

impl CondvarParking {
    pub fn new() -> Self {
        Self {
            token: Mutex::new(false),
            cv: Condvar::new(),
            parked: AtomicBool::new(false),
        }
    }
}

impl Default for CondvarParking {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerParking for CondvarParking {
    fn park(&self, timeout: Option<Duration>) -> bool {
        let mut token = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        if !*token {
            self.parked.store(true, Ordering::Relaxed);
            let deadline = timeout.map(|t| Instant::now() + t);
            while !*token {
                match deadline {
                    Some(at) => {
                        let now = Instant::now();
                        if now >= at {
                            break;
                        }
                        token = self
                            .cv
                            .wait_timeout(token, at - now)
                            .unwrap_or_else(PoisonError::into_inner)
                            .0;
                    }
                    None => token = self.cv.wait(token).unwrap_or_else(PoisonError::into_inner),
                }
            }
            self.parked.store(false, Ordering::Relaxed);
        }
        std::mem::replace(&mut *token, false)
    }

    fn unpark(&self) {
        let mut token = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        if !*token {
            *token = true;
            self.cv.notify_one();
        }
    }

    fn is_parked(&self) -> bool {
        self.parked.load(Ordering::Relaxed)
    }
}
