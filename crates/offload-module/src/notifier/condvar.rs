//! `CondvarNotifier`: portable `Notifier`.
//!
//! A pending flag under a mutex. `notify()` sets it, `wait()` consumes it.

use offload_core::notifier::Notifier;
use offload_core::Result;

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub struct CondvarNotifier {
    pending: Mutex<bool>,
    condvar: Condvar,
}

impl CondvarNotifier {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Same signature as the platform notifiers.
    pub fn create() -> Result<Self> {
        Ok(Self::new())
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CondvarNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for CondvarNotifier {
    fn notify(&self) -> Result<()> {
        *self.lock() = true;
        self.condvar.notify_one();
        Ok(())
    }

    fn wait(&self, timeout: Option<Duration>) -> Result<bool> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut pending = self.lock();
        while !*pending {
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(false);
                    }
                    pending = self
                        .condvar
                        .wait_timeout(pending, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
                None => {
                    pending = self
                        .condvar
                        .wait(pending)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
        *pending = false;
        Ok(true)
    }
}
