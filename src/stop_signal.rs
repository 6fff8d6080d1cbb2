use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A manual-reset event telling the worker loop to finish.
///
/// Cloning yields another handle to the same event. Once set it stays set.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the event and wake every waiter.
    pub fn set(&self) {
        let (lock, condvar) = &*self.inner;
        let mut is_set = lock.lock().unwrap_or_else(PoisonError::into_inner);
        *is_set = true;
        condvar.notify_all();
    }

    /// Non-blocking poll.
    pub fn is_set(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the event is set or `timeout` elapses. Returns whether the event is set.
    ///
    /// A timeout too large to be represented as a deadline waits until the event is set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, condvar) = &*self.inner;
        let mut is_set = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let deadline = match Instant::now().checked_add(timeout) {
            Some(deadline) => deadline,
            None => {
                while !*is_set {
                    is_set = condvar.wait(is_set).unwrap_or_else(PoisonError::into_inner);
                }
                return true;
            }
        };
        while !*is_set {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            is_set = condvar
                .wait_timeout(is_set, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        *is_set
    }
}
