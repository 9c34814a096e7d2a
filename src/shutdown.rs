/// Cooperative cancellation shared between the host and its workers.
///
/// `wait_timeout` is the only sleep the workers use, so a `cancel()` wakes
/// them immediately instead of after the current interval.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown and wakes every waiter. Idempotent.
    pub fn cancel(&self) {
        let (flag, condvar) = &*self.inner;
        // A poisoned flag still carries the value; cancellation must not be lost.
        let mut cancelled = flag.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *cancelled = true;
        condvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        let (flag, _) = &*self.inner;
        *flag.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sleeps up to `timeout`. Returns `true` if cancellation was requested
    /// before or during the wait. A timeout too large to express as a
    /// deadline waits for cancellation alone.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, condvar) = &*self.inner;
        let deadline = Instant::now().checked_add(timeout);
        let mut cancelled = flag.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        // Loop to absorb spurious wakeups.
        while !*cancelled {
            cancelled = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    match condvar.wait_timeout(cancelled, deadline - now) {
                        Ok((guard, _)) => guard,
                        Err(poisoned) => poisoned.into_inner().0,
                    }
                }
                None => condvar
                    .wait(cancelled)
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
            };
        }
        true
    }

    /// Blocks until `cancel()` is called.
    pub fn wait(&self) {
        self.wait_timeout(Duration::MAX);
    }

    /// Cancels this signal on SIGINT or SIGTERM. Only one handler can be
    /// installed per process.
    pub fn cancel_on_os_signal(&self) -> Result<(), ctrlc::Error> {
        let signal = self.clone();
        ctrlc::set_handler(move || {
            info!("Shutdown signal received");
            signal.cancel();
        })
    }
}
