//! Quiet-period debouncer
//!
//! [`Debouncer`] holds at most one pending action. Scheduling a new action
//! aborts the pending one and restarts the quiet period, so a burst of
//! calls runs the last action exactly once, `delay` after the last call.
//!
//! ```text
//!            schedule()                 delay elapsed
//!   Idle ─────────────────→ Pending ─────────────────→ Idle (action spawned)
//!                            │  ↑
//!                 schedule() │  │ (old timer aborted)
//!                            └──┘
//!   Pending ── cancel() ──→ Idle
//! ```
//!
//! Once the quiet period elapses the action runs on its own task, so a later
//! `cancel()` or `schedule()` never interrupts an action that already started.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::trace;

pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Restarts the quiet period; `action` runs when it elapses
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F, Fut>(&self, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(action());
        });

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = pending.replace(timer) {
            trace!("Debounce window restarted");
            previous.abort();
        }
    }

    /// Drops the pending action, if any; returns whether one was pending
    pub fn cancel(&self) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        match pending.take() {
            Some(timer) if !timer.is_finished() => {
                timer.abort();
                true
            }
            _ => false,
        }
    }

    /// Returns true while an action is waiting for its quiet period
    pub fn is_pending(&self) -> bool {
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.as_ref().is_some_and(|timer| !timer.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        let pending = self.pending.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(timer) = pending.take() {
            timer.abort();
        }
    }
}
