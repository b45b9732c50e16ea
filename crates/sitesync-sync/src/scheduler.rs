//! Recurring auto-sync timer
//!
//! [`AutoSyncTimer`] owns the handle of a single interval task. Starting it
//! again replaces the running task instead of stacking a second one, and
//! stopping an already stopped timer does nothing.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

#[derive(Default)]
pub struct AutoSyncTimer {
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AutoSyncTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls `tick` every `period`, first one `period` from now
    ///
    /// Each tick runs on its own task so that stopping the timer never
    /// interrupts a tick already under way.
    pub fn start<F, Fut>(&self, period: Duration, tick: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                debug!("Auto-sync tick");
                tokio::spawn(tick());
            }
        });

        let mut slot = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.replace(task) {
            debug!("Replacing running auto-sync timer");
            previous.abort();
        }
    }

    /// Stops the timer; returns whether it was running
    pub fn stop(&self) -> bool {
        let mut slot = self.task.lock().unwrap_or_else(|e| e.into_inner());
        match slot.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        let slot = self.task.lock().unwrap_or_else(|e| e.into_inner());
        slot.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for AutoSyncTimer {
    fn drop(&mut self) {
        let slot = self.task.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(task) = slot.take() {
            task.abort();
        }
    }
}
