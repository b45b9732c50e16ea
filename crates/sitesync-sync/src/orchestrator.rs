//! Sync orchestrator
//!
//! Decides when a sync runs and carries one attempt from pre-flight checks
//! to a persisted cursor.
//!
//! ## Flow of one `trigger_sync`
//!
//! ```text
//!   in progress? ──yes──→ AlreadyInProgress
//!        │ no (flag set, cleared by guard on every path)
//!   connected? ───no───→ NoNetwork
//!   quality ok? ──no───→ UnfavorableNetwork
//!   token? ───────no───→ MissingCredentials
//!        │
//!   ┌─→ compute change set → push
//!   │        │ ok: advance cursor, persist, record history
//!   └── network/timeout and attempts left (sleep base * attempt)
//!                 stop_auto_sync/shutdown during the sleep ends the attempt
//! ```
//!
//! Triggers come from callers, the debounced [`notify_change`], the
//! auto-sync timer, and the network listener when connectivity returns.
//! All of them funnel into the same single-flight path, so overlapping
//! triggers are rejected instead of queued.
//!
//! [`notify_change`]: SyncOrchestrator::notify_change

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sitesync_core::clock::{Clock, SystemClock};
use sitesync_core::config::Config;
use sitesync_core::domain::{
    ChangeSet, EntityKind, SyncCursor, SyncHistoryEntry, SyncHistoryStatus, SyncStatus,
    SyncType,
};
use sitesync_core::ports::{ISyncStateRepository, ISyncTransport};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::change_set::ChangeSetFilter;
use crate::debounce::Debouncer;
use crate::network::{ListenerId, NetworkMonitor};
use crate::retry::RetryPolicy;
use crate::scheduler::AutoSyncTimer;
use crate::{SyncError, SyncErrorKind, SyncOutcome};

pub const MSG_ALREADY_IN_PROGRESS: &str = "sync already in progress";
pub const MSG_MISSING_CREDENTIALS: &str = "no authentication token found";
pub const MSG_REJECTED: &str = "sync rejected by server";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ============================================================================
// Settings
// ============================================================================

/// Timing and identity knobs for the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Auto-sync period, also used to project `next_sync`
    pub interval: Duration,
    /// Quiet period for change notifications
    pub debounce: Duration,
    pub retry: RetryPolicy,
    /// Wait after connectivity returns before syncing
    pub reconnect_delay: Duration,
    pub device_id: Option<String>,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.sync.interval(),
            debounce: config.sync.debounce(),
            retry: RetryPolicy::from_config(&config.sync),
            reconnect_delay: config.network.reconnect_delay(),
            device_id: config.sync.device_id.clone(),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            debounce: Duration::from_millis(1000),
            retry: RetryPolicy::default(),
            reconnect_delay: Duration::from_millis(2000),
            device_id: None,
        }
    }
}

// ============================================================================
// Single-flight guard
// ============================================================================

/// Clears the in-progress flag when the attempt ends, however it ends
struct InProgressGuard<'a>(&'a AtomicBool);

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct EngineState {
    cursor: SyncCursor,
    retry_count: u32,
}

// ============================================================================
// SyncOrchestrator
// ============================================================================

pub struct SyncOrchestrator {
    monitor: Arc<NetworkMonitor>,
    transport: Arc<dyn ISyncTransport>,
    filter: ChangeSetFilter,
    state_repo: Arc<dyn ISyncStateRepository>,
    clock: Arc<dyn Clock>,
    settings: OrchestratorSettings,
    in_progress: AtomicBool,
    state: Mutex<EngineState>,
    change_debouncer: Debouncer,
    reconnect_debouncer: Debouncer,
    auto_sync: AutoSyncTimer,
    network_listener: Mutex<Option<ListenerId>>,
    /// Cancelled to abandon retry sleeps; replaced with a fresh token each time
    retry_cancel: Mutex<CancellationToken>,
}

impl SyncOrchestrator {
    pub fn new(
        monitor: Arc<NetworkMonitor>,
        transport: Arc<dyn ISyncTransport>,
        filter: ChangeSetFilter,
        state_repo: Arc<dyn ISyncStateRepository>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            monitor,
            transport,
            filter,
            state_repo,
            clock: Arc::new(SystemClock),
            change_debouncer: Debouncer::new(settings.debounce),
            reconnect_debouncer: Debouncer::new(settings.reconnect_delay),
            settings,
            in_progress: AtomicBool::new(false),
            state: Mutex::new(EngineState::default()),
            auto_sync: AutoSyncTimer::new(),
            network_listener: Mutex::new(None),
            retry_cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Replaces the clock used to stamp watermarks and history
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Loads the persisted cursor into memory
    pub async fn restore_state(&self) -> anyhow::Result<SyncCursor> {
        let cursor = self.state_repo.load_cursor().await?;
        lock(&self.state).cursor = cursor;
        debug!(watermark = ?cursor.watermark, revision = ?cursor.revision, "Restored sync cursor");
        Ok(cursor)
    }

    // ------------------------------------------------------------------------
    // Sync entry points
    // ------------------------------------------------------------------------

    /// Runs one sync attempt, with retries for transient failures
    #[tracing::instrument(skip(self))]
    pub async fn trigger_sync(&self) -> SyncOutcome {
        let Some(_guard) = self.try_begin() else {
            debug!("Sync requested while another is in flight");
            return SyncOutcome::failed(
                SyncError::new(SyncErrorKind::AlreadyInProgress, MSG_ALREADY_IN_PROGRESS),
                0,
            );
        };
        self.run(SyncType::Incremental).await
    }

    /// Forgets the cursor and syncs everything the filter selects
    ///
    /// Under the revision strategy this transmits every record; under the
    /// lookback strategy it transmits the whole lookback window.
    #[tracing::instrument(skip(self))]
    pub async fn force_full_sync(&self) -> SyncOutcome {
        let Some(_guard) = self.try_begin() else {
            return SyncOutcome::failed(
                SyncError::new(SyncErrorKind::AlreadyInProgress, MSG_ALREADY_IN_PROGRESS),
                0,
            );
        };

        info!("Forcing full sync");
        if let Err(e) = self.state_repo.clear_cursor().await {
            warn!(error = %format!("{e:#}"), "Failed to clear persisted sync cursor");
        }
        lock(&self.state).cursor.reset();

        self.run(SyncType::Full).await
    }

    /// Read-only snapshot of the engine state
    pub fn get_sync_status(&self) -> SyncStatus {
        let state = lock(&self.state);
        let last_sync = state.cursor.watermark;
        SyncStatus {
            last_sync,
            is_in_progress: self.is_in_progress(),
            next_sync: last_sync.and_then(|at| self.project_next(at)),
            retry_count: state.retry_count,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Records that `entity` changed locally; syncs once the burst settles
    pub fn notify_change(self: &Arc<Self>, entity: EntityKind) {
        debug!(%entity, "Local change notified");
        let weak = Arc::downgrade(self);
        self.change_debouncer.schedule(move || async move {
            if let Some(orchestrator) = weak.upgrade() {
                let outcome = orchestrator.trigger_sync().await;
                log_background_outcome("change notification", &outcome);
            }
        });
    }

    // ------------------------------------------------------------------------
    // Background triggers
    // ------------------------------------------------------------------------

    /// Starts (or restarts) the recurring auto-sync timer
    pub fn start_auto_sync(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.auto_sync.start(self.settings.interval, move || {
            let weak = weak.clone();
            async move {
                let Some(orchestrator) = weak.upgrade() else {
                    return;
                };
                if orchestrator.is_in_progress() {
                    debug!("Skipping auto-sync tick, sync in flight");
                    return;
                }
                let outcome = orchestrator.trigger_sync().await;
                log_background_outcome("auto-sync", &outcome);
            }
        });
        info!(interval_secs = self.settings.interval.as_secs(), "Auto-sync started");
    }

    /// Stops the timer and drops pending debounced or reconnect syncs
    ///
    /// A push already on the wire is left to finish, but a scheduled retry
    /// is abandoned and the attempt reports its last failure.
    pub fn stop_auto_sync(&self) {
        let was_running = self.auto_sync.stop();
        self.change_debouncer.cancel();
        self.reconnect_debouncer.cancel();
        self.cancel_pending_retries();
        if was_running {
            info!("Auto-sync stopped");
        }
    }

    pub fn is_auto_sync_running(&self) -> bool {
        self.auto_sync.is_running()
    }

    /// Syncs after `reconnect_delay` whenever the network becomes usable
    ///
    /// Calling it again replaces the previous listener.
    pub fn attach_network_listener(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let id = self.monitor.add_status_listener(move |previous, current| {
            if previous.is_usable() || !current.is_usable() {
                return;
            }
            if let Some(orchestrator) = weak.upgrade() {
                orchestrator.schedule_reconnect_sync();
            }
        });

        if let Some(previous) = lock(&self.network_listener).replace(id) {
            self.monitor.remove_status_listener(previous);
        }
    }

    /// Stops every background trigger and detaches from the network monitor
    pub fn shutdown(&self) {
        self.stop_auto_sync();
        if let Some(id) = lock(&self.network_listener).take() {
            self.monitor.remove_status_listener(id);
        }
        debug!("Sync orchestrator shut down");
    }

    fn cancel_pending_retries(&self) {
        let previous = std::mem::replace(&mut *lock(&self.retry_cancel), CancellationToken::new());
        previous.cancel();
    }

    fn schedule_reconnect_sync(self: &Arc<Self>) {
        info!(
            delay_ms = self.settings.reconnect_delay.as_millis() as u64,
            "Network usable again, scheduling sync"
        );
        let weak = Arc::downgrade(self);
        self.reconnect_debouncer.schedule(move || async move {
            if let Some(orchestrator) = weak.upgrade() {
                let outcome = orchestrator.trigger_sync().await;
                log_background_outcome("reconnect", &outcome);
            }
        });
    }

    // ------------------------------------------------------------------------
    // Attempt internals
    // ------------------------------------------------------------------------

    fn try_begin(&self) -> Option<InProgressGuard<'_>> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InProgressGuard(&self.in_progress))
    }

    fn preflight(&self) -> Result<(), SyncError> {
        let recommendation = self.monitor.get_sync_recommendation();
        if !self.monitor.get_network_status().connected {
            return Err(SyncError::new(
                SyncErrorKind::NoNetwork,
                recommendation.reason,
            ));
        }
        if !recommendation.should_sync {
            return Err(SyncError::new(
                SyncErrorKind::UnfavorableNetwork,
                recommendation.reason,
            ));
        }
        if !self.transport.has_credentials() {
            return Err(SyncError::new(
                SyncErrorKind::MissingCredentials,
                MSG_MISSING_CREDENTIALS,
            ));
        }
        Ok(())
    }

    /// Body of a sync once the in-progress flag is held
    async fn run(&self, sync_type: SyncType) -> SyncOutcome {
        if let Err(err) = self.preflight() {
            info!(kind = %err.kind, reason = %err.message, "Sync skipped");
            return SyncOutcome::failed(err, 0);
        }

        let started = Instant::now();
        let policy = self.settings.retry;
        let cancel = lock(&self.retry_cancel).clone();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.attempt().await {
                Ok(change_set) => {
                    self.complete(&change_set).await;
                    self.record_history(
                        sync_type,
                        SyncHistoryStatus::Success,
                        change_set.len(),
                        started,
                    )
                    .await;
                    info!(
                        %sync_type,
                        records = change_set.len(),
                        attempts = attempt,
                        "Sync completed"
                    );
                    return SyncOutcome::succeeded(change_set.len(), attempt);
                }
                Err(err) if policy.should_retry(attempt, err.kind) => {
                    let delay = policy.delay_for(attempt);
                    lock(&self.state).retry_count = attempt;
                    warn!(
                        attempt,
                        kind = %err.kind,
                        reason = %err.message,
                        delay_ms = delay.as_millis() as u64,
                        "Sync attempt failed, retrying"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => {
                            info!(%sync_type, attempt, "Pending retry cancelled");
                            self.record_history(sync_type, SyncHistoryStatus::Failed, 0, started)
                                .await;
                            return SyncOutcome::failed(err, attempt);
                        }
                    }
                }
                Err(err) => {
                    error!(
                        %sync_type,
                        attempt,
                        kind = %err.kind,
                        reason = %err.message,
                        "Sync failed"
                    );
                    self.record_history(sync_type, SyncHistoryStatus::Failed, 0, started)
                        .await;
                    return SyncOutcome::failed(err, attempt);
                }
            }
        }
    }

    async fn attempt(&self) -> Result<ChangeSet, SyncError> {
        let cursor = lock(&self.state).cursor;
        let change_set = self.filter.compute_change_set(&cursor).await.map_err(|e| {
            SyncError::new(
                SyncErrorKind::Unknown,
                format!("failed to compute change set: {e:#}"),
            )
        })?;

        debug!(records = change_set.len(), "Pushing change set");
        let ack = self
            .transport
            .push_change_set(&change_set, self.settings.device_id.as_deref())
            .await?;
        if !ack.success {
            return Err(SyncError::new(SyncErrorKind::Server, MSG_REJECTED));
        }
        Ok(change_set)
    }

    /// Advances and persists the cursor after a successful push
    async fn complete(&self, change_set: &ChangeSet) {
        let now = self.clock.now();
        let cursor = {
            let mut state = lock(&self.state);
            state.cursor.advance(now, change_set.max_revision);
            state.retry_count = 0;
            state.cursor
        };

        // The in-memory cursor already moved; a failed write only costs a
        // wider change set after a restart.
        if let Err(e) = self.state_repo.save_cursor(&cursor).await {
            warn!(error = %format!("{e:#}"), "Failed to persist sync cursor");
        }
    }

    async fn record_history(
        &self,
        sync_type: SyncType,
        status: SyncHistoryStatus,
        items: usize,
        started: Instant,
    ) {
        let entry = SyncHistoryEntry {
            timestamp: self.clock.now(),
            sync_type,
            status,
            device_id: self.settings.device_id.clone(),
            items_count: items as u64,
            duration: started.elapsed().as_millis() as u64,
        };
        if let Err(e) = self.state_repo.record_history(&entry).await {
            warn!(error = %format!("{e:#}"), "Failed to record sync history");
        }
    }

    fn project_next(&self, last_sync: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let interval = chrono::Duration::from_std(self.settings.interval).ok()?;
        last_sync.checked_add_signed(interval)
    }
}

impl Drop for SyncOrchestrator {
    fn drop(&mut self) {
        if let Some(id) = lock(&self.network_listener).take() {
            self.monitor.remove_status_listener(id);
        }
    }
}

fn log_background_outcome(trigger: &str, outcome: &SyncOutcome) {
    match &outcome.error {
        None => debug!(trigger, records = outcome.records_sent, "Background sync finished"),
        Some(err) if err.kind.is_preflight() => {
            debug!(trigger, kind = %err.kind, "Background sync skipped")
        }
        Some(err) => warn!(trigger, kind = %err.kind, reason = %err.message, "Background sync failed"),
    }
}
