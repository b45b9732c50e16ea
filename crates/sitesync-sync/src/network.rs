//! Network monitor
//!
//! Probes server reachability through an [`IConnectivityProbe`], classifies
//! link quality from probe latency, and fans status changes out to
//! listeners and `watch` subscribers.
//!
//! ## Quality classification
//!
//! | Probe latency             | Quality     |
//! |---------------------------|-------------|
//! | `< excellent` (300 ms)    | `Excellent` |
//! | `< good` (1000 ms)        | `Good`      |
//! | otherwise                 | `Poor`      |
//! | probe failed              | `Unknown`, not connected |

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sitesync_core::clock::{Clock, SystemClock};
use sitesync_core::config::NetworkConfig;
use sitesync_core::domain::{NetworkQuality, NetworkStatus, SyncRecommendation};
use sitesync_core::ports::{IConnectivityProbe, ProbeResult};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Number of successful probes the average latency is computed over
const LATENCY_WINDOW: usize = 20;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ============================================================================
// Quality thresholds
// ============================================================================

/// Latency bounds separating quality classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityThresholds {
    pub excellent: Duration,
    pub good: Duration,
}

impl QualityThresholds {
    pub fn from_config(config: &NetworkConfig) -> Self {
        Self {
            excellent: Duration::from_millis(config.excellent_latency_ms),
            good: Duration::from_millis(config.good_latency_ms),
        }
    }

    pub fn classify(&self, latency: Duration) -> NetworkQuality {
        if latency < self.excellent {
            NetworkQuality::Excellent
        } else if latency < self.good {
            NetworkQuality::Good
        } else {
            NetworkQuality::Poor
        }
    }
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            excellent: Duration::from_millis(300),
            good: Duration::from_millis(1000),
        }
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// Observability counters; they never gate a sync decision
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMetrics {
    pub checks: u64,
    pub failures: u64,
    /// Mean latency over the last successful probes
    pub average_latency_ms: Option<u64>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct MetricsState {
    checks: u64,
    failures: u64,
    latencies: VecDeque<Duration>,
    last_success: Option<DateTime<Utc>>,
    last_failure: Option<DateTime<Utc>>,
}

impl MetricsState {
    fn record(&mut self, result: &ProbeResult, at: DateTime<Utc>) {
        self.checks += 1;
        if result.reachable {
            if self.latencies.len() == LATENCY_WINDOW {
                self.latencies.pop_front();
            }
            self.latencies.push_back(result.latency);
            self.last_success = Some(at);
        } else {
            self.failures += 1;
            self.last_failure = Some(at);
        }
    }

    fn snapshot(&self) -> NetworkMetrics {
        let average_latency_ms = if self.latencies.is_empty() {
            None
        } else {
            let total: Duration = self.latencies.iter().sum();
            Some((total / self.latencies.len() as u32).as_millis() as u64)
        };
        NetworkMetrics {
            checks: self.checks,
            failures: self.failures,
            average_latency_ms,
            last_success: self.last_success,
            last_failure: self.last_failure,
        }
    }
}

// ============================================================================
// NetworkMonitor
// ============================================================================

/// Callback invoked with `(previous, current)` on every status change
pub type StatusListener = Arc<dyn Fn(&NetworkStatus, &NetworkStatus) + Send + Sync>;

/// Handle returned by [`NetworkMonitor::add_status_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub struct NetworkMonitor {
    probe: Arc<dyn IConnectivityProbe>,
    thresholds: QualityThresholds,
    clock: Arc<dyn Clock>,
    status: watch::Sender<NetworkStatus>,
    listeners: Mutex<Vec<(ListenerId, StatusListener)>>,
    next_listener: Mutex<u64>,
    metrics: Mutex<MetricsState>,
    monitor_task: Mutex<Option<JoinHandle<()>>>,
}

impl NetworkMonitor {
    pub fn new(probe: Arc<dyn IConnectivityProbe>, thresholds: QualityThresholds) -> Self {
        Self::with_clock(probe, thresholds, Arc::new(SystemClock))
    }

    pub fn with_clock(
        probe: Arc<dyn IConnectivityProbe>,
        thresholds: QualityThresholds,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (status, _) = watch::channel(NetworkStatus::unknown());
        Self {
            probe,
            thresholds,
            clock,
            status,
            listeners: Mutex::new(Vec::new()),
            next_listener: Mutex::new(0),
            metrics: Mutex::new(MetricsState::default()),
            monitor_task: Mutex::new(None),
        }
    }

    /// Seeds the status with one probe
    pub async fn initialize(&self) -> NetworkStatus {
        self.check_internet_connectivity().await;
        let status = self.get_network_status();
        info!(
            connected = status.connected,
            quality = %status.quality,
            "Network monitor initialized"
        );
        status
    }

    /// Re-probes every `interval` on a background task
    ///
    /// Replaces any monitoring task already running. The task holds only a
    /// weak reference, so dropping the monitor ends it.
    pub fn start_monitoring(self: &Arc<Self>, interval: Duration) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(monitor) = weak.upgrade() else {
                    break;
                };
                monitor.check_internet_connectivity().await;
            }
        });

        if let Some(previous) = lock(&self.monitor_task).replace(task) {
            previous.abort();
        }
        debug!(interval_secs = interval.as_secs(), "Network monitoring started");
    }

    /// Stops background probing; safe when not running
    pub fn stop_monitoring(&self) {
        if let Some(task) = lock(&self.monitor_task).take() {
            task.abort();
            debug!("Network monitoring stopped");
        }
    }

    pub fn is_monitoring(&self) -> bool {
        lock(&self.monitor_task)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Last known status; never blocks on the network
    pub fn get_network_status(&self) -> NetworkStatus {
        *self.status.borrow()
    }

    /// Probes now, updating status and metrics
    ///
    /// Bounded by the probe's own timeout.
    pub async fn check_internet_connectivity(&self) -> bool {
        let result = self.probe.probe().await;
        let now = self.clock.now();
        lock(&self.metrics).record(&result, now);

        let status = if result.reachable {
            NetworkStatus {
                connected: true,
                link_type: result.link_type,
                quality: self.thresholds.classify(result.latency),
            }
        } else {
            NetworkStatus {
                connected: false,
                link_type: result.link_type,
                quality: NetworkQuality::Unknown,
            }
        };
        debug!(
            reachable = result.reachable,
            latency_ms = result.latency.as_millis() as u64,
            quality = %status.quality,
            "Connectivity probe finished"
        );

        self.publish(status);
        result.reachable
    }

    /// Whether the current status favors a sync attempt
    pub fn get_sync_recommendation(&self) -> SyncRecommendation {
        SyncRecommendation::from_status(&self.get_network_status())
    }

    /// Registers a listener called with `(previous, current)` on every change
    pub fn add_status_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&NetworkStatus, &NetworkStatus) + Send + Sync + 'static,
    {
        let id = {
            let mut next = lock(&self.next_listener);
            *next += 1;
            ListenerId(*next)
        };
        lock(&self.listeners).push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener; returns whether it was registered
    pub fn remove_status_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Receiver that always holds the latest status
    pub fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.status.subscribe()
    }

    pub fn metrics(&self) -> NetworkMetrics {
        lock(&self.metrics).snapshot()
    }

    fn publish(&self, current: NetworkStatus) {
        let previous = self.status.send_replace(current);
        if previous == current {
            return;
        }

        if previous.connected != current.connected {
            if current.connected {
                info!(quality = %current.quality, "Network connection restored");
            } else {
                warn!("Network connection lost");
            }
        }

        // Listeners may register or remove listeners themselves.
        let listeners: Vec<StatusListener> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&previous, &current);
        }
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.monitor_task).take() {
            task.abort();
        }
    }
}
