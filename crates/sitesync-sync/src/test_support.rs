//! Scripted fakes for the transport and connectivity ports

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sitesync_core::domain::{
    ChangeSet, FailureClass, LinkType, SyncAck, SyncHistoryEntry, TransportError,
};
use sitesync_core::ports::{IConnectivityProbe, ISyncTransport, ProbeResult};

// ============================================================================
// FakeProbe
// ============================================================================

pub struct FakeProbe {
    result: Mutex<ProbeResult>,
    probes: AtomicUsize,
}

impl FakeProbe {
    pub fn online(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(ProbeResult {
                reachable: true,
                latency,
                link_type: LinkType::Wifi,
            }),
            probes: AtomicUsize::new(0),
        })
    }

    pub fn offline() -> Arc<Self> {
        let probe = Self::online(Duration::ZERO);
        probe.set_offline();
        probe
    }

    pub fn set_online(&self, latency: Duration) {
        *self.result.lock().unwrap() = ProbeResult {
            reachable: true,
            latency,
            link_type: LinkType::Wifi,
        };
    }

    pub fn set_offline(&self) {
        *self.result.lock().unwrap() = ProbeResult {
            reachable: false,
            latency: Duration::ZERO,
            link_type: LinkType::None,
        };
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IConnectivityProbe for FakeProbe {
    async fn probe(&self) -> ProbeResult {
        self.probes.fetch_add(1, Ordering::SeqCst);
        *self.result.lock().unwrap()
    }
}

// ============================================================================
// FakeTransport
// ============================================================================

/// Transport that replays scripted results, then acknowledges everything
pub struct FakeTransport {
    credentials: AtomicBool,
    script: Mutex<VecDeque<Result<SyncAck, TransportError>>>,
    pushed: Mutex<Vec<ChangeSet>>,
    delay: Mutex<Duration>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            credentials: AtomicBool::new(true),
            script: Mutex::new(VecDeque::new()),
            pushed: Mutex::new(Vec::new()),
            delay: Mutex::new(Duration::ZERO),
        })
    }

    pub fn set_credentials(&self, present: bool) {
        self.credentials.store(present, Ordering::SeqCst);
    }

    /// Queues a failure of the given class for the next push
    pub fn fail_next(&self, class: FailureClass, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(TransportError::new(class, message)));
    }

    /// Makes every push take `delay` of (tokio) time
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn push_count(&self) -> usize {
        self.pushed.lock().unwrap().len()
    }

    pub fn pushed(&self) -> Vec<ChangeSet> {
        self.pushed.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ISyncTransport for FakeTransport {
    fn has_credentials(&self) -> bool {
        self.credentials.load(Ordering::SeqCst)
    }

    async fn push_change_set(
        &self,
        change_set: &ChangeSet,
        _device_id: Option<&str>,
    ) -> Result<SyncAck, TransportError> {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.pushed.lock().unwrap().push(change_set.clone());
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or(Ok(SyncAck { success: true }))
    }

    async fn fetch_history(&self, _limit: u32) -> Result<Vec<SyncHistoryEntry>, TransportError> {
        Ok(Vec::new())
    }
}
