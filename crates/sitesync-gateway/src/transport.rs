//! Port adapters over [`RequestGateway`]

use std::sync::Arc;

use sitesync_core::domain::{ChangeSet, LinkType, SyncAck, SyncHistoryEntry, TransportError};
use sitesync_core::ports::{IConnectivityProbe, ISyncTransport, ProbeResult};

use crate::client::RequestGateway;

#[async_trait::async_trait]
impl ISyncTransport for RequestGateway {
    fn has_credentials(&self) -> bool {
        self.has_access_token()
    }

    async fn push_change_set(
        &self,
        change_set: &ChangeSet,
        device_id: Option<&str>,
    ) -> Result<SyncAck, TransportError> {
        Ok(RequestGateway::push_change_set(self, change_set, device_id).await?)
    }

    async fn fetch_history(&self, limit: u32) -> Result<Vec<SyncHistoryEntry>, TransportError> {
        Ok(self.fetch_sync_history(limit).await?)
    }
}

/// Connectivity probe that hits the server's health endpoint
///
/// An HTTP probe cannot see the physical link, so a reachable server
/// reports [`LinkType::Unknown`] and an unreachable one [`LinkType::None`].
pub struct HealthProbe {
    gateway: Arc<RequestGateway>,
}

impl HealthProbe {
    pub fn new(gateway: Arc<RequestGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait::async_trait]
impl IConnectivityProbe for HealthProbe {
    async fn probe(&self) -> ProbeResult {
        let (reachable, latency) = self.gateway.probe_health().await;
        ProbeResult {
            reachable,
            latency,
            link_type: if reachable {
                LinkType::Unknown
            } else {
                LinkType::None
            },
        }
    }
}
