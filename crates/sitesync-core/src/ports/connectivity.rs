//! Connectivity probe port
//!
//! The network monitor owns classification; a probe only reports whether
//! the server answered, how long it took, and which link was used when the
//! platform knows.

use std::time::Duration;

use crate::domain::LinkType;

/// Result of one reachability probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub reachable: bool,
    pub latency: Duration,
    pub link_type: LinkType,
}

/// Port trait for reachability probes
#[async_trait::async_trait]
pub trait IConnectivityProbe: Send + Sync {
    /// Performs one probe; must finish within the adapter's own timeout
    async fn probe(&self) -> ProbeResult;
}
