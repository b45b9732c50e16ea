//! Sync transport port
//!
//! The remote sync endpoint as seen by the orchestrator. Errors are
//! already classified ([`TransportError`]) so the orchestrator can decide
//! on retries without inspecting error strings.

use crate::domain::{ChangeSet, SyncAck, SyncHistoryEntry, TransportError};

/// Port trait for the remote sync endpoint
#[async_trait::async_trait]
pub trait ISyncTransport: Send + Sync {
    /// Returns true when an access token is available to authenticate with
    fn has_credentials(&self) -> bool;

    /// Transmits a change set
    async fn push_change_set(
        &self,
        change_set: &ChangeSet,
        device_id: Option<&str>,
    ) -> Result<SyncAck, TransportError>;

    /// Reads the server-side sync history
    async fn fetch_history(&self, limit: u32) -> Result<Vec<SyncHistoryEntry>, TransportError>;
}
