//! Error types for mobile ingestion

use sitesync_core::domain::EntityKind;
use thiserror::Error;

/// Errors that abort the ingestion of a payload
///
/// Records applied before the error stay applied.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A record could not be snapshotted for comparison
    #[error("failed to serialize {kind} {id}: {source}")]
    Snapshot {
        kind: EntityKind,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// The workforce store failed a read or write
    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}
