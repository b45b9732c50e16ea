//! Sync state repository port
//!
//! The sync cursor (watermark and revision) is the only durable sync state
//! the engine owns. The repository also keeps a local log of sync attempts
//! shaped like the remote history endpoint's entries.

use crate::domain::{SyncCursor, SyncHistoryEntry};

/// Port trait for durable sync state
#[async_trait::async_trait]
pub trait ISyncStateRepository: Send + Sync {
    /// Loads the persisted cursor; an empty cursor if none was saved
    async fn load_cursor(&self) -> anyhow::Result<SyncCursor>;

    /// Persists the cursor
    async fn save_cursor(&self, cursor: &SyncCursor) -> anyhow::Result<()>;

    /// Removes the persisted cursor so the next sync starts from scratch
    async fn clear_cursor(&self) -> anyhow::Result<()>;

    /// Appends an entry to the local sync history
    async fn record_history(&self, entry: &SyncHistoryEntry) -> anyhow::Result<()>;

    /// Returns the most recent history entries, newest first
    async fn recent_history(&self, limit: u32) -> anyhow::Result<Vec<SyncHistoryEntry>>;
}
