//! SiteSync Cache - Local sync state persistence
//!
//! SQLite-based storage for:
//! - The sync cursor (watermark and last synced revision)
//! - A local log of sync attempts
//!
//! ## Architecture
//!
//! This crate implements the `ISyncStateRepository` port from
//! `sitesync-core` using SQLite as the storage backend. It is a driven
//! (secondary) adapter in the hexagonal architecture.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use sitesync_cache::DatabasePool;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/sitesync/sitesync.db")).await?;
//! let repo = pool.state_repository();
//! // Use repo as ISyncStateRepository...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::SqliteSyncStateRepository;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be converted back into a domain type
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}
