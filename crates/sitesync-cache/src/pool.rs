//! SQLite pool for the sync state database
//!
//! The schema version is kept in `PRAGMA user_version`. Opening a database
//! written by a newer schema fails instead of guessing at its layout.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::repository::SqliteSyncStateRepository;
use crate::CacheError;

/// Cursor and history tables; every statement is idempotent
const SCHEMA: &str = include_str!("migrations/20260301_initial.sql");

/// Value stored in `user_version` once [`SCHEMA`] is applied
pub const SCHEMA_VERSION: i64 = 1;

/// Owns the connections behind [`SqliteSyncStateRepository`]
///
/// Callers keep the pool alive for as long as a repository built from it
/// is in use.
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens the database at `db_path`, creating the file and its parent
    /// directories on first use
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::ConnectionFailed(format!("{}: {}", parent.display(), e))
            })?;
        }

        // The daemon and the CLI may hold the file at the same time
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = Self::connect(options, 5).await?;
        tracing::info!(path = %db_path.display(), "Sync state database opened");
        Ok(pool)
    }

    /// Private in-memory database; gone when the pool is dropped
    pub async fn in_memory() -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?;
        // Each connection to :memory: would see its own empty database
        Self::connect(options, 1).await
    }

    async fn connect(options: SqliteConnectOptions, max: u32) -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max)
            .connect_with(options)
            .await
            .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?;

        let db = Self { pool };
        db.prepare_schema().await?;
        Ok(db)
    }

    async fn prepare_schema(&self) -> Result<(), CacheError> {
        let found = self.schema_version().await?;
        if found > SCHEMA_VERSION {
            return Err(CacheError::MigrationFailed(format!(
                "database schema version {found} is newer than supported version {SCHEMA_VERSION}"
            )));
        }

        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| CacheError::MigrationFailed(e.to_string()))?;
        if found < SCHEMA_VERSION {
            sqlx::raw_sql(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))
                .execute(&self.pool)
                .await
                .map_err(|e| CacheError::MigrationFailed(e.to_string()))?;
            tracing::debug!(from = found, to = SCHEMA_VERSION, "Schema upgraded");
        }
        Ok(())
    }

    /// Schema version recorded in the database file
    pub async fn schema_version(&self) -> Result<i64, CacheError> {
        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await?;
        Ok(version)
    }

    /// Repository for the cursor and history tables of this database
    pub fn state_repository(&self) -> SqliteSyncStateRepository {
        SqliteSyncStateRepository::new(self.pool.clone())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
