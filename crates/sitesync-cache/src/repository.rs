//! SQLite implementation of ISyncStateRepository
//!
//! Timestamps are stored as RFC 3339 text with nanosecond precision and a
//! `Z` suffix, so text ordering matches chronological ordering. The cursor
//! lives in a single row with `id = 1`.

use chrono::{DateTime, SecondsFormat, Utc};
use sitesync_core::domain::{SyncCursor, SyncHistoryEntry};
use sitesync_core::ports::ISyncStateRepository;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

use crate::CacheError;

/// SQLite-based implementation of the sync state repository port
#[derive(Clone)]
pub struct SqliteSyncStateRepository {
    pool: SqlitePool,
}

impl SqliteSyncStateRepository {
    /// Creates a repository over an already-migrated pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Conversion helpers
// ============================================================================

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a DateTime<Utc> from an RFC 3339 string
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            CacheError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

fn to_sql_int(value: u64, what: &str) -> Result<i64, CacheError> {
    i64::try_from(value)
        .map_err(|_| CacheError::SerializationError(format!("{what} {value} exceeds i64 range")))
}

fn from_sql_int(value: i64, what: &str) -> Result<u64, CacheError> {
    u64::try_from(value)
        .map_err(|_| CacheError::SerializationError(format!("negative {what}: {value}")))
}

fn cursor_from_row(row: &SqliteRow) -> Result<SyncCursor, CacheError> {
    let watermark: Option<String> = row.get("watermark");
    let revision: Option<i64> = row.get("revision");
    Ok(SyncCursor {
        watermark: watermark.as_deref().map(parse_datetime).transpose()?,
        revision: revision.map(|r| from_sql_int(r, "revision")).transpose()?,
    })
}

fn history_entry_from_row(row: &SqliteRow) -> Result<SyncHistoryEntry, CacheError> {
    let timestamp: String = row.get("timestamp");
    let sync_type: String = row.get("sync_type");
    let status: String = row.get("status");
    let items_count: i64 = row.get("items_count");
    let duration_ms: i64 = row.get("duration_ms");

    Ok(SyncHistoryEntry {
        timestamp: parse_datetime(&timestamp)?,
        sync_type: sync_type
            .parse()
            .map_err(|e| CacheError::SerializationError(format!("{e}")))?,
        status: status
            .parse()
            .map_err(|e| CacheError::SerializationError(format!("{e}")))?,
        device_id: row.get("device_id"),
        items_count: from_sql_int(items_count, "items_count")?,
        duration: from_sql_int(duration_ms, "duration_ms")?,
    })
}

// ============================================================================
// ISyncStateRepository implementation
// ============================================================================

#[async_trait::async_trait]
impl ISyncStateRepository for SqliteSyncStateRepository {
    async fn load_cursor(&self) -> anyhow::Result<SyncCursor> {
        let row = sqlx::query("SELECT watermark, revision FROM sync_cursor WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(CacheError::from)?;

        match row {
            Some(ref r) => Ok(cursor_from_row(r)?),
            None => Ok(SyncCursor::default()),
        }
    }

    async fn save_cursor(&self, cursor: &SyncCursor) -> anyhow::Result<()> {
        let watermark = cursor.watermark.as_ref().map(format_datetime);
        let revision = cursor
            .revision
            .map(|r| to_sql_int(r, "revision"))
            .transpose()?;

        sqlx::query(
            "INSERT INTO sync_cursor (id, watermark, revision, updated_at) \
             VALUES (1, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
             watermark = excluded.watermark, \
             revision = excluded.revision, \
             updated_at = excluded.updated_at",
        )
        .bind(&watermark)
        .bind(revision)
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(CacheError::from)?;

        tracing::trace!(?watermark, ?revision, "Saved sync cursor");
        Ok(())
    }

    async fn clear_cursor(&self) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM sync_cursor")
            .execute(&self.pool)
            .await
            .map_err(CacheError::from)?;

        tracing::debug!("Cleared sync cursor");
        Ok(())
    }

    async fn record_history(&self, entry: &SyncHistoryEntry) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO sync_history \
             (timestamp, sync_type, status, device_id, items_count, duration_ms) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(format_datetime(&entry.timestamp))
        .bind(entry.sync_type.as_str())
        .bind(entry.status.as_str())
        .bind(&entry.device_id)
        .bind(to_sql_int(entry.items_count, "items_count")?)
        .bind(to_sql_int(entry.duration, "duration")?)
        .execute(&self.pool)
        .await
        .map_err(CacheError::from)?;

        tracing::trace!(sync_type = %entry.sync_type, "Recorded sync history entry");
        Ok(())
    }

    async fn recent_history(&self, limit: u32) -> anyhow::Result<Vec<SyncHistoryEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM sync_history ORDER BY timestamp DESC, id DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(CacheError::from)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(history_entry_from_row(row)?);
        }
        Ok(entries)
    }
}
