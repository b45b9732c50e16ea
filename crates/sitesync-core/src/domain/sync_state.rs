//! Sync cursor, status snapshots, and history entries

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Boundary of already-synchronized data
///
/// `watermark` drives the lookback strategy, `revision` the revision
/// strategy. Both only move forward, except through [`SyncCursor::reset`]
/// which a forced full sync uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCursor {
    pub watermark: Option<DateTime<Utc>>,
    pub revision: Option<u64>,
}

impl SyncCursor {
    /// Advances the cursor after a successful sync
    ///
    /// Neither component ever moves backwards: a clock that stepped back or
    /// a change set with a lower max revision leaves the old value in place.
    pub fn advance(&mut self, now: DateTime<Utc>, max_revision: Option<u64>) {
        self.watermark = Some(match self.watermark {
            Some(current) if current > now => current,
            _ => now,
        });
        if let Some(new_rev) = max_revision {
            self.revision = Some(self.revision.map_or(new_rev, |cur| cur.max(new_rev)));
        }
    }

    /// Forgets everything that was synchronized
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Read-only snapshot returned by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub last_sync: Option<DateTime<Utc>>,
    pub is_in_progress: bool,
    pub next_sync: Option<DateTime<Utc>>,
    pub retry_count: u32,
}

/// Acknowledgement returned by the remote sync endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAck {
    pub success: bool,
}

/// What kind of sync produced a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    /// Delta push of a change set
    Incremental,
    /// Push after the cursor was reset
    Full,
    /// Inbound payload from a mobile device
    MobileIngest,
}

impl SyncType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncType::Incremental => "incremental",
            SyncType::Full => "full",
            SyncType::MobileIngest => "mobile_ingest",
        }
    }
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incremental" => Ok(SyncType::Incremental),
            "full" => Ok(SyncType::Full),
            "mobile_ingest" => Ok(SyncType::MobileIngest),
            other => Err(DomainError::UnknownVariant {
                kind: "sync type",
                value: other.to_string(),
            }),
        }
    }
}

/// Outcome recorded in a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncHistoryStatus {
    Success,
    Failed,
}

impl SyncHistoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncHistoryStatus::Success => "success",
            SyncHistoryStatus::Failed => "failed",
        }
    }
}

impl FromStr for SyncHistoryStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(SyncHistoryStatus::Success),
            "failed" => Ok(SyncHistoryStatus::Failed),
            other => Err(DomainError::UnknownVariant {
                kind: "sync status",
                value: other.to_string(),
            }),
        }
    }
}

/// One past sync, as stored locally and as served by the history endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncHistoryEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub sync_type: SyncType,
    pub status: SyncHistoryStatus,
    #[serde(default)]
    pub device_id: Option<String>,
    pub items_count: u64,
    /// Wall-clock duration in milliseconds
    pub duration: u64,
}
