//! Conflict domain entities
//!
//! A conflict records that an inbound record disagrees with a local record
//! that was modified after the watermark the inbound payload was computed
//! against. Both versions are kept as JSON snapshots so a reviewer can see
//! exactly what each side held.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::records::{EntityKind, RecordId};

/// How a conflict was or should be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// The authoritative store's version was kept
    KeepLocal,
    /// The inbound version was applied
    KeepRemote,
    /// Left for a human reviewer; nothing was applied
    Manual,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Resolution::KeepLocal => "keep_local",
            Resolution::KeepRemote => "keep_remote",
            Resolution::Manual => "manual",
        };
        f.write_str(s)
    }
}

/// A detected disagreement between a local and an inbound record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    id: Uuid,
    entity_type: EntityKind,
    entity_id: RecordId,
    local_version: serde_json::Value,
    remote_version: serde_json::Value,
    detected_at: DateTime<Utc>,
    resolution: Resolution,
}

impl Conflict {
    /// Creates a conflict with the resolution the policy chose
    pub fn new(
        entity_type: EntityKind,
        entity_id: RecordId,
        local_version: serde_json::Value,
        remote_version: serde_json::Value,
        resolution: Resolution,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_type,
            entity_id,
            local_version,
            remote_version,
            detected_at,
            resolution,
        }
    }

    pub fn id(&self) -> &Uuid {
        &self.id
    }

    pub fn entity_type(&self) -> EntityKind {
        self.entity_type
    }

    pub fn entity_id(&self) -> &RecordId {
        &self.entity_id
    }

    pub fn local_version(&self) -> &serde_json::Value {
        &self.local_version
    }

    pub fn remote_version(&self) -> &serde_json::Value {
        &self.remote_version
    }

    pub fn detected_at(&self) -> DateTime<Utc> {
        self.detected_at
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// True when the conflict still needs a human decision
    pub fn needs_review(&self) -> bool {
        self.resolution == Resolution::Manual
    }
}
