//! Inbound payloads from edge devices

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::records::{Assignment, Shift, Site, User};

/// Device-side context attached to a payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadMetadata {
    /// Watermark the device computed this payload against. Local records
    /// modified after it may disagree with the payload.
    #[serde(default)]
    pub base_watermark: Option<DateTime<Utc>>,
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
}

/// Bundle of records uploaded by a mobile worker client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileSyncPayload {
    #[serde(default)]
    pub shifts: Vec<Shift>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub sites: Vec<Site>,
    #[serde(default)]
    pub metadata: PayloadMetadata,
    pub timestamp: DateTime<Utc>,
    pub device_id: String,
}

impl MobileSyncPayload {
    /// Total number of records in the payload
    pub fn record_count(&self) -> usize {
        self.shifts.len() + self.assignments.len() + self.users.len() + self.sites.len()
    }
}
