//! Integration tests for mobile payload ingestion
//!
//! Payloads and the seeded store use the same JSON the mobile client and the
//! snapshot file carry.

use std::sync::Arc;

use sitesync_conflict::{ConflictPolicy, MobileIngestor};
use sitesync_core::domain::{
    AssignmentStatus, EntityKind, MobileSyncPayload, Resolution, SyncHistoryStatus, SyncType,
};
use sitesync_core::memory::{InMemorySyncStateRepository, InMemoryWorkforceStore, WorkforceSnapshot};
use sitesync_core::ports::{ISyncStateRepository, IWorkforceStore};

const SNAPSHOT: &str = r#"{
    "assignments": [
        {"id": "a-1", "userId": "u-1", "siteId": "s-1", "status": "scheduled",
         "updatedAt": "2026-03-01T10:00:00Z", "revision": 2}
    ],
    "shifts": [
        {"id": "sh-1", "userId": "u-1", "siteId": "s-1",
         "clockIn": "2026-03-02T06:30:00Z", "clockOut": "2026-03-02T15:00:00Z",
         "breakMinutes": 30, "updatedAt": "2026-03-02T09:00:00Z", "revision": 4}
    ]
}"#;

const PAYLOAD: &str = r#"{
    "deviceId": "tablet-7",
    "timestamp": "2026-03-02T17:05:00Z",
    "metadata": {"baseWatermark": "2026-03-02T06:00:00Z", "appVersion": "2.4.1", "platform": "android"},
    "shifts": [
        {"id": "sh-1", "userId": "u-1", "siteId": "s-1",
         "clockIn": "2026-03-02T06:30:00Z", "clockOut": "2026-03-02T15:00:00Z",
         "breakMinutes": 45, "updatedAt": "2026-03-02T17:00:00Z"},
        {"id": "sh-2", "userId": "u-2", "siteId": "s-1",
         "clockIn": "2026-03-02T07:00:00Z", "updatedAt": "2026-03-02T07:00:00Z"}
    ],
    "assignments": [
        {"id": "a-1", "userId": "u-1", "siteId": "s-1", "status": "active",
         "updatedAt": "2026-03-02T17:00:00Z"},
        {"id": "a-9", "userId": "u-3", "siteId": "s-2", "status": "active",
         "updatedAt": "2026-03-02T17:00:00Z"}
    ],
    "users": [
        {"id": "u-2", "name": "Bea", "role": "worker", "updatedAt": "2026-03-02T07:00:00Z"}
    ]
}"#;

fn store() -> Arc<InMemoryWorkforceStore> {
    let snapshot: WorkforceSnapshot = serde_json::from_str(SNAPSHOT).unwrap();
    Arc::new(InMemoryWorkforceStore::from_snapshot(snapshot))
}

fn payload() -> MobileSyncPayload {
    serde_json::from_str(PAYLOAD).unwrap()
}

#[tokio::test]
async fn test_manual_policy_merges_clean_records_and_defers_conflicts() {
    let store = store();
    let history = Arc::new(InMemorySyncStateRepository::new());
    let ingestor =
        MobileIngestor::new(store.clone(), ConflictPolicy::Manual).with_history(history.clone());

    let report = ingestor.ingest(&payload()).await;

    assert!(report.success);
    assert_eq!(report.applied, 2, "new shift and clean assignment");
    assert_eq!(report.skipped, 1, "unknown assignment");
    assert_eq!(report.reference_records, 1);
    assert_eq!(report.conflicts.len(), 1);

    let conflict = &report.conflicts[0];
    assert_eq!(conflict.entity_type(), EntityKind::Shift);
    assert_eq!(conflict.entity_id().as_str(), "sh-1");
    assert_eq!(conflict.resolution(), Resolution::Manual);
    assert_eq!(conflict.local_version()["breakMinutes"], 30);
    assert_eq!(conflict.remote_version()["breakMinutes"], 45);
    assert_eq!(report.pending_review().count(), 1);

    let shifts = store.get_all_shifts().await.unwrap();
    assert_eq!(shifts.len(), 2);
    let sh1 = shifts.iter().find(|s| s.id.as_str() == "sh-1").unwrap();
    assert_eq!(sh1.break_minutes, 30, "conflicting shift left untouched");

    let assignments = store.get_all_assignments().await.unwrap();
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].status, AssignmentStatus::Active);
    assert!(store.get_all_users().await.unwrap().is_empty());

    let entries = history.recent_history(5).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].sync_type, SyncType::MobileIngest);
    assert_eq!(entries[0].status, SyncHistoryStatus::Success);
    assert_eq!(entries[0].device_id.as_deref(), Some("tablet-7"));
    assert_eq!(entries[0].items_count, 2);
}

#[tokio::test]
async fn test_payload_without_base_watermark_is_applied_under_default_policy() {
    let mut raw: serde_json::Value = serde_json::from_str(PAYLOAD).unwrap();
    raw["metadata"].as_object_mut().unwrap().remove("baseWatermark");
    let payload: MobileSyncPayload = serde_json::from_value(raw).unwrap();
    assert!(payload.metadata.base_watermark.is_none());

    let store = store();
    let ingestor = MobileIngestor::new(store.clone(), ConflictPolicy::from_config("manual"));
    let report = ingestor.ingest(&payload).await;

    assert!(report.success);
    assert_eq!(report.applied, 3, "replaced shift, new shift, updated assignment");
    assert_eq!(report.skipped, 1);
    assert!(report.conflicts.is_empty());

    let shifts = store.get_all_shifts().await.unwrap();
    let sh1 = shifts.iter().find(|s| s.id.as_str() == "sh-1").unwrap();
    assert_eq!(sh1.break_minutes, 45);
    let assignments = store.get_all_assignments().await.unwrap();
    assert_eq!(assignments[0].status, AssignmentStatus::Active);
}

#[tokio::test]
async fn test_newest_wins_applies_the_later_device_edit() {
    let store = store();
    let ingestor = MobileIngestor::new(store.clone(), ConflictPolicy::NewestWins);

    let report = ingestor.ingest(&payload()).await;

    assert!(report.success);
    assert_eq!(report.applied, 3);
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].resolution(), Resolution::KeepRemote);
    assert_eq!(report.pending_review().count(), 0);

    let shifts = store.get_all_shifts().await.unwrap();
    let sh1 = shifts.iter().find(|s| s.id.as_str() == "sh-1").unwrap();
    assert_eq!(sh1.break_minutes, 45);
}

#[tokio::test]
async fn test_report_json_uses_wire_names() {
    let ingestor = MobileIngestor::new(store(), ConflictPolicy::KeepLocal);
    let report = ingestor.ingest(&payload()).await;

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["referenceRecords"], 1);
    assert_eq!(json["conflicts"][0]["entityType"], "shift");
    assert_eq!(json["conflicts"][0]["resolution"], "keep_local");
    assert!(json.get("error").is_none());
}
