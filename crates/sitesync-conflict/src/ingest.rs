//! Mobile payload ingestion
//!
//! Merges a [`MobileSyncPayload`] into the workforce store:
//!
//! - Shifts are upserted by id.
//! - Assignments are overwritten field by field; ids unknown to the store
//!   are skipped.
//! - Users and sites are reference data owned by the admin side. They are
//!   counted but never applied.
//!
//! Records are written one at a time. An error stops the merge and the
//! report says `success: false`, but whatever was written before the error
//! stays written.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sitesync_core::clock::{Clock, SystemClock};
use sitesync_core::domain::{
    AssignmentPatch, Conflict, MobileSyncPayload, RecordId, Resolution, SyncHistoryEntry,
    SyncHistoryStatus, SyncType, TrackedRecord,
};
use sitesync_core::ports::{ISyncStateRepository, IWorkforceStore};
use tracing::{debug, error, info, warn};

use crate::detector::{ConflictDetector, Detection};
use crate::error::IngestError;
use crate::policy::ConflictPolicy;

/// What one `ingest` call did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub success: bool,
    /// Records written to the store
    pub applied: usize,
    /// Records identical to the local version
    pub unchanged: usize,
    /// Records that could not be applied (unknown assignment ids)
    pub skipped: usize,
    /// Users and sites received but not applied
    pub reference_records: usize,
    pub conflicts: Vec<Conflict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IngestReport {
    /// Conflicts still waiting for a human decision
    pub fn pending_review(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter().filter(|c| c.needs_review())
    }
}

pub struct MobileIngestor {
    store: Arc<dyn IWorkforceStore>,
    policy: ConflictPolicy,
    clock: Arc<dyn Clock>,
    history: Option<Arc<dyn ISyncStateRepository>>,
}

impl MobileIngestor {
    pub fn new(store: Arc<dyn IWorkforceStore>, policy: ConflictPolicy) -> Self {
        Self {
            store,
            policy,
            clock: Arc::new(SystemClock),
            history: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Records a history entry for every ingested payload
    pub fn with_history(mut self, repo: Arc<dyn ISyncStateRepository>) -> Self {
        self.history = Some(repo);
        self
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    #[tracing::instrument(
        skip(self, payload),
        fields(device_id = %payload.device_id, records = payload.record_count())
    )]
    pub async fn ingest(&self, payload: &MobileSyncPayload) -> IngestReport {
        let started = Instant::now();
        let mut report = IngestReport {
            reference_records: payload.users.len() + payload.sites.len(),
            ..Default::default()
        };
        if report.reference_records > 0 {
            debug!(
                users = payload.users.len(),
                sites = payload.sites.len(),
                "Payload carries reference records; not applied"
            );
        }

        match self.merge(payload, &mut report).await {
            Ok(()) => {
                report.success = true;
                info!(
                    applied = report.applied,
                    unchanged = report.unchanged,
                    skipped = report.skipped,
                    conflicts = report.conflicts.len(),
                    "Payload ingested"
                );
            }
            Err(e) => {
                error!(error = %e, applied = report.applied, "Payload ingestion failed");
                report.error = Some(e.to_string());
            }
        }

        self.record_history(payload, &report, started).await;
        report
    }

    async fn merge(
        &self,
        payload: &MobileSyncPayload,
        report: &mut IngestReport,
    ) -> Result<(), IngestError> {
        let base = payload.metadata.base_watermark;

        if !payload.shifts.is_empty() {
            let local: HashMap<RecordId, _> = self
                .store
                .get_all_shifts()
                .await?
                .into_iter()
                .map(|s| (s.id.clone(), s))
                .collect();

            for incoming in &payload.shifts {
                let existing = local.get(&incoming.id);
                let detection = ConflictDetector::check(existing, incoming, base)?;
                if self.resolve(existing, incoming, detection, report) {
                    self.store.upsert_shift(incoming).await?;
                    report.applied += 1;
                }
            }
        }

        if !payload.assignments.is_empty() {
            let local: HashMap<RecordId, _> = self
                .store
                .get_all_assignments()
                .await?
                .into_iter()
                .map(|a| (a.id.clone(), a))
                .collect();

            for incoming in &payload.assignments {
                let Some(existing) = local.get(&incoming.id) else {
                    warn!(id = %incoming.id, "Skipping assignment unknown to the store");
                    report.skipped += 1;
                    continue;
                };
                let detection = ConflictDetector::check(Some(existing), incoming, base)?;
                if !self.resolve(Some(existing), incoming, detection, report) {
                    continue;
                }

                let patch = AssignmentPatch::overwrite_from(incoming);
                match self.store.update_assignment(&incoming.id, &patch).await? {
                    Some(_) => report.applied += 1,
                    None => {
                        warn!(id = %incoming.id, "Assignment disappeared during ingestion");
                        report.skipped += 1;
                    }
                }
            }
        }

        Ok(())
    }

    /// Turns a detection into a write decision, recording any conflict
    fn resolve<R: TrackedRecord>(
        &self,
        local: Option<&R>,
        incoming: &R,
        detection: Detection,
        report: &mut IngestReport,
    ) -> bool {
        match detection {
            Detection::New | Detection::Clean => true,
            Detection::Unchanged => {
                report.unchanged += 1;
                false
            }
            Detection::Conflicted {
                local: local_json,
                remote: remote_json,
            } => {
                let local_updated = local.map_or(DateTime::<Utc>::MIN_UTC, |l| l.updated_at());
                let resolution = self.policy.decide(local_updated, incoming.updated_at());
                warn!(
                    kind = %R::KIND,
                    id = %incoming.record_id(),
                    %resolution,
                    "Conflict detected"
                );
                report.conflicts.push(Conflict::new(
                    R::KIND,
                    incoming.record_id().clone(),
                    local_json,
                    remote_json,
                    resolution,
                    self.clock.now(),
                ));
                resolution == Resolution::KeepRemote
            }
        }
    }

    async fn record_history(
        &self,
        payload: &MobileSyncPayload,
        report: &IngestReport,
        started: Instant,
    ) {
        let Some(repo) = &self.history else {
            return;
        };
        let entry = SyncHistoryEntry {
            timestamp: self.clock.now(),
            sync_type: SyncType::MobileIngest,
            status: if report.success {
                SyncHistoryStatus::Success
            } else {
                SyncHistoryStatus::Failed
            },
            device_id: Some(payload.device_id.clone()),
            items_count: report.applied as u64,
            duration: started.elapsed().as_millis() as u64,
        };
        if let Err(e) = repo.record_history(&entry).await {
            warn!(error = %format!("{e:#}"), "Failed to record ingestion history");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{Duration, TimeZone};
    use sitesync_core::clock::ManualClock;
    use sitesync_core::domain::{
        Assignment, AssignmentStatus, EntityKind, PayloadMetadata, Shift, Site, User, UserRole,
    };
    use sitesync_core::memory::{
        InMemorySyncStateRepository, InMemoryWorkforceStore, WorkforceSnapshot,
    };

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap()
    }

    fn id(s: &str) -> RecordId {
        RecordId::new(s).unwrap()
    }

    fn shift(sid: &str, break_minutes: u32, updated_at: DateTime<Utc>) -> Shift {
        Shift {
            id: id(sid),
            user_id: id("u-1"),
            site_id: id("s-1"),
            assignment_id: Some(id("a-1")),
            clock_in: t0(),
            clock_out: Some(t0() + Duration::hours(8)),
            break_minutes,
            notes: None,
            updated_at,
            revision: 0,
        }
    }

    fn assignment(aid: &str, status: AssignmentStatus, updated_at: DateTime<Utc>) -> Assignment {
        Assignment {
            id: id(aid),
            user_id: id("u-1"),
            site_id: id("s-1"),
            status,
            start_date: None,
            end_date: None,
            notes: None,
            updated_at,
            revision: 1,
        }
    }

    fn payload(base: Option<DateTime<Utc>>) -> MobileSyncPayload {
        MobileSyncPayload {
            shifts: Vec::new(),
            assignments: Vec::new(),
            users: Vec::new(),
            sites: Vec::new(),
            metadata: PayloadMetadata {
                base_watermark: base,
                app_version: Some("2.4.1".into()),
                platform: Some("android".into()),
            },
            timestamp: t0() + Duration::hours(9),
            device_id: "phone-42".into(),
        }
    }

    /// Store seeded with one shift and one assignment, both edited at `local_edit`
    fn store(local_edit: DateTime<Utc>) -> Arc<InMemoryWorkforceStore> {
        Arc::new(InMemoryWorkforceStore::with_clock(
            WorkforceSnapshot {
                assignments: vec![assignment("a-1", AssignmentStatus::Scheduled, local_edit)],
                shifts: vec![shift("sh-1", 30, local_edit)],
                ..Default::default()
            },
            Arc::new(ManualClock::new(t0() + Duration::hours(10))),
        ))
    }

    fn ingestor(store: Arc<InMemoryWorkforceStore>, policy: ConflictPolicy) -> MobileIngestor {
        MobileIngestor::new(store, policy)
            .with_clock(Arc::new(ManualClock::new(t0() + Duration::hours(10))))
    }

    #[tokio::test]
    async fn new_and_existing_shifts_are_upserted() {
        let store = store(t0());
        let mut p = payload(Some(t0() + Duration::hours(1)));
        p.shifts = vec![
            shift("sh-1", 45, t0() + Duration::hours(9)),
            shift("sh-2", 15, t0() + Duration::hours(9)),
        ];

        let report = ingestor(store.clone(), ConflictPolicy::Manual).ingest(&p).await;
        assert!(report.success);
        assert_eq!(report.applied, 2);
        assert!(report.conflicts.is_empty());

        let shifts = store.snapshot().shifts;
        assert_eq!(shifts.len(), 2);
        assert_eq!(shifts[0].break_minutes, 45);
        assert_eq!(shifts[1].id.as_str(), "sh-2");
    }

    #[tokio::test]
    async fn assignments_are_overwritten_and_unknown_ids_skipped() {
        let store = store(t0());
        let mut p = payload(Some(t0() + Duration::hours(1)));
        p.assignments = vec![
            assignment("a-1", AssignmentStatus::Completed, t0() + Duration::hours(9)),
            assignment("a-404", AssignmentStatus::Active, t0() + Duration::hours(9)),
        ];

        let report = ingestor(store.clone(), ConflictPolicy::Manual).ingest(&p).await;
        assert!(report.success);
        assert_eq!(report.applied, 1);
        assert_eq!(report.skipped, 1);

        let assignments = store.snapshot().assignments;
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].status, AssignmentStatus::Completed);
        assert_eq!(assignments[0].updated_at, t0() + Duration::hours(9));
        assert_eq!(assignments[0].revision, 2);
    }

    #[tokio::test]
    async fn reference_records_are_counted_not_applied() {
        let store = store(t0());
        let mut p = payload(None);
        p.users = vec![User {
            id: id("u-9"),
            name: "Sam Okafor".into(),
            phone: None,
            role: UserRole::Worker,
            active: true,
            updated_at: t0(),
            revision: 0,
        }];
        p.sites = vec![Site {
            id: id("s-9"),
            name: "Depot".into(),
            address: None,
            active: true,
            updated_at: t0(),
            revision: 0,
        }];

        let report = ingestor(store.clone(), ConflictPolicy::RemoteWins).ingest(&p).await;
        assert!(report.success);
        assert_eq!(report.reference_records, 2);
        assert_eq!(report.applied, 0);
        assert!(store.snapshot().users.is_empty());
        assert!(store.snapshot().sites.is_empty());
    }

    #[tokio::test]
    async fn identical_records_are_not_rewritten() {
        let store = store(t0());
        let mut p = payload(Some(t0() + Duration::hours(1)));
        p.shifts = vec![shift("sh-1", 30, t0() + Duration::hours(9))];

        let report = ingestor(store.clone(), ConflictPolicy::Manual).ingest(&p).await;
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.applied, 0);
        assert_eq!(store.snapshot().shifts[0].updated_at, t0());
    }

    // ------------------------------------------------------------------------
    // Conflicts
    // ------------------------------------------------------------------------

    /// Local edits at t0+3h against a payload based on t0+2h
    fn conflicting_payload() -> MobileSyncPayload {
        let mut p = payload(Some(t0() + Duration::hours(2)));
        p.shifts = vec![shift("sh-1", 45, t0() + Duration::hours(9))];
        p.assignments = vec![assignment(
            "a-1",
            AssignmentStatus::Cancelled,
            t0() + Duration::hours(1),
        )];
        p
    }

    #[tokio::test]
    async fn manual_policy_defers_conflicts() {
        let store = store(t0() + Duration::hours(3));
        let report = ingestor(store.clone(), ConflictPolicy::Manual)
            .ingest(&conflicting_payload())
            .await;

        assert!(report.success);
        assert_eq!(report.applied, 0);
        assert_eq!(report.conflicts.len(), 2);
        assert_eq!(report.pending_review().count(), 2);
        assert_eq!(report.conflicts[0].entity_type(), EntityKind::Shift);
        assert_eq!(report.conflicts[0].local_version()["breakMinutes"], 30);
        assert_eq!(report.conflicts[0].remote_version()["breakMinutes"], 45);
        assert_eq!(report.conflicts[1].entity_type(), EntityKind::Assignment);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.shifts[0].break_minutes, 30);
        assert_eq!(snapshot.assignments[0].status, AssignmentStatus::Scheduled);
    }

    #[tokio::test]
    async fn remote_wins_applies_and_reports() {
        let store = store(t0() + Duration::hours(3));
        let report = ingestor(store.clone(), ConflictPolicy::RemoteWins)
            .ingest(&conflicting_payload())
            .await;

        assert_eq!(report.applied, 2);
        assert_eq!(report.conflicts.len(), 2);
        assert_eq!(report.pending_review().count(), 0);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.shifts[0].break_minutes, 45);
        assert_eq!(snapshot.assignments[0].status, AssignmentStatus::Cancelled);
    }

    #[tokio::test]
    async fn newest_wins_compares_timestamps() {
        let store = store(t0() + Duration::hours(3));
        let report = ingestor(store.clone(), ConflictPolicy::NewestWins)
            .ingest(&conflicting_payload())
            .await;

        // The shift is newer on the device, the assignment newer locally
        assert_eq!(report.applied, 1);
        assert_eq!(report.conflicts[0].resolution(), Resolution::KeepRemote);
        assert_eq!(report.conflicts[1].resolution(), Resolution::KeepLocal);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.shifts[0].break_minutes, 45);
        assert_eq!(snapshot.assignments[0].status, AssignmentStatus::Scheduled);
    }

    #[tokio::test]
    async fn keep_local_never_writes_conflicting_records() {
        let store = store(t0() + Duration::hours(3));
        let report = ingestor(store.clone(), ConflictPolicy::KeepLocal)
            .ingest(&conflicting_payload())
            .await;
        assert_eq!(report.applied, 0);
        assert!(report
            .conflicts
            .iter()
            .all(|c| c.resolution() == Resolution::KeepLocal));
    }

    // ------------------------------------------------------------------------
    // Failure and history
    // ------------------------------------------------------------------------

    /// Delegates to an in-memory store but fails after `budget` shift writes
    struct FlakyStore {
        inner: InMemoryWorkforceStore,
        budget: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl IWorkforceStore for FlakyStore {
        async fn get_all_assignments(&self) -> anyhow::Result<Vec<Assignment>> {
            self.inner.get_all_assignments().await
        }

        async fn get_construction_sites(&self) -> anyhow::Result<Vec<Site>> {
            self.inner.get_construction_sites().await
        }

        async fn get_all_users(&self) -> anyhow::Result<Vec<User>> {
            self.inner.get_all_users().await
        }

        async fn update_assignment(
            &self,
            id: &RecordId,
            patch: &AssignmentPatch,
        ) -> anyhow::Result<Option<Assignment>> {
            self.inner.update_assignment(id, patch).await
        }

        async fn get_all_shifts(&self) -> anyhow::Result<Vec<Shift>> {
            self.inner.get_all_shifts().await
        }

        async fn upsert_shift(&self, shift: &Shift) -> anyhow::Result<()> {
            if self.budget.load(Ordering::SeqCst) == 0 {
                anyhow::bail!("disk full");
            }
            self.budget.fetch_sub(1, Ordering::SeqCst);
            self.inner.upsert_shift(shift).await
        }
    }

    #[tokio::test]
    async fn failure_keeps_already_applied_records() {
        let store = Arc::new(FlakyStore {
            inner: InMemoryWorkforceStore::new(),
            budget: AtomicUsize::new(1),
        });
        let repo = Arc::new(InMemorySyncStateRepository::new());
        let mut p = payload(None);
        p.shifts = vec![
            shift("sh-1", 30, t0()),
            shift("sh-2", 30, t0()),
            shift("sh-3", 30, t0()),
        ];

        let report = MobileIngestor::new(store.clone(), ConflictPolicy::Manual)
            .with_history(repo.clone())
            .ingest(&p)
            .await;

        assert!(!report.success);
        assert_eq!(report.applied, 1);
        assert!(report.error.as_deref().unwrap().contains("disk full"));
        assert_eq!(store.inner.snapshot().shifts.len(), 1);

        let history = repo.recent_history(5).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sync_type, SyncType::MobileIngest);
        assert_eq!(history[0].status, SyncHistoryStatus::Failed);
        assert_eq!(history[0].device_id.as_deref(), Some("phone-42"));
    }

    #[tokio::test]
    async fn successful_ingest_is_recorded() {
        let store = store(t0());
        let repo = Arc::new(InMemorySyncStateRepository::new());
        let mut p = payload(None);
        p.shifts = vec![shift("sh-7", 0, t0())];

        let report = ingestor(store, ConflictPolicy::Manual)
            .with_history(repo.clone())
            .ingest(&p)
            .await;
        assert!(report.success);

        let history = repo.recent_history(5).await.unwrap();
        assert_eq!(history[0].status, SyncHistoryStatus::Success);
        assert_eq!(history[0].items_count, 1);
        assert_eq!(history[0].timestamp, t0() + Duration::hours(10));
    }

    #[test]
    fn report_serializes_camel_case() {
        let report = IngestReport {
            success: true,
            applied: 2,
            reference_records: 1,
            ..Default::default()
        };
        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["referenceRecords"], 1);
        assert!(json.get("error").is_none());
    }
}
