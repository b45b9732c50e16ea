//! Change-set computation
//!
//! Selects the locally modified records that one sync attempt transmits.
//! Two strategies are available:
//!
//! - **Lookback** - records with `updated_at > max(watermark, now - lookback)`.
//!   Edits older than the lookback window that were never synced are missed.
//! - **Revision** - records with `revision > cursor.revision`, or every
//!   record when no revision has been synced yet.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use sitesync_core::clock::Clock;
use sitesync_core::config::SyncConfig;
use sitesync_core::domain::{ChangeSet, DomainError, SyncCursor, TrackedRecord};
use sitesync_core::ports::IWorkforceStore;
use tracing::debug;

/// How modified records are detected
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChangeTracking {
    #[default]
    Lookback,
    Revision,
}

impl FromStr for ChangeTracking {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lookback" => Ok(ChangeTracking::Lookback),
            "revision" => Ok(ChangeTracking::Revision),
            other => Err(DomainError::UnknownVariant {
                kind: "change tracking strategy",
                value: other.to_string(),
            }),
        }
    }
}

enum Selector {
    Since(DateTime<Utc>),
    AfterRevision(Option<u64>),
}

impl Selector {
    fn keep<R: TrackedRecord>(&self, record: &R) -> bool {
        match *self {
            Selector::Since(threshold) => record.updated_at() > threshold,
            Selector::AfterRevision(Some(synced)) => record.revision() > synced,
            Selector::AfterRevision(None) => true,
        }
    }

    fn select<R: TrackedRecord>(&self, records: Vec<R>) -> Vec<R> {
        records.into_iter().filter(|r| self.keep(r)).collect()
    }
}

/// Computes change sets from the workforce store; never mutates it
pub struct ChangeSetFilter {
    store: Arc<dyn IWorkforceStore>,
    clock: Arc<dyn Clock>,
    strategy: ChangeTracking,
    lookback: Duration,
}

impl ChangeSetFilter {
    pub fn new(
        store: Arc<dyn IWorkforceStore>,
        clock: Arc<dyn Clock>,
        strategy: ChangeTracking,
        lookback: std::time::Duration,
    ) -> Self {
        Self {
            store,
            clock,
            strategy,
            lookback: Duration::from_std(lookback).unwrap_or_else(|_| Duration::weeks(5200)),
        }
    }

    /// Builds a filter from the `sync` config section
    pub fn from_config(
        store: Arc<dyn IWorkforceStore>,
        clock: Arc<dyn Clock>,
        config: &SyncConfig,
    ) -> anyhow::Result<Self> {
        let strategy = config
            .change_tracking
            .parse()
            .context("Invalid sync.change_tracking")?;
        Ok(Self::new(store, clock, strategy, config.lookback()))
    }

    pub fn strategy(&self) -> ChangeTracking {
        self.strategy
    }

    /// Collects the records modified since `cursor`
    ///
    /// Under the revision strategy the result carries the highest revision
    /// it contains, which the orchestrator stores after a successful push.
    pub async fn compute_change_set(&self, cursor: &SyncCursor) -> anyhow::Result<ChangeSet> {
        let selector = match self.strategy {
            ChangeTracking::Lookback => {
                let window_start = self
                    .clock
                    .now()
                    .checked_sub_signed(self.lookback)
                    .unwrap_or(DateTime::<Utc>::MIN_UTC);
                let threshold = cursor
                    .watermark
                    .map_or(window_start, |watermark| watermark.max(window_start));
                Selector::Since(threshold)
            }
            ChangeTracking::Revision => Selector::AfterRevision(cursor.revision),
        };

        let assignments = self
            .store
            .get_all_assignments()
            .await
            .context("Failed to read assignments")?;
        let sites = self
            .store
            .get_construction_sites()
            .await
            .context("Failed to read construction sites")?;
        let users = self
            .store
            .get_all_users()
            .await
            .context("Failed to read users")?;

        let mut change_set = ChangeSet {
            assignments: selector.select(assignments),
            sites: selector.select(sites),
            users: selector.select(users),
            max_revision: None,
        };

        if self.strategy == ChangeTracking::Revision {
            change_set.max_revision = change_set
                .assignments
                .iter()
                .map(TrackedRecord::revision)
                .chain(change_set.sites.iter().map(TrackedRecord::revision))
                .chain(change_set.users.iter().map(TrackedRecord::revision))
                .max();
        }

        debug!(
            strategy = ?self.strategy,
            assignments = change_set.assignments.len(),
            sites = change_set.sites.len(),
            users = change_set.users.len(),
            "Computed change set"
        );
        Ok(change_set)
    }
}
