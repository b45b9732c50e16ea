//! In-memory adapters
//!
//! These implement the core ports without any I/O beyond optionally
//! reading a JSON snapshot. Tests use them directly; the daemon uses the
//! workforce store seeded from `storage.snapshot_file` since persisting
//! business records is the host application's job.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::domain::{
    Assignment, AssignmentPatch, RecordId, Shift, Site, SyncCursor, SyncHistoryEntry, TokenPair,
    User,
};
use crate::ports::{ISyncStateRepository, ITokenStore, IWorkforceStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking writer cannot leave these collections half-updated, so
    // recovering the guard is safe.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Workforce store
// ============================================================================

/// Full contents of a workforce store, as read from a JSON snapshot file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkforceSnapshot {
    pub assignments: Vec<Assignment>,
    pub sites: Vec<Site>,
    pub users: Vec<User>,
    pub shifts: Vec<Shift>,
}

impl WorkforceSnapshot {
    /// Reads a snapshot from a JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading snapshot {}", path.display()))?;
        let snapshot = serde_json::from_str(&content)
            .with_context(|| format!("parsing snapshot {}", path.display()))?;
        Ok(snapshot)
    }

    /// Writes the snapshot as pretty-printed JSON, replacing the file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self).context("serializing snapshot")?;
        std::fs::write(path, content)
            .with_context(|| format!("writing snapshot {}", path.display()))?;
        Ok(())
    }
}

/// Workforce store backed by vectors behind a mutex
pub struct InMemoryWorkforceStore {
    data: Mutex<WorkforceSnapshot>,
    clock: Arc<dyn Clock>,
}

impl InMemoryWorkforceStore {
    pub fn new() -> Self {
        Self::from_snapshot(WorkforceSnapshot::default())
    }

    pub fn from_snapshot(snapshot: WorkforceSnapshot) -> Self {
        Self::with_clock(snapshot, Arc::new(SystemClock))
    }

    /// Creates a store whose `update_assignment` stamps times from `clock`
    pub fn with_clock(snapshot: WorkforceSnapshot, clock: Arc<dyn Clock>) -> Self {
        Self {
            data: Mutex::new(snapshot),
            clock,
        }
    }

    /// Loads a store from a JSON snapshot file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        Ok(Self::from_snapshot(WorkforceSnapshot::load(path)?))
    }

    /// Returns a copy of everything in the store
    pub fn snapshot(&self) -> WorkforceSnapshot {
        lock(&self.data).clone()
    }

    pub fn insert_assignment(&self, assignment: Assignment) {
        let mut data = lock(&self.data);
        replace_or_push(&mut data.assignments, assignment, |a| &a.id);
    }

    pub fn insert_site(&self, site: Site) {
        let mut data = lock(&self.data);
        replace_or_push(&mut data.sites, site, |s| &s.id);
    }

    pub fn insert_user(&self, user: User) {
        let mut data = lock(&self.data);
        replace_or_push(&mut data.users, user, |u| &u.id);
    }
}

impl Default for InMemoryWorkforceStore {
    fn default() -> Self {
        Self::new()
    }
}

fn replace_or_push<T>(items: &mut Vec<T>, item: T, id: impl Fn(&T) -> &RecordId) {
    match items.iter_mut().find(|existing| id(existing) == id(&item)) {
        Some(existing) => *existing = item,
        None => items.push(item),
    }
}

#[async_trait::async_trait]
impl IWorkforceStore for InMemoryWorkforceStore {
    async fn get_all_assignments(&self) -> anyhow::Result<Vec<Assignment>> {
        Ok(lock(&self.data).assignments.clone())
    }

    async fn get_construction_sites(&self) -> anyhow::Result<Vec<Site>> {
        Ok(lock(&self.data).sites.clone())
    }

    async fn get_all_users(&self) -> anyhow::Result<Vec<User>> {
        Ok(lock(&self.data).users.clone())
    }

    async fn update_assignment(
        &self,
        id: &RecordId,
        patch: &AssignmentPatch,
    ) -> anyhow::Result<Option<Assignment>> {
        let now = self.clock.now();
        let mut data = lock(&self.data);
        let Some(target) = data.assignments.iter_mut().find(|a| &a.id == id) else {
            return Ok(None);
        };
        patch.apply(target, now);
        Ok(Some(target.clone()))
    }

    async fn get_all_shifts(&self) -> anyhow::Result<Vec<Shift>> {
        Ok(lock(&self.data).shifts.clone())
    }

    async fn upsert_shift(&self, shift: &Shift) -> anyhow::Result<()> {
        let mut data = lock(&self.data);
        replace_or_push(&mut data.shifts, shift.clone(), |s| &s.id);
        Ok(())
    }
}

// ============================================================================
// Token store
// ============================================================================

/// Token store that forgets everything on drop
#[derive(Default)]
pub struct InMemoryTokenStore {
    tokens: Mutex<Option<TokenPair>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding `tokens`
    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
        }
    }
}

impl ITokenStore for InMemoryTokenStore {
    fn get(&self) -> anyhow::Result<Option<TokenPair>> {
        Ok(lock(&self.tokens).clone())
    }

    fn set(&self, tokens: &TokenPair) -> anyhow::Result<()> {
        *lock(&self.tokens) = Some(tokens.clone());
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        *lock(&self.tokens) = None;
        Ok(())
    }
}

// ============================================================================
// Sync state repository
// ============================================================================

/// Sync state repository kept in process memory
#[derive(Default)]
pub struct InMemorySyncStateRepository {
    cursor: Mutex<SyncCursor>,
    history: Mutex<Vec<SyncHistoryEntry>>,
}

impl InMemorySyncStateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository that starts from an already-persisted cursor
    pub fn with_cursor(cursor: SyncCursor) -> Self {
        Self {
            cursor: Mutex::new(cursor),
            history: Mutex::default(),
        }
    }
}

#[async_trait::async_trait]
impl ISyncStateRepository for InMemorySyncStateRepository {
    async fn load_cursor(&self) -> anyhow::Result<SyncCursor> {
        Ok(*lock(&self.cursor))
    }

    async fn save_cursor(&self, cursor: &SyncCursor) -> anyhow::Result<()> {
        *lock(&self.cursor) = *cursor;
        Ok(())
    }

    async fn clear_cursor(&self) -> anyhow::Result<()> {
        lock(&self.cursor).reset();
        Ok(())
    }

    async fn record_history(&self, entry: &SyncHistoryEntry) -> anyhow::Result<()> {
        lock(&self.history).push(entry.clone());
        Ok(())
    }

    async fn recent_history(&self, limit: u32) -> anyhow::Result<Vec<SyncHistoryEntry>> {
        let history = lock(&self.history);
        Ok(history.iter().rev().take(limit as usize).cloned().collect())
    }
}
