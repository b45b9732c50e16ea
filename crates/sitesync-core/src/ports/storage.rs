//! Workforce store port (driven/secondary port)
//!
//! The storage collaborator is a simple CRUD surface returning full
//! in-memory collections. The change-set filter does its own filtering
//! client-side rather than asking the store for a pre-filtered delta.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   and don't need domain-level classification.
//! - `update_assignment` returns `Ok(None)` for an unknown id instead of
//!   an error so callers can decide whether that is fatal.

use crate::domain::{Assignment, AssignmentPatch, RecordId, Shift, Site, User};

/// Port trait for the authoritative workforce record store
#[async_trait::async_trait]
pub trait IWorkforceStore: Send + Sync {
    /// Returns every assignment
    async fn get_all_assignments(&self) -> anyhow::Result<Vec<Assignment>>;

    /// Returns every construction site
    async fn get_construction_sites(&self) -> anyhow::Result<Vec<Site>>;

    /// Returns every user
    async fn get_all_users(&self) -> anyhow::Result<Vec<User>>;

    /// Applies a partial update to an assignment
    ///
    /// Returns the updated record, or `None` if no assignment has this id.
    async fn update_assignment(
        &self,
        id: &RecordId,
        patch: &AssignmentPatch,
    ) -> anyhow::Result<Option<Assignment>>;

    /// Returns every shift
    async fn get_all_shifts(&self) -> anyhow::Result<Vec<Shift>>;

    /// Inserts a shift, or replaces the shift with the same id wholesale
    async fn upsert_shift(&self, shift: &Shift) -> anyhow::Result<()>;
}
