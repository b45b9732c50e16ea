//! Change sets: the delta transmitted in one sync attempt

use serde::{Deserialize, Serialize};

use super::records::{Assignment, Site, User};

/// Locally modified records selected for one sync attempt
///
/// Built per attempt by the change-set filter and discarded after
/// transmission. `max_revision` is local bookkeeping for the revision
/// cursor and never goes over the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub assignments: Vec<Assignment>,
    pub sites: Vec<Site>,
    pub users: Vec<User>,
    #[serde(skip)]
    pub max_revision: Option<u64>,
}

impl ChangeSet {
    /// Total number of records across all entity kinds
    pub fn len(&self) -> usize {
        self.assignments.len() + self.sites.len() + self.users.len()
    }

    /// Returns true when there is nothing to transmit
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
