//! Conflict resolution policy
//!
//! Chosen once from `conflicts.strategy` and applied to every conflict in a
//! payload. The default defers to a human reviewer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sitesync_core::domain::{DomainError, Resolution};
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Skip the record and surface the conflict for review
    #[default]
    Manual,
    /// The version with the later `updated_at` wins; ties keep local
    NewestWins,
    /// The inbound version is applied; the conflict is still reported
    RemoteWins,
    /// The local version is kept; the conflict is still reported
    KeepLocal,
}

impl ConflictPolicy {
    /// Parses a configured strategy, falling back to `manual` when unknown
    pub fn from_config(strategy: &str) -> Self {
        strategy.parse().unwrap_or_else(|_| {
            warn!(strategy, "Unknown conflict strategy, deferring conflicts to review");
            ConflictPolicy::Manual
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::Manual => "manual",
            ConflictPolicy::NewestWins => "newest_wins",
            ConflictPolicy::RemoteWins => "remote_wins",
            ConflictPolicy::KeepLocal => "keep_local",
        }
    }

    /// Decides a conflict between a local and an inbound version
    pub fn decide(&self, local_updated: DateTime<Utc>, remote_updated: DateTime<Utc>) -> Resolution {
        match self {
            ConflictPolicy::Manual => Resolution::Manual,
            ConflictPolicy::NewestWins if remote_updated > local_updated => Resolution::KeepRemote,
            ConflictPolicy::NewestWins => Resolution::KeepLocal,
            ConflictPolicy::RemoteWins => Resolution::KeepRemote,
            ConflictPolicy::KeepLocal => Resolution::KeepLocal,
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(ConflictPolicy::Manual),
            "newest_wins" => Ok(ConflictPolicy::NewestWins),
            "remote_wins" => Ok(ConflictPolicy::RemoteWins),
            "keep_local" => Ok(ConflictPolicy::KeepLocal),
            other => Err(DomainError::UnknownVariant {
                kind: "conflict strategy",
                value: other.to_string(),
            }),
        }
    }
}
