//! SiteSync Sync - Sync orchestration engine
//!
//! Provides:
//! - Single-flight sync attempts gated on network quality and credentials
//! - Debounced change notifications and a recurring auto-sync timer
//! - Linear-backoff retries for transient failures
//! - Change-set computation by lookback window or by revision
//! - Network monitoring with quality classification and status listeners
//!
//! ## Modules
//!
//! - [`orchestrator`] - The sync state machine
//! - [`network`] - Connectivity probing and status fan-out
//! - [`change_set`] - Delta computation against the workforce store
//! - [`debounce`] - Quiet-period debouncer used for notifications and reconnects
//! - [`scheduler`] - Recurring auto-sync timer
//! - [`retry`] - Retry policy

pub mod change_set;
pub mod debounce;
pub mod network;
pub mod orchestrator;
pub mod retry;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod test_support;

use std::fmt;

use serde::{Deserialize, Serialize};
use sitesync_core::domain::{FailureClass, TransportError};
use thiserror::Error;

/// Why a sync attempt did not succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    /// Another attempt is already in flight
    AlreadyInProgress,
    /// The network monitor reports no connection
    NoNetwork,
    /// Connected, but the link is too poor to sync
    UnfavorableNetwork,
    /// No access token is stored
    MissingCredentials,
    Network,
    Timeout,
    Authentication,
    Client,
    Server,
    Unknown,
}

impl SyncErrorKind {
    /// Pre-flight kinds are decided before any network call
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            SyncErrorKind::AlreadyInProgress
                | SyncErrorKind::NoNetwork
                | SyncErrorKind::UnfavorableNetwork
                | SyncErrorKind::MissingCredentials
        )
    }

    /// Returns true for kinds that are retried with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncErrorKind::Network | SyncErrorKind::Timeout)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncErrorKind::AlreadyInProgress => "already_in_progress",
            SyncErrorKind::NoNetwork => "no_network",
            SyncErrorKind::UnfavorableNetwork => "unfavorable_network",
            SyncErrorKind::MissingCredentials => "missing_credentials",
            SyncErrorKind::Network => "network",
            SyncErrorKind::Timeout => "timeout",
            SyncErrorKind::Authentication => "authentication",
            SyncErrorKind::Client => "client",
            SyncErrorKind::Server => "server",
            SyncErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SyncErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<FailureClass> for SyncErrorKind {
    fn from(class: FailureClass) -> Self {
        match class {
            FailureClass::Network => SyncErrorKind::Network,
            FailureClass::Timeout => SyncErrorKind::Timeout,
            FailureClass::Authentication => SyncErrorKind::Authentication,
            FailureClass::Client => SyncErrorKind::Client,
            FailureClass::Server => SyncErrorKind::Server,
            FailureClass::Unknown => SyncErrorKind::Unknown,
        }
    }
}

/// A classified sync failure with a human-readable reason
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct SyncError {
    pub kind: SyncErrorKind,
    pub message: String,
}

impl SyncError {
    pub fn new(kind: SyncErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<TransportError> for SyncError {
    fn from(err: TransportError) -> Self {
        Self::new(err.class.into(), err.message)
    }
}

/// Result of one `trigger_sync` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SyncError>,
    /// Records transmitted by the successful attempt
    pub records_sent: usize,
    /// Attempts made, including retries; zero when rejected before any
    pub attempts: u32,
}

impl SyncOutcome {
    pub fn succeeded(records_sent: usize, attempts: u32) -> Self {
        Self {
            success: true,
            error: None,
            records_sent,
            attempts,
        }
    }

    pub fn failed(error: SyncError, attempts: u32) -> Self {
        Self {
            success: false,
            error: Some(error),
            records_sent: 0,
            attempts,
        }
    }

    /// Kind of the failure, if the sync failed
    pub fn error_kind(&self) -> Option<SyncErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}
