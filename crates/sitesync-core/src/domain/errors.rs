//! Domain error types
//!
//! This module defines error types specific to domain operations and the
//! transport failure taxonomy shared by the gateway and the orchestrator.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// ID parsing or validation error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Unknown enum value while parsing configuration or wire data
    #[error("Unknown {kind}: {value}")]
    UnknownVariant {
        /// What was being parsed
        kind: &'static str,
        /// The offending value
        value: String,
    },
}

/// Classification of a failed remote operation
///
/// The classification decides how the orchestrator reacts: `Network` and
/// `Timeout` are retried, everything else is surfaced immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// No route, DNS failure, connection refused or reset
    Network,
    /// The request exceeded its deadline
    Timeout,
    /// Credentials were rejected and could not be refreshed
    Authentication,
    /// 4xx other than 401
    Client,
    /// 5xx, or an explicit rejection from the sync endpoint
    Server,
    /// Anything that fits none of the above
    Unknown,
}

impl FailureClass {
    /// Returns true for transient classes the orchestrator retries
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureClass::Network | FailureClass::Timeout)
    }

    /// Stable lowercase name used in logs and history records
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Network => "network",
            FailureClass::Timeout => "timeout",
            FailureClass::Authentication => "authentication",
            FailureClass::Client => "client",
            FailureClass::Server => "server",
            FailureClass::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure crossing the transport port
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{class} error: {message}")]
pub struct TransportError {
    /// Failure classification
    pub class: FailureClass,
    /// Human-readable reason
    pub message: String,
}

impl TransportError {
    /// Creates a new transport error
    pub fn new(class: FailureClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }
}
