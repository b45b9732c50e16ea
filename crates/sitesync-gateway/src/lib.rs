//! SiteSync Gateway - Resilient access to the administration server
//!
//! Provides:
//! - Authenticated JSON requests with a per-call timeout
//! - One refresh-and-retry on `401 Unauthorized`
//! - Failure classification shared with the sync orchestrator
//! - Keyring-backed token storage
//!
//! ## Modules
//!
//! - [`auth`] - Token refresh client and keyring token store
//! - [`client`] - The request gateway itself
//! - [`transport`] - Port adapters (sync transport, connectivity probe)

pub mod auth;
pub mod client;
pub mod transport;

use std::time::Duration;

use sitesync_core::domain::{FailureClass, TransportError};
use thiserror::Error;

/// Message returned when credentials are gone and the user must log in again
pub const SIGN_IN_AGAIN: &str = "session expired, please sign in again";

/// Errors that can occur when talking to the administration server
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The server could not be reached (DNS, refused, reset)
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete within its deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Credentials are missing, expired, or were rejected after a refresh
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The server rejected the request (4xx other than 401)
    #[error("Client error {status}: {message}")]
    Client {
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// The server failed or refused to process the request
    #[error("Server error {status}: {message}")]
    Server {
        /// HTTP status code, 200 for an explicit rejection in a success body
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// The response could not be parsed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The request body could not be encoded
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The token store failed
    #[error("Token storage error: {0}")]
    TokenStore(String),
}

impl GatewayError {
    /// Maps the error onto the shared failure taxonomy
    pub fn class(&self) -> FailureClass {
        match self {
            GatewayError::Network(_) => FailureClass::Network,
            GatewayError::Timeout(_) => FailureClass::Timeout,
            GatewayError::Authentication(_) => FailureClass::Authentication,
            GatewayError::Client { .. } => FailureClass::Client,
            GatewayError::Server { .. } => FailureClass::Server,
            GatewayError::InvalidResponse(_)
            | GatewayError::Encoding(_)
            | GatewayError::TokenStore(_) => FailureClass::Unknown,
        }
    }

    /// Returns true if retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        self.class().is_retryable()
    }

    /// Classifies a reqwest transport failure
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout(timeout)
        } else if err.is_connect() || err.is_request() {
            GatewayError::Network(err.to_string())
        } else if err.is_decode() || err.is_body() {
            GatewayError::InvalidResponse(err.to_string())
        } else {
            GatewayError::Network(err.to_string())
        }
    }

    /// Classifies a non-success HTTP status
    pub(crate) fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        let message = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("no reason given")
                .to_string()
        } else {
            body
        };
        let code = status.as_u16();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            GatewayError::Authentication(message)
        } else if status.is_client_error() {
            GatewayError::Client {
                status: code,
                message,
            }
        } else if status.is_server_error() {
            GatewayError::Server {
                status: code,
                message,
            }
        } else {
            GatewayError::InvalidResponse(format!("unexpected status {code}: {message}"))
        }
    }
}

impl From<GatewayError> for TransportError {
    fn from(err: GatewayError) -> Self {
        TransportError::new(err.class(), err.to_string())
    }
}
