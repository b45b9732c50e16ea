//! Resilient request gateway
//!
//! [`RequestGateway`] is the only way SiteSync talks to the administration
//! server. Every call:
//!
//! 1. attaches the stored access token as a bearer credential, if any;
//! 2. is bounded by the request timeout (the body read included);
//! 3. on `401 Unauthorized`, refreshes the token pair once and retries the
//!    call once with the new access token.
//!
//! A failed refresh clears the stored tokens and surfaces as
//! [`GatewayError::Authentication`]. A 401 on the retried call is surfaced
//! the same way, without another refresh.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sitesync_core::memory::InMemoryTokenStore;
//! use sitesync_gateway::client::RequestGateway;
//!
//! # async fn example() -> Result<(), sitesync_gateway::GatewayError> {
//! let gateway = RequestGateway::new("http://localhost:8080/api", Arc::new(InMemoryTokenStore::new()));
//! if gateway.check_connection().await {
//!     let history = gateway.fetch_sync_history(10).await?;
//!     println!("{} past syncs", history.len());
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sitesync_core::config::ServerConfig;
use sitesync_core::domain::{ChangeSet, SyncAck, SyncHistoryEntry, TokenPair};
use sitesync_core::ports::ITokenStore;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::auth::TokenRefresher;
use crate::{GatewayError, SIGN_IN_AGAIN};

/// Unauthenticated reachability endpoint
pub const HEALTH_PATH: &str = "/health";
/// Change-set upload endpoint
pub const SYNC_PUSH_PATH: &str = "/sync/push";
/// Server-side sync history endpoint
pub const SYNC_HISTORY_PATH: &str = "/sync/history";

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default health probe timeout
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PushRequest<'a> {
    #[serde(flatten)]
    change_set: &'a ChangeSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_id: Option<&'a str>,
}

// ============================================================================
// RequestGateway
// ============================================================================

/// Authenticated, timeout-bounded HTTP client for the administration server
pub struct RequestGateway {
    /// The underlying HTTP client
    client: Client,
    /// Base URL every endpoint path is appended to
    base_url: String,
    /// Where the token pair lives
    tokens: Arc<dyn ITokenStore>,
    /// Refresh endpoint client
    refresher: TokenRefresher,
    /// Serializes refreshes so concurrent 401s trigger only one
    refresh_lock: Mutex<()>,
    request_timeout: Duration,
    health_timeout: Duration,
}

impl RequestGateway {
    /// Creates a gateway with default timeouts
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn ITokenStore>) -> Self {
        Self::with_timeouts(
            base_url,
            tokens,
            DEFAULT_REQUEST_TIMEOUT,
            DEFAULT_HEALTH_TIMEOUT,
        )
    }

    /// Creates a gateway from the `server` configuration section
    pub fn from_config(config: &ServerConfig, tokens: Arc<dyn ITokenStore>) -> Self {
        Self::with_timeouts(
            config.base_url.clone(),
            tokens,
            config.request_timeout(),
            config.health_timeout(),
        )
    }

    /// Creates a gateway with explicit timeouts
    pub fn with_timeouts(
        base_url: impl Into<String>,
        tokens: Arc<dyn ITokenStore>,
        request_timeout: Duration,
        health_timeout: Duration,
    ) -> Self {
        let client = Client::new();
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let refresher = TokenRefresher::new(client.clone(), &base_url, request_timeout);
        Self {
            client,
            base_url,
            tokens,
            refresher,
            refresh_lock: Mutex::new(()),
            request_timeout,
            health_timeout,
        }
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns true when an access token is stored
    pub fn has_access_token(&self) -> bool {
        matches!(self.tokens.get(), Ok(Some(pair)) if pair.has_access_token())
    }

    // ========================================================================
    // Core request path
    // ========================================================================

    /// Performs an authenticated JSON request and decodes the response
    ///
    /// An empty success body decodes as JSON `null`, so `T = ()` or
    /// `Option<_>` can be used for endpoints that return nothing.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, GatewayError> {
        let access = self.load_tokens()?.map(|pair| pair.access_token);
        let (status, bytes) = self
            .execute(&method, endpoint, body, access.as_deref())
            .await?;

        if status != StatusCode::UNAUTHORIZED {
            return decode(status, &bytes);
        }

        info!(%method, endpoint, "Received 401, refreshing access token");
        let refreshed = self.refresh_after_unauthorized(access.as_deref()).await?;

        let (status, bytes) = self
            .execute(&method, endpoint, body, Some(&refreshed))
            .await?;
        if status == StatusCode::UNAUTHORIZED {
            warn!(%method, endpoint, "Still unauthorized after token refresh");
            return Err(GatewayError::Authentication(SIGN_IN_AGAIN.into()));
        }
        decode(status, &bytes)
    }

    /// Sends one request and reads the whole body within the request timeout
    async fn execute(
        &self,
        method: &Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
        access_token: Option<&str>,
    ) -> Result<(StatusCode, Vec<u8>), GatewayError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut builder = self.client.request(method.clone(), &url);
        if let Some(token) = access_token.filter(|t| !t.is_empty()) {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        debug!(%method, endpoint, authenticated = access_token.is_some(), "Sending request");
        let timeout = self.request_timeout;
        let call = async {
            let response = builder.send().await?;
            let status = response.status();
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, bytes.to_vec()))
        };

        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(GatewayError::from_reqwest(e, timeout)),
            Err(_) => {
                warn!(%method, endpoint, ?timeout, "Request timed out");
                Err(GatewayError::Timeout(timeout))
            }
        }
    }

    /// Obtains a fresh access token after `rejected` was refused
    ///
    /// If another call already refreshed while this one waited for the
    /// lock, the stored token is used as is and no second refresh happens.
    async fn refresh_after_unauthorized(
        &self,
        rejected: Option<&str>,
    ) -> Result<String, GatewayError> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.load_tokens()?;
        if let Some(pair) = &current {
            if pair.has_access_token() && Some(pair.access_token.as_str()) != rejected {
                debug!("Token already refreshed by a concurrent request");
                return Ok(pair.access_token.clone());
            }
        }

        let Some(refresh_token) = current
            .map(|pair| pair.refresh_token)
            .filter(|t| !t.is_empty())
        else {
            warn!("No refresh token available");
            self.clear_tokens();
            return Err(GatewayError::Authentication(SIGN_IN_AGAIN.into()));
        };

        match self.refresher.refresh(&refresh_token).await {
            Ok(pair) => {
                self.tokens
                    .set(&pair)
                    .map_err(|e| GatewayError::TokenStore(e.to_string()))?;
                Ok(pair.access_token)
            }
            Err(err) => {
                warn!(error = %err, "Token refresh failed, clearing stored tokens");
                self.clear_tokens();
                Err(GatewayError::Authentication(SIGN_IN_AGAIN.into()))
            }
        }
    }

    fn load_tokens(&self) -> Result<Option<TokenPair>, GatewayError> {
        self.tokens
            .get()
            .map_err(|e| GatewayError::TokenStore(e.to_string()))
    }

    fn clear_tokens(&self) {
        if let Err(e) = self.tokens.clear() {
            warn!(error = %e, "Failed to clear stored tokens");
        }
    }

    // ========================================================================
    // Health
    // ========================================================================

    /// Probes the health endpoint without credentials
    ///
    /// Returns whether the server answered with a success status, and how
    /// long the probe took. Bounded by the health timeout, not the request
    /// timeout.
    pub async fn probe_health(&self) -> (bool, Duration) {
        let url = format!("{}{}", self.base_url, HEALTH_PATH);
        let started = Instant::now();
        let result = tokio::time::timeout(self.health_timeout, self.client.get(&url).send()).await;
        let elapsed = started.elapsed();

        let reachable = match result {
            Ok(Ok(response)) => response.status().is_success(),
            Ok(Err(e)) => {
                debug!(error = %e, "Health probe failed");
                false
            }
            Err(_) => {
                debug!(timeout = ?self.health_timeout, "Health probe timed out");
                false
            }
        };
        (reachable, elapsed)
    }

    /// Returns true if the server's health endpoint is reachable
    pub async fn check_connection(&self) -> bool {
        self.probe_health().await.0
    }

    // ========================================================================
    // Sync endpoints
    // ========================================================================

    /// Uploads a change set
    ///
    /// A `{"success": false}` acknowledgement is a rejection by the server
    /// and is reported as [`GatewayError::Server`].
    pub async fn push_change_set(
        &self,
        change_set: &ChangeSet,
        device_id: Option<&str>,
    ) -> Result<SyncAck, GatewayError> {
        let body = serde_json::to_value(PushRequest {
            change_set,
            device_id,
        })
        .map_err(|e| GatewayError::Encoding(e.to_string()))?;

        debug!(records = change_set.len(), "Pushing change set");
        let ack: SyncAck = self
            .request(Method::POST, SYNC_PUSH_PATH, Some(&body))
            .await?;
        if !ack.success {
            return Err(GatewayError::Server {
                status: StatusCode::OK.as_u16(),
                message: "change set rejected by server".into(),
            });
        }
        Ok(ack)
    }

    /// Reads the most recent sync history entries from the server
    pub async fn fetch_sync_history(
        &self,
        limit: u32,
    ) -> Result<Vec<SyncHistoryEntry>, GatewayError> {
        let endpoint = format!("{SYNC_HISTORY_PATH}?limit={limit}");
        self.request(Method::GET, &endpoint, None).await
    }
}

fn decode<T: DeserializeOwned>(status: StatusCode, bytes: &[u8]) -> Result<T, GatewayError> {
    if !status.is_success() {
        let body = String::from_utf8_lossy(bytes).into_owned();
        return Err(GatewayError::from_status(status, body));
    }
    let bytes: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        bytes
    };
    serde_json::from_slice(bytes).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
}
