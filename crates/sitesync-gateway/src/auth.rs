//! Token refresh and secure token storage
//!
//! This module provides:
//! - [`TokenRefresher`] - Exchanges a refresh token for a new token pair
//! - [`KeyringTokenStore`] - [`ITokenStore`] backed by the system keyring
//!
//! Interactive sign-in is handled by the host application; this crate only
//! keeps an existing session alive.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use sitesync_core::{domain::TokenPair, ports::ITokenStore};
use tracing::{debug, info};

use crate::GatewayError;

/// Service name for keyring storage
const KEYRING_SERVICE: &str = "sitesync";

/// Keyring account used when none is configured
pub const DEFAULT_KEYRING_ACCOUNT: &str = "default";

/// Path of the refresh endpoint, relative to the server base URL
pub const REFRESH_PATH: &str = "/auth/refresh";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

// ============================================================================
// TokenRefresher
// ============================================================================

/// Client for the token refresh endpoint
///
/// Refreshing is never authenticated with the access token and is never
/// retried here; the gateway decides what a failed refresh means.
#[derive(Debug, Clone)]
pub struct TokenRefresher {
    client: Client,
    url: String,
    timeout: Duration,
}

impl TokenRefresher {
    /// Creates a refresher for the server at `base_url`
    pub fn new(client: Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            url: format!("{}{}", base_url.trim_end_matches('/'), REFRESH_PATH),
            timeout,
        }
    }

    /// Exchanges `refresh_token` for a new token pair
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, GatewayError> {
        debug!("Requesting token refresh");

        let call = async {
            let response = self
                .client
                .post(&self.url)
                .json(&RefreshRequest { refresh_token })
                .send()
                .await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body))
        };
        let (status, body) = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => return Err(GatewayError::from_reqwest(e, self.timeout)),
            Err(_) => return Err(GatewayError::Timeout(self.timeout)),
        };

        if status != StatusCode::OK {
            return Err(GatewayError::from_status(
                status,
                String::from_utf8_lossy(&body).into_owned(),
            ));
        }

        let pair: TokenPair = serde_json::from_slice(&body)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        if !pair.has_access_token() {
            return Err(GatewayError::InvalidResponse(
                "refresh response carried no access token".into(),
            ));
        }

        info!("Access token refreshed");
        Ok(pair)
    }
}

// ============================================================================
// KeyringTokenStore
// ============================================================================

/// Stores the token pair in the system keyring
///
/// Uses the `keyring` crate to store tokens in the OS credential store
/// (e.g., GNOME Keyring, KWallet on Linux). The pair is stored as one JSON
/// secret so access and refresh token can never get out of step.
#[derive(Debug, Clone)]
pub struct KeyringTokenStore {
    account: String,
}

impl KeyringTokenStore {
    /// Creates a store for the given keyring account
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(KEYRING_SERVICE, &self.account)
            .context("Failed to create keyring entry")
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new(DEFAULT_KEYRING_ACCOUNT)
    }
}

impl ITokenStore for KeyringTokenStore {
    fn get(&self) -> Result<Option<TokenPair>> {
        match self.entry()?.get_password() {
            Ok(json) => {
                let tokens: TokenPair = serde_json::from_str(&json)
                    .context("Failed to deserialize tokens from keyring")?;
                debug!(account = %self.account, "Loaded tokens from keyring");
                Ok(Some(tokens))
            }
            Err(keyring::Error::NoEntry) => {
                debug!(account = %self.account, "No tokens found in keyring");
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
        }
    }

    fn set(&self, tokens: &TokenPair) -> Result<()> {
        let json = serde_json::to_string(tokens).context("Failed to serialize tokens")?;
        self.entry()?
            .set_password(&json)
            .context("Failed to store tokens in keyring")?;
        debug!(account = %self.account, "Stored tokens in keyring");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) => {
                info!(account = %self.account, "Cleared tokens from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete from keyring")),
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn refresh_url_joins_base_without_double_slash() {
        let refresher = TokenRefresher::new(
            Client::new(),
            "http://localhost:8080/api/",
            Duration::from_secs(5),
        );
        assert_eq!(refresher.url, "http://localhost:8080/api/auth/refresh");
    }

    #[test]
    fn refresh_request_is_camel_case() {
        let body = serde_json::to_value(RefreshRequest {
            refresh_token: "r-1",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"refreshToken": "r-1"}));
    }

    #[tokio::test]
    async fn slow_refresh_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(REFRESH_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"accessToken": "a-2", "refreshToken": "r-2"}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let refresher = TokenRefresher::new(Client::new(), &server.uri(), Duration::from_millis(300));
        let err = refresher.refresh("r-1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Timeout(_)));
    }

    #[tokio::test]
    async fn refresh_returns_new_pair() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(REFRESH_PATH))
            .and(body_json(serde_json::json!({"refreshToken": "r-1"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"accessToken": "a-2", "refreshToken": "r-2"})),
            )
            .mount(&server)
            .await;

        let refresher = TokenRefresher::new(Client::new(), &server.uri(), Duration::from_secs(5));
        let pair = refresher.refresh("r-1").await.unwrap();
        assert_eq!(pair, TokenPair::new("a-2", "r-2"));
    }

    #[test]
    fn keyring_store_defaults_to_default_account() {
        assert_eq!(KeyringTokenStore::default().account, DEFAULT_KEYRING_ACCOUNT);
    }
}
