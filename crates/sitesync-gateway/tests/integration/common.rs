//! Shared test helpers for gateway integration tests

use std::sync::Arc;
use std::time::Duration;

use sitesync_core::domain::TokenPair;
use sitesync_core::memory::InMemoryTokenStore;
use sitesync_gateway::client::RequestGateway;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a gateway against the mock server with the given stored tokens.
pub fn gateway(
    server: &MockServer,
    tokens: Option<TokenPair>,
) -> (Arc<InMemoryTokenStore>, RequestGateway) {
    gateway_with_timeouts(server, tokens, Duration::from_secs(5), Duration::from_secs(1))
}

pub fn gateway_with_timeouts(
    server: &MockServer,
    tokens: Option<TokenPair>,
    request_timeout: Duration,
    health_timeout: Duration,
) -> (Arc<InMemoryTokenStore>, RequestGateway) {
    let store = Arc::new(match tokens {
        Some(pair) => InMemoryTokenStore::with_tokens(pair),
        None => InMemoryTokenStore::new(),
    });
    let gateway =
        RequestGateway::with_timeouts(server.uri(), store.clone(), request_timeout, health_timeout);
    (store, gateway)
}

/// Mounts a refresh endpoint that exchanges `refresh_token` for `issued`,
/// expecting to be called exactly `times` times.
pub async fn mount_refresh(server: &MockServer, refresh_token: &str, issued: &TokenPair, times: u64) {
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(serde_json::json!({ "refreshToken": refresh_token })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "accessToken": issued.access_token,
            "refreshToken": issued.refresh_token,
        })))
        .expect(times)
        .mount(server)
        .await;
}

/// Mounts a refresh endpoint that always rejects the refresh token.
pub async fn mount_refresh_rejected(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(server)
        .await;
}
