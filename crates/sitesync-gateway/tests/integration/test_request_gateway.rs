//! Authentication, refresh, timeout, and classification behavior

use std::time::Duration;

use reqwest::Method;
use sitesync_core::domain::{FailureClass, TokenPair};
use sitesync_core::ports::ITokenStore;
use sitesync_gateway::client::RequestGateway;
use sitesync_gateway::GatewayError;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

async fn get_data(gateway: &RequestGateway) -> Result<serde_json::Value, GatewayError> {
    gateway.request(Method::GET, "/data", None).await
}

// ============================================================================
// Bearer credentials
// ============================================================================

#[tokio::test]
async fn test_attaches_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let (_store, gateway) = common::gateway(&server, Some(TokenPair::new("access-1", "refresh-1")));
    let value = get_data(&gateway).await.expect("request should succeed");
    assert_eq!(value["ok"], true);
}

#[tokio::test]
async fn test_sends_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/echo"))
        .and(wiremock::matchers::body_json(serde_json::json!({"n": 3})))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"n": 3})))
        .mount(&server)
        .await;

    let (_store, gateway) = common::gateway(&server, None);
    let body = serde_json::json!({"n": 3});
    let value: serde_json::Value = gateway
        .request(Method::POST, "/echo", Some(&body))
        .await
        .expect("request should succeed");
    assert_eq!(value["n"], 3);
}

// ============================================================================
// 401 refresh-and-retry
// ============================================================================

#[tokio::test]
async fn test_unauthorized_refreshes_once_and_retries() {
    let server = MockServer::start().await;
    let issued = TokenPair::new("access-2", "refresh-2");

    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("authorization", "Bearer access-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;
    common::mount_refresh(&server, "refresh-1", &issued, 1).await;

    let (store, gateway) = common::gateway(&server, Some(TokenPair::new("access-1", "refresh-1")));
    let value = get_data(&gateway).await.expect("retried request should succeed");

    assert_eq!(value["ok"], true);
    assert_eq!(store.get().unwrap(), Some(issued));
}

#[tokio::test]
async fn test_refresh_failure_clears_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    common::mount_refresh_rejected(&server).await;

    let (store, gateway) = common::gateway(&server, Some(TokenPair::new("access-1", "refresh-1")));
    let err = get_data(&gateway).await.unwrap_err();

    assert_eq!(err.class(), FailureClass::Authentication);
    assert!(err.to_string().contains("sign in again"));
    assert!(store.get().unwrap().is_none());
}

#[tokio::test]
async fn test_unauthorized_after_refresh_does_not_refresh_again() {
    let server = MockServer::start().await;
    let issued = TokenPair::new("access-2", "refresh-2");
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    common::mount_refresh(&server, "refresh-1", &issued, 1).await;

    let (store, gateway) = common::gateway(&server, Some(TokenPair::new("access-1", "refresh-1")));
    let err = get_data(&gateway).await.unwrap_err();

    assert_eq!(err.class(), FailureClass::Authentication);
    // The refreshed pair stays stored; only a failed refresh clears it.
    assert_eq!(store.get().unwrap(), Some(issued));
}

#[tokio::test]
async fn test_unauthorized_without_tokens_skips_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (_store, gateway) = common::gateway(&server, None);
    let err = get_data(&gateway).await.unwrap_err();
    assert!(matches!(err, GatewayError::Authentication(_)));
}

#[tokio::test]
async fn test_concurrent_unauthorized_requests_share_one_refresh() {
    let server = MockServer::start().await;
    let issued = TokenPair::new("access-2", "refresh-2");
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("authorization", "Bearer access-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(2)
        .mount(&server)
        .await;
    common::mount_refresh(&server, "refresh-1", &issued, 1).await;

    let (store, gateway) = common::gateway(&server, Some(TokenPair::new("access-1", "refresh-1")));
    let (a, b) = tokio::join!(get_data(&gateway), get_data(&gateway));

    assert!(a.is_ok(), "first request failed: {a:?}");
    assert!(b.is_ok(), "second request failed: {b:?}");
    assert_eq!(store.get().unwrap(), Some(issued));
}

// ============================================================================
// Timeouts and classification
// ============================================================================

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({}))
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;

    let (_store, gateway) = common::gateway_with_timeouts(
        &server,
        None,
        Duration::from_millis(100),
        Duration::from_millis(100),
    );
    let err = get_data(&gateway).await.unwrap_err();

    assert!(matches!(err, GatewayError::Timeout(d) if d == Duration::from_millis(100)));
    assert_eq!(err.class(), FailureClass::Timeout);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_status_classification() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such thing"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (_store, gateway) = common::gateway(&server, None);

    let err = gateway
        .request::<serde_json::Value>(Method::GET, "/missing", None)
        .await
        .unwrap_err();
    assert_eq!(err.class(), FailureClass::Client);
    assert!(err.to_string().contains("no such thing"));

    let err = gateway
        .request::<serde_json::Value>(Method::GET, "/broken", None)
        .await
        .unwrap_err();
    assert_eq!(err.class(), FailureClass::Server);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    // Nothing listens on the discard port.
    let store = std::sync::Arc::new(sitesync_core::memory::InMemoryTokenStore::new());
    let gateway = RequestGateway::with_timeouts(
        "http://127.0.0.1:9",
        store,
        Duration::from_secs(5),
        Duration::from_secs(1),
    );

    let err = get_data(&gateway).await.unwrap_err();
    assert_eq!(err.class(), FailureClass::Network);
    assert!(!gateway.check_connection().await);
}
