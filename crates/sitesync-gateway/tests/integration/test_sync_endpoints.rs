//! Sync push, history, and health endpoints

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sitesync_core::domain::{
    Assignment, AssignmentStatus, ChangeSet, FailureClass, LinkType, RecordId, SyncHistoryStatus,
    SyncType, TokenPair,
};
use sitesync_core::ports::{IConnectivityProbe, ISyncTransport};
use sitesync_gateway::transport::HealthProbe;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

fn change_set() -> ChangeSet {
    ChangeSet {
        assignments: vec![Assignment {
            id: RecordId::new("a-1").unwrap(),
            user_id: RecordId::new("u-1").unwrap(),
            site_id: RecordId::new("s-1").unwrap(),
            status: AssignmentStatus::Active,
            start_date: None,
            end_date: None,
            notes: None,
            updated_at: Utc::now(),
            revision: 4,
        }],
        max_revision: Some(4),
        ..Default::default()
    }
}

fn tokens() -> Option<TokenPair> {
    Some(TokenPair::new("access-1", "refresh-1"))
}

#[tokio::test]
async fn test_push_change_set_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sync/push"))
        .and(header("authorization", "Bearer access-1"))
        .and(body_partial_json(serde_json::json!({
            "deviceId": "admin-web",
            "assignments": [{"id": "a-1", "status": "active"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let (_store, gateway) = common::gateway(&server, tokens());
    let ack = gateway
        .push_change_set(&change_set(), Some("admin-web"))
        .await
        .expect("push should succeed");
    assert!(ack.success);
}

#[tokio::test]
async fn test_rejected_push_is_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sync/push"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": false})))
        .mount(&server)
        .await;

    let (_store, gateway) = common::gateway(&server, tokens());
    let err = gateway.push_change_set(&change_set(), None).await.unwrap_err();
    assert_eq!(err.class(), FailureClass::Server);
}

#[tokio::test]
async fn test_fetch_sync_history() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sync/history"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "timestamp": "2026-03-02T08:00:00Z",
                "type": "incremental",
                "status": "success",
                "deviceId": "admin-web",
                "itemsCount": 3,
                "duration": 410
            },
            {
                "timestamp": "2026-03-02T07:55:00Z",
                "type": "mobile_ingest",
                "status": "failed",
                "deviceId": "phone-7",
                "itemsCount": 0,
                "duration": 90
            }
        ])))
        .mount(&server)
        .await;

    let (_store, gateway) = common::gateway(&server, tokens());
    let history = gateway.fetch_sync_history(5).await.expect("history");

    assert_eq!(history.len(), 2);
    assert_eq!(history[0].sync_type, SyncType::Incremental);
    assert_eq!(history[1].status, SyncHistoryStatus::Failed);
    assert_eq!(history[1].device_id.as_deref(), Some("phone-7"));
}

#[tokio::test]
async fn test_transport_port_maps_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sync/push"))
        .respond_with(ResponseTemplate::new(422).set_body_string("bad payload"))
        .mount(&server)
        .await;

    let (_store, gateway) = common::gateway(&server, tokens());
    let transport: Arc<dyn ISyncTransport> = Arc::new(gateway);
    assert!(transport.has_credentials());

    let err = transport
        .push_change_set(&change_set(), None)
        .await
        .unwrap_err();
    assert_eq!(err.class, FailureClass::Client);
    assert!(err.message.contains("bad payload"));
}

#[tokio::test]
async fn test_transport_without_tokens_has_no_credentials() {
    let server = MockServer::start().await;
    let (_store, gateway) = common::gateway(&server, None);
    assert!(!ISyncTransport::has_credentials(&gateway));
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_check_connection_is_unauthenticated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (_store, gateway) = common::gateway(&server, tokens());
    assert!(gateway.check_connection().await);

    let requests = server.received_requests().await.expect("recording enabled");
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_check_connection_false_on_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (_store, gateway) = common::gateway(&server, None);
    assert!(!gateway.check_connection().await);
}

#[tokio::test]
async fn test_health_uses_its_own_short_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let (_store, gateway) = common::gateway_with_timeouts(
        &server,
        None,
        Duration::from_secs(5),
        Duration::from_millis(100),
    );
    let (reachable, elapsed) = gateway.probe_health().await;
    assert!(!reachable);
    assert!(elapsed < Duration::from_millis(500));
}

#[tokio::test]
async fn test_health_probe_reports_link_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (_store, gateway) = common::gateway(&server, None);
    let probe = HealthProbe::new(Arc::new(gateway));
    let result = probe.probe().await;
    assert!(result.reachable);
    assert_eq!(result.link_type, LinkType::Unknown);
}
