//! Integration tests for sitesync-gateway
//!
//! Uses wiremock to simulate the administration server and verifies the
//! request gateway's authentication, refresh, timeout, and classification
//! behavior, plus the sync and health endpoints.

mod common;

mod test_request_gateway;
mod test_sync_endpoints;
