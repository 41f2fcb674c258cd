// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session pool integration tests.
//!
//! Node services run over the pooling client facade with a mock session
//! factory standing in for the OPC stack.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uareg_opcua::error::status;
use uareg_opcua::{
    ClientSettings, ErrorKind, NodeId, NodeServices, ServerEndpoint, UaValue,
};
use uareg_tests::common::{assert_sessions, init_test_logging, wait_until, ClientHarness};

const PLC: &str = "opc.tcp://plc-1:4840";
const TEMPERATURE: &str = "ns=2;i=1001";
const SETPOINT: &str = "ns=2;s=Setpoint";

fn harness() -> (ClientHarness, NodeServices) {
    init_test_logging();
    let harness = ClientHarness::new();
    harness.factory.on_open(|session| {
        session.set_value(NodeId::numeric(2, 1001), UaValue::Double(21.5));
        session.set_value(NodeId::string(2, "Setpoint"), UaValue::Int64(0));
    });
    let services = NodeServices::new(harness.client.clone());
    (harness, services)
}

fn plc() -> ServerEndpoint {
    ServerEndpoint::new(PLC).trusted(true)
}

// =============================================================================
// Session Reuse
// =============================================================================

#[tokio::test]
async fn test_consecutive_calls_share_one_session() {
    let (harness, services) = harness();

    for _ in 0..3 {
        let read = services.read_value(&plc(), TEMPERATURE).await.unwrap();
        assert_eq!(read.value, json!(21.5));
        assert_eq!(read.status_code, status::GOOD);
    }

    let stats = harness.client.stats();
    assert_sessions(&stats, 1, 2);
    assert_eq!(stats.idle_sessions, 1);
    assert_eq!(harness.factory.open_count(), 1);
    assert_eq!(harness.factory.discovery_count(), 1);
}

#[tokio::test]
async fn test_write_then_read_on_pooled_session() {
    let (harness, services) = harness();

    services
        .write_value(&plc(), SETPOINT, &json!(42))
        .await
        .unwrap();
    let read = services.read_value(&plc(), SETPOINT).await.unwrap();

    assert_eq!(read.value, json!(42));
    assert_sessions(&harness.client.stats(), 1, 1);
}

#[tokio::test]
async fn test_method_call_returns_outputs() {
    let (_harness, services) = harness();

    let result = services
        .call_method(
            &plc(),
            "ns=2;s=Machine",
            "ns=2;s=Reset",
            &[json!(7), json!("line-3")],
        )
        .await
        .unwrap();

    assert_eq!(result.outputs, vec![json!(7), json!("line-3")]);
}

#[tokio::test]
async fn test_distinct_endpoints_get_distinct_sessions() {
    let (harness, services) = harness();
    let other = ServerEndpoint::new("opc.tcp://plc-2:4840").trusted(true);

    services.read_value(&plc(), TEMPERATURE).await.unwrap();
    services.read_value(&other, TEMPERATURE).await.unwrap();
    services.read_value(&plc(), TEMPERATURE).await.unwrap();

    assert_sessions(&harness.client.stats(), 2, 1);
    assert_eq!(harness.client.stats().idle_sessions, 2);
}

#[tokio::test]
async fn test_concurrent_calls_all_succeed() {
    let (harness, services) = harness();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let services = services.clone();
            tokio::spawn(async move { services.read_value(&plc(), TEMPERATURE).await })
        })
        .collect();
    for handle in handles {
        let read = handle.await.unwrap().unwrap();
        assert_eq!(read.value, json!(21.5));
    }

    let stats = harness.client.stats();
    assert_eq!(stats.sessions_created as usize, harness.factory.open_count());
    assert_eq!(stats.sessions_created + stats.sessions_reused, 8);
    assert_eq!(stats.idle_sessions, stats.sessions_created);
    assert_eq!(stats.failures, 0);
}

// =============================================================================
// Failure Handling
// =============================================================================

#[tokio::test]
async fn test_transport_error_retried_on_fresh_session() {
    let (harness, services) = harness();
    services.read_value(&plc(), TEMPERATURE).await.unwrap();
    let first = harness.factory.sessions()[0].clone();
    first.fail_next(status::BAD_SECURE_CHANNEL_CLOSED);

    let read = services.read_value(&plc(), TEMPERATURE).await.unwrap();
    assert_eq!(read.value, json!(21.5));

    let stats = harness.client.stats();
    assert_sessions(&stats, 2, 1);
    assert_eq!(stats.retries, 1);
    assert_eq!(stats.sessions_discarded, 1);
    assert_eq!(stats.failures, 0);
    assert!(
        wait_until(Duration::from_secs(1), || {
            let first = first.clone();
            async move { first.close_count() == 1 }
        })
        .await,
        "broken session should be closed in the background"
    );
}

#[tokio::test]
async fn test_transport_error_retried_only_once() {
    let (harness, services) = harness();
    services.read_value(&plc(), TEMPERATURE).await.unwrap();
    harness.factory.sessions()[0].fail_next(status::BAD_TIMEOUT);
    harness.factory.on_open(|session| {
        session.set_value(NodeId::numeric(2, 1001), UaValue::Double(21.5));
        session.fail_next(status::BAD_TIMEOUT);
    });

    let err = services.read_value(&plc(), TEMPERATURE).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(err.is_retryable());

    let stats = harness.client.stats();
    assert_eq!(stats.retries, 1);
    assert_eq!(stats.sessions_discarded, 2);
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.idle_sessions, 0);
}

#[tokio::test]
async fn test_application_error_keeps_session_pooled() {
    let (harness, services) = harness();

    let err = services
        .read_value(&plc(), "ns=2;i=9999")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(status::BAD_NODE_ID_UNKNOWN));
    assert!(!err.is_retryable());

    let stats = harness.client.stats();
    assert_eq!(stats.retries, 0);
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.idle_sessions, 1);

    services.read_value(&plc(), TEMPERATURE).await.unwrap();
    assert_sessions(&harness.client.stats(), 1, 1);
}

#[tokio::test]
async fn test_session_open_failure_is_not_pooled() {
    let (harness, services) = harness();
    harness
        .factory
        .fail_next_open(status::BAD_CONNECTION_REJECTED);

    let err = services.read_value(&plc(), TEMPERATURE).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(harness.client.stats().create_failures, 1);
    assert_eq!(harness.client.stats().idle_sessions, 0);

    services.read_value(&plc(), TEMPERATURE).await.unwrap();
    assert_sessions(&harness.client.stats(), 1, 0);
}

#[tokio::test]
async fn test_invalid_node_id_rejected_before_connecting() {
    let (harness, services) = harness();

    let err = services.read_value(&plc(), "not-a-node").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ArgumentError);
    assert_eq!(harness.factory.open_count(), 0);
}

// =============================================================================
// Keep-Alive
// =============================================================================

#[tokio::test]
async fn test_bad_keep_alive_evicts_idle_session() {
    let (harness, services) = harness();
    services.read_value(&plc(), TEMPERATURE).await.unwrap();

    assert!(harness.factory.keep_alive("session-1", status::GOOD));
    assert_eq!(harness.client.stats().idle_sessions, 1);

    assert!(harness
        .factory
        .keep_alive("session-1", status::BAD_SECURE_CHANNEL_CLOSED));
    let stats = harness.client.stats();
    assert_eq!(stats.sessions_evicted, 1);
    assert_eq!(stats.idle_sessions, 0);

    services.read_value(&plc(), TEMPERATURE).await.unwrap();
    assert_sessions(&harness.client.stats(), 2, 0);
}

#[tokio::test]
async fn test_keep_alive_for_unknown_session_is_ignored() {
    let (harness, _services) = harness();

    assert!(!harness.factory.keep_alive("session-9", status::BAD_TIMEOUT));
    assert_eq!(harness.client.stats().sessions_evicted, 0);
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_shutdown_closes_idle_sessions() {
    let (harness, services) = harness();
    let other = ServerEndpoint::new("opc.tcp://plc-2:4840").trusted(true);
    services.read_value(&plc(), TEMPERATURE).await.unwrap();
    services.read_value(&other, TEMPERATURE).await.unwrap();

    harness.client.shutdown(Duration::from_secs(1)).await;

    assert_eq!(harness.client.stats().idle_sessions, 0);
    for session in harness.factory.sessions() {
        assert_eq!(session.close_count(), 1);
    }
}

#[tokio::test]
async fn test_try_connect_discovers_without_session() {
    let (harness, _services) = harness();

    let endpoints = harness.client.try_connect(&plc()).await.unwrap();

    assert_eq!(endpoints.len(), 1);
    assert_eq!(harness.factory.discovery_count(), 1);
    assert_eq!(harness.factory.open_count(), 0);
}

#[tokio::test]
async fn test_reverse_proxy_falls_back_to_direct_connection() {
    init_test_logging();
    let harness = ClientHarness::with_settings(ClientSettings {
        use_reverse_proxy: true,
        ..Default::default()
    });

    assert!(harness.client.settings().use_reverse_proxy);
    assert!(!harness.client.uses_proxy());
}

#[tokio::test]
async fn test_services_share_client_pool() {
    let (harness, services) = harness();
    let other = NodeServices::new(Arc::clone(&harness.client));

    services.read_value(&plc(), TEMPERATURE).await.unwrap();
    other.read_value(&plc(), TEMPERATURE).await.unwrap();

    assert_sessions(&harness.client.stats(), 1, 1);
}
