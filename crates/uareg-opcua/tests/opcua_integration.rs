// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client integration tests.
//!
//! The first group drives the client facade end to end against the in-process
//! mock stack. The second group needs a running OPC UA server and the
//! `real-transport` feature.
//!
//! # Environment Variables
//!
//! - `OPCUA_TEST_ENDPOINT`: OPC UA server endpoint (default: opc.tcp://localhost:4840)
//!
//! # Running Tests
//!
//! ```bash
//! # Mock stack only
//! cargo test -p uareg-opcua --test opcua_integration
//!
//! # Against a simulator
//! cargo test -p uareg-opcua --features real-transport --test opcua_integration -- --ignored
//! ```

use std::sync::Arc;
use std::time::Duration;

use uareg_opcua::client::mock::{MockSession, MockSessionFactory};
use uareg_opcua::error::status;
use uareg_opcua::nodes::{BrowseNodeRequest, NodeServices};
use uareg_opcua::types::{ReadRequest, ReferenceDescription};
use uareg_opcua::{
    ClientSettings, ErrorKind, NodeClass, NodeId, OpcUaServerClient, ServerEndpoint,
    SessionFactory, UaSession, UaValue, UserIdentity,
};

// =============================================================================
// Test Configuration
// =============================================================================

const PLC: &str = "opc.tcp://plc1:4840";

fn seed(session: &MockSession) {
    session.set_value(NodeId::root_folder(), UaValue::Null);
    session.set_value(NodeId::objects_folder(), UaValue::Null);
    session.add_reference(
        NodeId::root_folder(),
        ReferenceDescription {
            reference_type_id: NodeId::numeric(0, 35),
            is_forward: true,
            node_id: NodeId::objects_folder(),
            browse_name: "Objects".to_string(),
            display_name: "Objects".to_string(),
            node_class: Some(NodeClass::Object),
            type_definition: Some(NodeId::numeric(0, 61)),
        },
    );
    session.add_reference(
        NodeId::objects_folder(),
        ReferenceDescription {
            reference_type_id: NodeId::numeric(0, 47),
            is_forward: true,
            node_id: NodeId::string(2, "Speed"),
            browse_name: "2:Speed".to_string(),
            display_name: "Speed".to_string(),
            node_class: Some(NodeClass::Variable),
            type_definition: Some(NodeId::numeric(0, 63)),
        },
    );
    session.set_value(NodeId::string(2, "Speed"), UaValue::Int32(1200));
}

fn setup() -> (Arc<OpcUaServerClient>, Arc<MockSessionFactory>) {
    let factory = MockSessionFactory::new();
    factory.on_open(seed);
    let client = OpcUaServerClient::new(
        Arc::clone(&factory) as Arc<dyn SessionFactory>,
        ClientSettings::default(),
    );
    (Arc::new(client), factory)
}

// =============================================================================
// Mock Stack Tests
// =============================================================================

#[tokio::test]
async fn test_sessions_are_pooled_per_identity() {
    let (client, factory) = setup();
    let anonymous = ServerEndpoint::new(PLC);
    let operator = ServerEndpoint::new(PLC).with_identity(UserIdentity::user_name("op", "pw"));

    for endpoint in [&anonymous, &operator, &anonymous, &operator] {
        client
            .execute_service(endpoint, |session| async move {
                session.read(&[ReadRequest::value(NodeId::string(2, "Speed"))]).await
            })
            .await
            .unwrap();
    }

    assert_eq!(factory.open_count(), 2);
    let stats = client.stats();
    assert_eq!(stats.sessions_created, 2);
    assert_eq!(stats.sessions_reused, 2);
    assert_eq!(stats.idle_sessions, 2);
}

#[tokio::test]
async fn test_node_services_end_to_end() {
    let (client, _) = setup();
    let services = NodeServices::new(Arc::clone(&client));
    let endpoint = ServerEndpoint::new(PLC);

    let root = services
        .browse(&endpoint, BrowseNodeRequest::default())
        .await
        .unwrap();
    assert_eq!(root.references[0].target.display_name.as_deref(), Some("Objects"));
    assert_eq!(root.references[0].type_definition.as_deref(), Some("i=61"));

    let objects = services
        .browse(&endpoint, BrowseNodeRequest::node("i=85").read_values(true))
        .await
        .unwrap();
    assert_eq!(objects.references[0].target.value, Some(serde_json::json!(1200)));

    services
        .write_value(&endpoint, "ns=2;s=Speed", &serde_json::json!(1500))
        .await
        .unwrap();
    let value = services.read_value(&endpoint, "ns=2;s=Speed").await.unwrap();
    assert_eq!(value.value, serde_json::json!(1500));
    assert_eq!(client.stats().sessions_created, 1);
}

#[tokio::test]
async fn test_transport_failures_retry_exactly_once() {
    let (client, factory) = setup();
    factory.on_open(|session| {
        seed(session);
        session.fail_next(status::BAD_TCP_SERVER_TOO_BUSY);
    });

    let error = client
        .execute_service(&ServerEndpoint::new(PLC), |session| async move {
            session.read(&[ReadRequest::value(NodeId::string(2, "Speed"))]).await
        })
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::ServerBusy);
    assert_eq!(factory.open_count(), 2);
    let stats = client.stats();
    assert_eq!(stats.retries, 1);
    assert_eq!(stats.sessions_discarded, 2);
    assert_eq!(stats.idle_sessions, 0);
}

#[tokio::test]
async fn test_security_failures_surface_without_retry() {
    let (client, factory) = setup();
    factory.fail_next_open(status::BAD_CERTIFICATE_UNTRUSTED);

    let error = client
        .execute_service(&ServerEndpoint::new(PLC), |session| async move {
            session.read(&[ReadRequest::value(NodeId::string(2, "Speed"))]).await
        })
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::CertificateUntrusted);
    assert!(error.kind().is_security());
    assert_eq!(client.stats().create_failures, 1);
}

#[tokio::test]
async fn test_shutdown_closes_idle_sessions() {
    let (client, factory) = setup();
    client
        .execute_service(&ServerEndpoint::new(PLC), |session| async move {
            session.read(&[ReadRequest::value(NodeId::string(2, "Speed"))]).await
        })
        .await
        .unwrap();

    client.shutdown(Duration::from_secs(1)).await;

    assert_eq!(factory.sessions()[0].close_count(), 1);
    assert_eq!(client.pool().total_idle(), 0);
    assert_eq!(client.cleanup().stats().closed(), 1);
}

// =============================================================================
// Real Server Tests
// =============================================================================

#[cfg(feature = "real-transport")]
mod real_server {
    use super::*;
    use uareg_opcua::RealSessionFactory;

    fn test_endpoint() -> String {
        std::env::var("OPCUA_TEST_ENDPOINT")
            .unwrap_or_else(|_| "opc.tcp://localhost:4840".to_string())
    }

    fn client() -> Arc<OpcUaServerClient> {
        let settings = ClientSettings {
            pki_dir: std::env::temp_dir().join("uareg-opcua-tests"),
            ..Default::default()
        };
        let factory = Arc::new(RealSessionFactory::new(settings.clone()));
        Arc::new(OpcUaServerClient::new(factory, settings))
    }

    #[tokio::test]
    #[ignore = "Requires OPC UA simulator"]
    async fn test_real_server_discovery() {
        let client = client();
        let endpoints = client
            .try_connect(&ServerEndpoint::new(test_endpoint()))
            .await
            .unwrap();
        assert!(endpoints.iter().any(|e| e.is_ua_tcp()));
    }

    #[tokio::test]
    #[ignore = "Requires OPC UA simulator"]
    async fn test_real_server_browse() {
        let services = NodeServices::new(client());
        let result = services
            .browse(
                &ServerEndpoint::new(test_endpoint()).trusted(true),
                BrowseNodeRequest::node("i=85").follow_continuation(true),
            )
            .await
            .unwrap();
        assert!(!result.references.is_empty());
    }
}
