// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Registry integration tests.
//!
//! Application lifecycle, explicit endpoint activation, edge module
//! queries and discovery orchestration over one in-memory twin store.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use uareg_core::models::{
    ApplicationRegistrationUpdateModel, DiscoveryRequestModel, EndpointActivationFilterModel,
    EndpointInfoModel,
};
use uareg_core::registration::identity;
use uareg_core::twin::TwinStore;
use uareg_core::types::{IdentityType, SecurityMode};
use uareg_core::RegistryError;
use uareg_registry::orchestrator::DISCOVERY_REQUEST_PROPERTY;
use uareg_registry::{
    DiscoveryOrchestrator, ModuleRegistry, OrchestratorConfig, SupervisorTwinDiscoveryClient,
};
use uareg_tests::common::{
    init_test_logging, wait_until, ApplicationAssertions, ApplicationFixtures, DiscoveryFixtures,
    EndpointAssertions, IdentityFixtures, MockDiscoveryClient, RegistryHarness,
    StaticDiscovererSource, BASIC256SHA256,
};

const LINE: &str = "urn:line-1";

fn application_id(uri: &str) -> String {
    identity::application_id(Some(IdentityFixtures::site()), Some(uri)).unwrap()
}

fn secure_filter() -> EndpointActivationFilterModel {
    EndpointActivationFilterModel {
        security_mode: Some(SecurityMode::SignAndEncrypt),
        security_policies: Some(vec![BASIC256SHA256.to_string()]),
        ..Default::default()
    }
}

fn secure(endpoints: &[EndpointInfoModel]) -> &EndpointInfoModel {
    endpoints
        .iter()
        .find(|e| e.registration.endpoint.security_mode == Some(SecurityMode::SignAndEncrypt))
        .expect("secure endpoint")
}

/// Discovers [`LINE`] with both endpoints and returns the application id.
async fn discover_line(harness: &RegistryHarness, activate: bool) -> String {
    let result = if activate {
        DiscoveryFixtures::sweep_with_filter(secure_filter())
    } else {
        DiscoveryFixtures::sweep()
    };
    harness
        .applications
        .process_discovery_events(
            IdentityFixtures::site(),
            &IdentityFixtures::discoverer_id(IdentityFixtures::edge_device()),
            &result,
            DiscoveryFixtures::dual_endpoint_server(LINE, "line-1"),
        )
        .await
        .unwrap();
    application_id(LINE)
}

fn supervisor_secret(harness: &RegistryHarness, endpoint_id: &str) -> Option<String> {
    harness
        .supervisor_twin()
        .and_then(|t| t.desired().cloned())
        .and_then(|d| d.get(endpoint_id).and_then(|v| v.as_str()).map(str::to_string))
}

// =============================================================================
// Application Lifecycle
// =============================================================================

#[tokio::test]
async fn test_register_and_read_application() {
    init_test_logging();
    let harness = RegistryHarness::new();

    let id = harness
        .applications
        .register_application(ApplicationFixtures::server_request(LINE))
        .await
        .unwrap();
    assert_eq!(id, application_id(LINE));

    let registration = harness.applications.get_application(&id, false).await.unwrap();
    assert_eq!(registration.application.application_uri, LINE);
    assert_eq!(
        registration.application.site_id.as_deref(),
        Some(IdentityFixtures::site())
    );
    registration.application.assert_enabled();
    assert!(registration.endpoints.is_empty());
    assert_eq!(
        harness.application_events.take(),
        vec![format!("new:{LINE}"), format!("enabled:{LINE}")]
    );
}

#[tokio::test]
async fn test_register_twice_conflicts() {
    let harness = RegistryHarness::new();
    harness
        .applications
        .register_application(ApplicationFixtures::server_request(LINE))
        .await
        .unwrap();

    let err = harness
        .applications
        .register_application(ApplicationFixtures::server_request(LINE))
        .await
        .unwrap_err();
    assert!(err.is_conflict(), "{err}");
}

#[tokio::test]
async fn test_register_without_uri_rejected() {
    let harness = RegistryHarness::new();
    let mut request = ApplicationFixtures::server_request(LINE);
    request.application_uri = None;

    let err = harness
        .applications
        .register_application(request)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Argument { .. }), "{err}");
}

#[tokio::test]
async fn test_update_retries_out_of_date_patch() {
    init_test_logging();
    let harness = RegistryHarness::new();
    let id = harness
        .applications
        .register_application(ApplicationFixtures::server_request(LINE))
        .await
        .unwrap();
    harness.clear_events();

    harness.flaky.fail_next_patches(2);
    harness
        .applications
        .update_application(
            &id,
            ApplicationRegistrationUpdateModel {
                application_name: Some("Line 1 controller".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(harness.flaky.patch_calls(), 3);
    let application = harness.applications.get_application(&id, false).await.unwrap();
    assert_eq!(
        application.application.application_name.as_deref(),
        Some("Line 1 controller")
    );
    assert_eq!(harness.application_events.take(), vec![format!("updated:{LINE}")]);
}

#[tokio::test]
async fn test_update_unknown_application_not_found() {
    let harness = RegistryHarness::new();

    let err = harness
        .applications
        .update_application(&application_id(LINE), Default::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "{err}");
}

#[tokio::test]
async fn test_disable_enable_cascades_to_endpoints() {
    init_test_logging();
    let harness = RegistryHarness::new();
    harness.seed_supervisor(true).await;
    let id = discover_line(&harness, true).await;
    let endpoints = harness
        .endpoints
        .get_application_endpoints(&id, false, false)
        .await
        .unwrap();
    let secure_id = secure(&endpoints).registration.id.clone();
    assert!(supervisor_secret(&harness, &secure_id).is_some());
    harness.clear_events();

    harness.applications.disable_application(&id, None).await.unwrap();

    let application = harness.applications.get_application(&id, false).await.unwrap();
    application.application.assert_disabled();
    assert_eq!(application.endpoints.len(), 2);
    assert!(harness
        .endpoints
        .get_application_endpoints(&id, false, false)
        .await
        .unwrap()
        .is_empty());
    assert!(supervisor_secret(&harness, &secure_id).is_none());
    assert_eq!(harness.endpoint_events.of_kind("deactivated").len(), 1);
    assert_eq!(harness.endpoint_events.of_kind("disabled").len(), 2);
    harness.clear_events();

    harness.applications.enable_application(&id, None).await.unwrap();

    let endpoints = harness
        .endpoints
        .get_application_endpoints(&id, false, false)
        .await
        .unwrap();
    assert_eq!(endpoints.len(), 2);
    secure(&endpoints).assert_activated();
    assert!(supervisor_secret(&harness, &secure_id).is_some());
    assert_eq!(harness.endpoint_events.of_kind("enabled").len(), 2);
    assert_eq!(harness.endpoint_events.of_kind("activated").len(), 1);
    assert_eq!(
        harness.application_events.take(),
        vec![format!("enabled:{LINE}")]
    );
}

#[tokio::test]
async fn test_disable_twice_notifies_once() {
    let harness = RegistryHarness::new();
    let id = discover_line(&harness, false).await;
    harness.clear_events();

    harness.applications.disable_application(&id, None).await.unwrap();
    harness.applications.disable_application(&id, None).await.unwrap();

    assert_eq!(
        harness.application_events.take(),
        vec![format!("disabled:{LINE}")]
    );
}

#[tokio::test]
async fn test_unregister_deletes_endpoints() {
    init_test_logging();
    let harness = RegistryHarness::new();
    harness.seed_supervisor(true).await;
    let id = discover_line(&harness, true).await;
    let endpoints = harness
        .endpoints
        .get_application_endpoints(&id, false, false)
        .await
        .unwrap();
    let secure_id = secure(&endpoints).registration.id.clone();
    harness.clear_events();

    harness.applications.unregister_application(&id, None).await.unwrap();

    let err = harness.applications.get_application(&id, false).await.unwrap_err();
    assert!(err.is_not_found(), "{err}");
    assert!(harness
        .endpoints
        .get_application_endpoints(&id, true, false)
        .await
        .unwrap()
        .is_empty());
    assert!(supervisor_secret(&harness, &secure_id).is_none());
    assert_eq!(harness.endpoint_events.of_kind("deleted").len(), 2);
    assert_eq!(
        harness.application_events.take(),
        vec![format!("deleted:{LINE}")]
    );

    // Unregistering again is a no-op.
    harness.applications.unregister_application(&id, None).await.unwrap();
}

#[tokio::test]
async fn test_purge_removes_only_stale_disabled_applications() {
    init_test_logging();
    let harness = RegistryHarness::new();
    let stale = discover_line(&harness, false).await;
    let live = harness
        .applications
        .register_application(ApplicationFixtures::server_request("urn:line-2"))
        .await
        .unwrap();
    harness.applications.disable_application(&stale, None).await.unwrap();

    let purged = harness
        .applications
        .purge_disabled_applications(Duration::from_secs(3600), None)
        .await
        .unwrap();
    assert_eq!(purged, 0);

    tokio::time::sleep(Duration::from_millis(20)).await;
    let purged = harness
        .applications
        .purge_disabled_applications(Duration::from_millis(1), None)
        .await
        .unwrap();
    assert_eq!(purged, 1);

    assert!(harness
        .applications
        .get_application(&stale, false)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(harness
        .endpoints
        .get_application_endpoints(&stale, true, false)
        .await
        .unwrap()
        .is_empty());
    harness
        .applications
        .get_application(&live, false)
        .await
        .unwrap()
        .application
        .assert_enabled();
}

#[tokio::test]
async fn test_list_sites_pages_sorted() {
    let harness = RegistryHarness::new();
    for (uri, site) in [("urn:a", "site-b"), ("urn:b", "site-a"), ("urn:c", "site-c")] {
        let mut request = ApplicationFixtures::server_request(uri);
        request.site_id = Some(site.to_string());
        harness.applications.register_application(request).await.unwrap();
    }

    let first = harness.applications.list_sites(None, Some(2)).await.unwrap();
    assert_eq!(first.sites, vec!["site-a", "site-b"]);
    let token = first.continuation_token.expect("second page");

    let second = harness
        .applications
        .list_sites(Some(&token), Some(2))
        .await
        .unwrap();
    assert_eq!(second.sites, vec!["site-c"]);
    assert!(second.continuation_token.is_none());
}

#[tokio::test]
async fn test_list_applications_includes_disabled() {
    let harness = RegistryHarness::new();
    let id = discover_line(&harness, false).await;
    harness
        .applications
        .register_application(ApplicationFixtures::server_request("urn:line-2"))
        .await
        .unwrap();
    harness.applications.disable_application(&id, None).await.unwrap();

    let list = harness.applications.list_applications(None, None).await.unwrap();

    assert_eq!(list.items.len(), 2);
}

// =============================================================================
// Explicit Activation
// =============================================================================

#[tokio::test]
async fn test_explicit_activation_requires_connected_supervisor() {
    init_test_logging();
    let harness = RegistryHarness::new();
    harness.seed_supervisor(false).await;
    let id = discover_line(&harness, false).await;
    let endpoints = harness
        .endpoints
        .get_application_endpoints(&id, false, false)
        .await
        .unwrap();
    let endpoint_id = secure(&endpoints).registration.id.clone();

    assert!(harness
        .endpoints
        .activate_endpoint(&endpoint_id, None)
        .await
        .is_err());
    harness
        .endpoints
        .get_endpoint(&endpoint_id, false)
        .await
        .unwrap()
        .assert_deactivated();
    assert!(supervisor_secret(&harness, &endpoint_id).is_none());

    harness.store.set_connection_state(
        IdentityFixtures::edge_device(),
        Some(IdentityFixtures::supervisor_module()),
        true,
    );
    harness
        .endpoints
        .activate_endpoint(&endpoint_id, None)
        .await
        .unwrap();
    harness
        .endpoints
        .get_endpoint(&endpoint_id, false)
        .await
        .unwrap()
        .assert_activated();
    assert!(supervisor_secret(&harness, &endpoint_id).is_some());

    harness
        .endpoints
        .deactivate_endpoint(&endpoint_id, None)
        .await
        .unwrap();
    harness
        .endpoints
        .get_endpoint(&endpoint_id, false)
        .await
        .unwrap()
        .assert_deactivated();
    assert!(supervisor_secret(&harness, &endpoint_id).is_none());
}

#[tokio::test]
async fn test_disabled_endpoint_cannot_be_activated() {
    let harness = RegistryHarness::new();
    harness.seed_supervisor(true).await;
    let id = discover_line(&harness, false).await;
    let endpoints = harness
        .endpoints
        .get_application_endpoints(&id, false, false)
        .await
        .unwrap();
    let endpoint_id = secure(&endpoints).registration.id.clone();
    harness.applications.disable_application(&id, None).await.unwrap();

    let err = harness
        .endpoints
        .activate_endpoint(&endpoint_id, None)
        .await
        .unwrap_err();
    assert!(
        matches!(err, RegistryError::ResourceInvalidState { .. }),
        "{err}"
    );
}

// =============================================================================
// Edge Modules
// =============================================================================

#[tokio::test]
async fn test_connected_supervisors() {
    let harness = RegistryHarness::new();
    let online = harness.seed_supervisor(true).await;
    harness
        .seed_module(IdentityType::Supervisor, "edge-02", "twin", false)
        .await;
    harness
        .seed_module(IdentityType::Publisher, "edge-03", "publisher", true)
        .await;

    let connected = harness.supervisors.connected().await.unwrap();

    assert_eq!(connected.len(), 1);
    assert_eq!(connected[0].id, online);
    assert_eq!(connected[0].kind, IdentityType::Supervisor);
}

#[tokio::test]
async fn test_module_registry_rejects_non_module_kinds() {
    let harness = RegistryHarness::new();
    let store: Arc<dyn TwinStore> = harness.flaky.clone();

    assert!(ModuleRegistry::new(store.clone(), IdentityType::Application).is_err());
    assert!(ModuleRegistry::new(store, IdentityType::Gateway).is_ok());
}

// =============================================================================
// Discovery Orchestration
// =============================================================================

#[tokio::test]
async fn test_orchestrator_writes_requests_to_connected_supervisors() {
    init_test_logging();
    let harness = RegistryHarness::new();
    let online = harness.seed_supervisor(true).await;
    harness
        .seed_module(IdentityType::Supervisor, "edge-02", "twin", false)
        .await;

    let store: Arc<dyn TwinStore> = harness.flaky.clone();
    let orchestrator = DiscoveryOrchestrator::new(
        Arc::new(ModuleRegistry::supervisors(store.clone())),
        Arc::new(SupervisorTwinDiscoveryClient::new(store)),
        OrchestratorConfig {
            activation_filter: Some(secure_filter()),
            ..Default::default()
        },
    );
    assert_eq!(orchestrator.refresh().await.unwrap(), 1);

    let report = orchestrator
        .discover(&DiscoveryRequestModel {
            id: Some("req-1".to_string()),
            ..Default::default()
        })
        .await;
    assert!(report.is_complete());
    assert_eq!(report.succeeded, vec![online]);

    let desired = harness
        .supervisor_twin()
        .and_then(|t| t.desired().cloned())
        .unwrap_or_default();
    let request: DiscoveryRequestModel = serde_json::from_value(
        desired
            .get(DISCOVERY_REQUEST_PROPERTY)
            .cloned()
            .expect("request on supervisor twin"),
    )
    .unwrap();
    assert_eq!(request.id.as_deref(), Some("req-1"));
    assert_eq!(
        request.configuration.and_then(|c| c.activation_filter),
        Some(secure_filter())
    );

    let offline = harness
        .store
        .snapshot("edge-02", Some("twin"))
        .and_then(|t| t.desired().cloned())
        .unwrap_or_default();
    assert!(!offline.contains_key(DISCOVERY_REQUEST_PROPERTY));
}

#[tokio::test]
async fn test_orchestrator_isolates_failing_discoverers() {
    init_test_logging();
    let source = StaticDiscovererSource::new(["a", "b", "c"]);
    let client = MockDiscoveryClient::new();
    client.fail_for("b");
    let orchestrator =
        DiscoveryOrchestrator::new(source, client.clone(), OrchestratorConfig::default());
    orchestrator.refresh().await.unwrap();

    let report = orchestrator.discover(&DiscoveryRequestModel::default()).await;

    assert_eq!(report.requested, 3);
    assert_eq!(report.succeeded, vec!["a", "c"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "b");
    assert_eq!(client.requests().len(), 3);
    assert_eq!(orchestrator.stats().target_failures, 1);
}

#[tokio::test]
async fn test_orchestrator_keeps_list_when_refresh_fails() {
    let source = StaticDiscovererSource::new(["a", "b"]);
    let orchestrator = DiscoveryOrchestrator::new(
        source.clone(),
        MockDiscoveryClient::new(),
        OrchestratorConfig::default(),
    );
    orchestrator.refresh().await.unwrap();

    source.set_fail(true);
    assert!(orchestrator.refresh().await.is_err());

    assert_eq!(orchestrator.discoverers(), vec!["a", "b"]);
    let stats = orchestrator.stats();
    assert_eq!((stats.refreshes, stats.refresh_failures), (1, 1));
}

#[tokio::test]
async fn test_orchestrator_without_discoverers_sends_nothing() {
    let client = MockDiscoveryClient::new();
    let orchestrator = DiscoveryOrchestrator::new(
        StaticDiscovererSource::new(Vec::<String>::new()),
        client.clone(),
        OrchestratorConfig::default(),
    );
    orchestrator.refresh().await.unwrap();

    let report = orchestrator.discover(&DiscoveryRequestModel::default()).await;

    assert_eq!(report.requested, 0);
    assert!(client.requests().is_empty());
}

#[tokio::test]
async fn test_orchestrator_loop_refreshes_until_shutdown() {
    init_test_logging();
    let source = StaticDiscovererSource::new(Vec::<String>::new());
    let orchestrator = Arc::new(DiscoveryOrchestrator::new(
        source.clone(),
        MockDiscoveryClient::new(),
        OrchestratorConfig {
            refresh_interval: Duration::from_millis(10),
            retry_interval: Duration::from_millis(10),
            activation_filter: None,
        },
    ));
    let (shutdown, _) = broadcast::channel(1);
    let handle = Arc::clone(&orchestrator).start(shutdown.subscribe());

    source.set(vec!["late".to_string()]);
    let probe = Arc::clone(&orchestrator);
    assert!(
        wait_until(Duration::from_secs(2), || {
            let probe = Arc::clone(&probe);
            async move { probe.discoverers() == vec!["late".to_string()] }
        })
        .await
    );

    shutdown.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("loop should stop")
        .unwrap();
}
