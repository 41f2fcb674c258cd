// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Discovery reconciliation integration tests.
//!
//! Discovery sweeps run through the application registry into the
//! endpoint registry, over an in-memory twin store and the supervisor twin
//! activator.

use uareg_core::models::{EndpointActivationFilterModel, EndpointInfoModel};
use uareg_core::registration::identity;
use uareg_core::types::SecurityMode;
use uareg_core::RegistryError;
use uareg_tests::common::{
    assert_report, init_test_logging, ApplicationAssertions, DiscoveryFixtures,
    EndpointAssertions, IdentityFixtures, RegistryHarness, RegistryHarnessConfig,
    BASIC256SHA256,
};

fn application_id(uri: &str) -> String {
    identity::application_id(Some(IdentityFixtures::site()), Some(uri)).unwrap()
}

fn discoverer() -> String {
    IdentityFixtures::discoverer_id(IdentityFixtures::edge_device())
}

fn secure_filter() -> EndpointActivationFilterModel {
    EndpointActivationFilterModel {
        security_mode: Some(SecurityMode::SignAndEncrypt),
        security_policies: Some(vec![BASIC256SHA256.to_string()]),
        ..Default::default()
    }
}

fn with_mode(endpoints: &[EndpointInfoModel], mode: SecurityMode) -> &EndpointInfoModel {
    endpoints
        .iter()
        .find(|e| e.registration.endpoint.security_mode == Some(mode))
        .unwrap_or_else(|| panic!("no {mode:?} endpoint in {endpoints:?}"))
}

async fn sweep(
    harness: &RegistryHarness,
    result: &uareg_core::models::DiscoveryResultModel,
    servers: &[&str],
) -> uareg_registry::ReconcileReport {
    let events = servers
        .iter()
        .flat_map(|uri| DiscoveryFixtures::dual_endpoint_server(uri, &uri.replace("urn:", "")))
        .collect();
    harness
        .applications
        .process_discovery_events(IdentityFixtures::site(), &discoverer(), result, events)
        .await
        .unwrap()
}

// =============================================================================
// Auto-Activation
// =============================================================================

#[tokio::test]
async fn test_sweep_activates_matching_endpoints_on_connected_supervisor() {
    init_test_logging();
    let harness = RegistryHarness::new();
    harness.seed_supervisor(true).await;

    let report = sweep(
        &harness,
        &DiscoveryFixtures::sweep_with_filter(secure_filter()),
        &["urn:plc-1"],
    )
    .await;
    assert_report(&report, 1, 0, 0, 0);

    let endpoints = harness
        .endpoints
        .get_application_endpoints(&application_id("urn:plc-1"), false, false)
        .await
        .unwrap();
    assert_eq!(endpoints.len(), 2);
    let secure = with_mode(&endpoints, SecurityMode::SignAndEncrypt);
    let open = with_mode(&endpoints, SecurityMode::None);
    secure.assert_activated();
    open.assert_deactivated();

    let supervisor = harness.supervisor_twin().unwrap();
    let desired = supervisor.desired().cloned().unwrap_or_default();
    let secret = desired
        .get(&secure.registration.id)
        .and_then(|v| v.as_str())
        .expect("endpoint secret on supervisor twin");
    assert!(!secret.is_empty());
    assert!(!desired.contains_key(&open.registration.id));

    assert_eq!(harness.endpoint_events.of_kind("new").len(), 2);
    assert_eq!(harness.endpoint_events.of_kind("activated").len(), 1);
}

#[tokio::test]
async fn test_sweep_leaves_endpoints_inactive_when_supervisor_offline() {
    init_test_logging();
    let harness = RegistryHarness::new();
    harness.seed_supervisor(false).await;

    let report = sweep(
        &harness,
        &DiscoveryFixtures::sweep_with_filter(secure_filter()),
        &["urn:plc-1"],
    )
    .await;
    assert_report(&report, 1, 0, 0, 0);

    let endpoints = harness
        .endpoints
        .get_application_endpoints(&application_id("urn:plc-1"), false, false)
        .await
        .unwrap();
    assert_eq!(endpoints.len(), 2);
    for endpoint in &endpoints {
        endpoint.assert_deactivated();
    }
    let desired = harness
        .supervisor_twin()
        .and_then(|t| t.desired().cloned())
        .unwrap_or_default();
    assert!(endpoints
        .iter()
        .all(|e| !desired.contains_key(&e.registration.id)));
    assert!(harness.endpoint_events.of_kind("activated").is_empty());
}

#[tokio::test]
async fn test_sweep_without_filter_activates_nothing() {
    init_test_logging();
    let harness = RegistryHarness::new();
    harness.seed_supervisor(true).await;

    sweep(&harness, &DiscoveryFixtures::sweep(), &["urn:plc-1"]).await;

    let endpoints = harness
        .endpoints
        .get_application_endpoints(&application_id("urn:plc-1"), false, false)
        .await
        .unwrap();
    for endpoint in &endpoints {
        endpoint.assert_deactivated();
    }
}

// =============================================================================
// Removal
// =============================================================================

#[tokio::test]
async fn test_lost_endpoint_is_soft_disabled() {
    init_test_logging();
    let harness = RegistryHarness::new();
    harness.seed_supervisor(true).await;
    sweep(&harness, &DiscoveryFixtures::sweep(), &["urn:plc-1"]).await;
    harness.clear_events();

    let secure_only = vec![DiscoveryFixtures::event(
        "urn:plc-1",
        "opc.tcp://plc-1:4840",
        SecurityMode::SignAndEncrypt,
    )];
    let report = harness
        .applications
        .process_discovery_events(
            IdentityFixtures::site(),
            &discoverer(),
            &DiscoveryFixtures::sweep(),
            secure_only,
        )
        .await
        .unwrap();
    assert_eq!(report.added, 0);
    assert_eq!(report.removed, 0);

    let id = application_id("urn:plc-1");
    let live = harness
        .endpoints
        .get_application_endpoints(&id, false, false)
        .await
        .unwrap();
    assert_eq!(live.len(), 1);
    let all = harness
        .endpoints
        .get_application_endpoints(&id, true, false)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    with_mode(&all, SecurityMode::None).assert_not_seen();
    assert_eq!(harness.endpoint_events.of_kind("disabled").len(), 1);

    let application = harness.applications.get_application(&id, false).await.unwrap();
    application.application.assert_enabled();
}

#[tokio::test]
async fn test_lost_endpoint_is_deleted_with_hard_delete() {
    init_test_logging();
    let harness = RegistryHarness::with_config(RegistryHarnessConfig {
        hard_delete: true,
        ..Default::default()
    });
    harness.seed_supervisor(true).await;
    sweep(&harness, &DiscoveryFixtures::sweep(), &["urn:plc-1"]).await;
    harness.clear_events();

    let secure_only = vec![DiscoveryFixtures::event(
        "urn:plc-1",
        "opc.tcp://plc-1:4840",
        SecurityMode::SignAndEncrypt,
    )];
    harness
        .applications
        .process_discovery_events(
            IdentityFixtures::site(),
            &discoverer(),
            &DiscoveryFixtures::sweep(),
            secure_only,
        )
        .await
        .unwrap();

    let all = harness
        .endpoints
        .get_application_endpoints(&application_id("urn:plc-1"), true, false)
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    with_mode(&all, SecurityMode::SignAndEncrypt);
    assert_eq!(harness.endpoint_events.of_kind("deleted").len(), 1);
    assert!(harness.endpoint_events.of_kind("disabled").is_empty());
}

#[tokio::test]
async fn test_unfound_application_disabled_with_endpoints() {
    init_test_logging();
    let harness = RegistryHarness::new();
    sweep(&harness, &DiscoveryFixtures::sweep(), &["urn:plc-1", "urn:plc-2"]).await;
    harness.clear_events();

    let report = sweep(&harness, &DiscoveryFixtures::sweep(), &["urn:plc-1"]).await;
    assert_eq!(report.removed, 1);
    assert_eq!(report.added, 0);

    let lost = application_id("urn:plc-2");
    let application = harness.applications.get_application(&lost, false).await.unwrap();
    application.application.assert_disabled();
    let endpoints = harness
        .endpoints
        .get_application_endpoints(&lost, true, false)
        .await
        .unwrap();
    assert_eq!(endpoints.len(), 2);
    for endpoint in &endpoints {
        endpoint.assert_not_seen();
    }
    let events = harness.application_events.take();
    assert!(events.contains(&"disabled:urn:plc-2".to_string()), "{events:?}");
    assert!(!events.iter().any(|e| e.ends_with("urn:plc-1") && !e.starts_with("updated")));
}

#[tokio::test]
async fn test_rediscovered_application_is_enabled_again() {
    init_test_logging();
    let harness = RegistryHarness::new();
    sweep(&harness, &DiscoveryFixtures::sweep(), &["urn:plc-1", "urn:plc-2"]).await;
    sweep(&harness, &DiscoveryFixtures::sweep(), &["urn:plc-1"]).await;
    harness.clear_events();

    let report = sweep(&harness, &DiscoveryFixtures::sweep(), &["urn:plc-1", "urn:plc-2"]).await;
    assert!(report.updated >= 1, "{report:?}");
    assert_eq!(report.removed, 0);

    let id = application_id("urn:plc-2");
    let application = harness.applications.get_application(&id, false).await.unwrap();
    application.application.assert_enabled();
    let endpoints = harness
        .endpoints
        .get_application_endpoints(&id, false, false)
        .await
        .unwrap();
    assert_eq!(endpoints.len(), 2);
    assert!(harness
        .application_events
        .take()
        .contains(&"enabled:urn:plc-2".to_string()));
}

#[tokio::test]
async fn test_register_only_never_removes() {
    init_test_logging();
    let harness = RegistryHarness::new();
    sweep(&harness, &DiscoveryFixtures::sweep(), &["urn:plc-1", "urn:plc-2"]).await;

    let partial = vec![DiscoveryFixtures::event(
        "urn:plc-1",
        "opc.tcp://plc-1:4840",
        SecurityMode::SignAndEncrypt,
    )];
    let report = harness
        .applications
        .process_discovery_events(
            IdentityFixtures::site(),
            &discoverer(),
            &DiscoveryFixtures::register_only(),
            partial,
        )
        .await
        .unwrap();
    assert_eq!(report.removed, 0);

    for uri in ["urn:plc-1", "urn:plc-2"] {
        let id = application_id(uri);
        let application = harness.applications.get_application(&id, false).await.unwrap();
        application.application.assert_enabled();
        let endpoints = harness
            .endpoints
            .get_application_endpoints(&id, false, false)
            .await
            .unwrap();
        assert_eq!(endpoints.len(), 2, "{uri} lost endpoints");
    }
}

// =============================================================================
// Ownership
// =============================================================================

#[tokio::test]
async fn test_discoverers_do_not_remove_each_others_applications() {
    init_test_logging();
    let harness = RegistryHarness::new();
    sweep(&harness, &DiscoveryFixtures::sweep(), &["urn:plc-1"]).await;

    let other = IdentityFixtures::discoverer_id("edge-02");
    let report = harness
        .applications
        .process_discovery_events(
            IdentityFixtures::site(),
            &other,
            &DiscoveryFixtures::sweep(),
            DiscoveryFixtures::dual_endpoint_server("urn:plc-3", "plc-3"),
        )
        .await
        .unwrap();
    assert_report(&report, 1, 0, 0, 1);

    let application = harness
        .applications
        .get_application(&application_id("urn:plc-1"), false)
        .await
        .unwrap();
    application.application.assert_enabled();
    assert_eq!(application.application.discoverer_id, Some(discoverer()));
}

#[tokio::test]
async fn test_empty_site_or_discoverer_rejected() {
    let harness = RegistryHarness::new();

    let err = harness
        .applications
        .process_discovery_events("", &discoverer(), &DiscoveryFixtures::sweep(), vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Argument { .. }), "{err}");

    let err = harness
        .applications
        .process_discovery_events(
            IdentityFixtures::site(),
            "",
            &DiscoveryFixtures::sweep(),
            vec![],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Argument { .. }), "{err}");
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_removal_retries_out_of_date_patches() {
    init_test_logging();
    let harness = RegistryHarness::new();
    sweep(&harness, &DiscoveryFixtures::sweep(), &["urn:plc-1", "urn:plc-2"]).await;

    harness.flaky.fail_next_patches(2);
    let before = harness.flaky.patch_calls();
    let report = sweep(&harness, &DiscoveryFixtures::sweep(), &["urn:plc-1"]).await;

    assert_eq!(report.removed, 1);
    assert!(harness.flaky.patch_calls() - before >= 3);
    let application = harness
        .applications
        .get_application(&application_id("urn:plc-2"), false)
        .await
        .unwrap();
    application.application.assert_disabled();
}
