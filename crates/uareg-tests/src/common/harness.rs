// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! Wires the registries over an in-memory twin store the way the service
//! does, with recording listeners attached.
//!
//! ```text
//! MemoryTwinStore ◄── FlakyTwinStore ◄── EndpointRegistry ◄── ApplicationRegistry
//!                                          │                     │
//!                          RecordingEndpointListener   RecordingApplicationListener
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use uareg_core::registration::ModuleRegistration;
use uareg_core::twin::{DeviceTwin, MemoryTwinStore, TwinStore};
use uareg_core::types::IdentityType;
use uareg_opcua::client::mock::MockSessionFactory;
use uareg_opcua::{ClientSettings, OpcUaServerClient, SessionFactory};
use uareg_registry::{
    ApplicationEventBroker, ApplicationRegistry, EndpointActivator, EndpointEventBroker,
    EndpointRegistry, ModuleRegistry, SupervisorTwinActivator,
};

use super::fixtures::IdentityFixtures;
use super::mocks::{FlakyTwinStore, RecordingApplicationListener, RecordingEndpointListener};

// =============================================================================
// RegistryHarness
// =============================================================================

/// Options for [`RegistryHarness`].
#[derive(Clone, Default)]
pub struct RegistryHarnessConfig {
    /// Delete lost endpoints instead of disabling them.
    pub hard_delete: bool,
    /// Activator to use. The supervisor twin activator when unset.
    pub activator: Option<Arc<dyn EndpointActivator>>,
}

/// Registries wired over one in-memory store.
pub struct RegistryHarness {
    /// Backing store.
    pub store: Arc<MemoryTwinStore>,
    /// Store wrapper the registries write through.
    pub flaky: Arc<FlakyTwinStore>,
    /// Endpoint registry.
    pub endpoints: Arc<EndpointRegistry>,
    /// Application registry.
    pub applications: Arc<ApplicationRegistry>,
    /// Supervisor registry.
    pub supervisors: Arc<ModuleRegistry>,
    /// Endpoint events.
    pub endpoint_events: Arc<RecordingEndpointListener>,
    /// Application events.
    pub application_events: Arc<RecordingApplicationListener>,
}

impl RegistryHarness {
    /// Creates a harness with default options.
    pub fn new() -> Self {
        Self::with_config(RegistryHarnessConfig::default())
    }

    /// Creates a harness with `config`.
    pub fn with_config(config: RegistryHarnessConfig) -> Self {
        let store = Arc::new(MemoryTwinStore::new());
        let flaky = FlakyTwinStore::new(store.clone());
        let shared: Arc<dyn TwinStore> = flaky.clone();

        let activator = config
            .activator
            .unwrap_or_else(|| Arc::new(SupervisorTwinActivator::new(shared.clone())));
        let endpoint_events = RecordingEndpointListener::new();
        let endpoint_broker = Arc::new(EndpointEventBroker::new());
        endpoint_broker.register(endpoint_events.clone());
        let endpoints = Arc::new(EndpointRegistry::new(
            shared.clone(),
            activator,
            endpoint_broker,
        ));

        let application_events = RecordingApplicationListener::new();
        let application_broker = Arc::new(ApplicationEventBroker::new());
        application_broker.register(application_events.clone());
        let applications = Arc::new(
            ApplicationRegistry::new(shared.clone(), endpoints.clone(), application_broker)
                .with_hard_delete(config.hard_delete),
        );

        Self {
            supervisors: Arc::new(ModuleRegistry::supervisors(shared)),
            store,
            flaky,
            endpoints,
            applications,
            endpoint_events,
            application_events,
        }
    }

    /// Registers the default supervisor module twin.
    pub async fn seed_supervisor(&self, connected: bool) -> String {
        self.seed_module(
            IdentityType::Supervisor,
            IdentityFixtures::edge_device(),
            IdentityFixtures::supervisor_module(),
            connected,
        )
        .await
    }

    /// Registers a module twin of `kind` and returns its registry id.
    pub async fn seed_module(
        &self,
        kind: IdentityType,
        device_id: &str,
        module_id: &str,
        connected: bool,
    ) -> String {
        let module = ModuleRegistration::new(kind, device_id, Some(module_id.to_string()));
        let twin = ModuleRegistration::patch(None, &module).expect("module twin");
        self.store
            .create_or_update(twin, true)
            .await
            .expect("seed module");
        self.store
            .set_connection_state(device_id, Some(module_id), connected);
        module.id()
    }

    /// Reads the default supervisor twin.
    pub fn supervisor_twin(&self) -> Option<DeviceTwin> {
        self.store.snapshot(
            IdentityFixtures::edge_device(),
            Some(IdentityFixtures::supervisor_module()),
        )
    }

    /// Drains both event recorders.
    pub fn clear_events(&self) {
        self.endpoint_events.take();
        self.application_events.take();
    }
}

impl Default for RegistryHarness {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ClientHarness
// =============================================================================

/// An OPC UA client over a mock session factory.
pub struct ClientHarness {
    /// Session factory.
    pub factory: Arc<MockSessionFactory>,
    /// Client under test.
    pub client: Arc<OpcUaServerClient>,
}

impl ClientHarness {
    /// Creates a client with default settings. Needs a tokio runtime.
    pub fn new() -> Self {
        Self::with_settings(ClientSettings::default())
    }

    /// Creates a client with `settings`. Needs a tokio runtime.
    pub fn with_settings(settings: ClientSettings) -> Self {
        let factory = MockSessionFactory::new();
        let client = Arc::new(OpcUaServerClient::new(
            Arc::clone(&factory) as Arc<dyn SessionFactory>,
            settings,
        ));
        Self { factory, client }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Polls `condition` until it holds or `timeout` elapses.
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
