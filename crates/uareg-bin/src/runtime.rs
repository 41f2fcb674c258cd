// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Registry runtime orchestration.
//!
//! ```text
//! UaregConfig ──► RegistryServices
//!                  ├── TwinStore (in-memory)
//!                  ├── EndpointRegistry ◄── SupervisorTwinActivator
//!                  ├── ApplicationRegistry
//!                  ├── supervisors / publishers / gateways
//!                  ├── DiscoveryOrchestrator ──► refresh loop
//!                  └── OpcUaServerClient (real-transport)
//!
//! run: start loops ──► wait for signal ──► stop loops ──► close sessions
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use uareg_config::{load_config, UaregConfig};
use uareg_core::models::RegistryOperationContext;
use uareg_core::twin::{MemoryTwinStore, TwinStore};
use uareg_opcua::{ClientSettings, OpcUaServerClient};
use uareg_registry::{
    ApplicationEventBroker, ApplicationRegistry, DiscoveryOrchestrator, EndpointEventBroker,
    EndpointRegistry, ModuleRegistry, OrchestratorConfig, SupervisorTwinActivator,
    SupervisorTwinDiscoveryClient,
};

use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

/// Default grace period for closing sessions on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// =============================================================================
// RegistryServices
// =============================================================================

/// Wired registry components.
pub struct RegistryServices {
    /// Twin store all registries share.
    pub store: Arc<dyn TwinStore>,
    /// Endpoint registry.
    pub endpoints: Arc<EndpointRegistry>,
    /// Application registry.
    pub applications: Arc<ApplicationRegistry>,
    /// Supervisor registry.
    pub supervisors: Arc<ModuleRegistry>,
    /// Publisher registry.
    pub publishers: Arc<ModuleRegistry>,
    /// Gateway registry.
    pub gateways: Arc<ModuleRegistry>,
    /// Discovery orchestrator.
    pub orchestrator: Arc<DiscoveryOrchestrator>,
    /// OPC UA client, absent when built without a transport.
    pub client: Option<Arc<OpcUaServerClient>>,
}

impl RegistryServices {
    /// Wires all components from `config` on top of `store`.
    pub fn build(config: &UaregConfig, store: Arc<dyn TwinStore>) -> BinResult<Self> {
        let activator = Arc::new(SupervisorTwinActivator::new(store.clone()));
        let endpoints = Arc::new(EndpointRegistry::new(
            store.clone(),
            activator,
            Arc::new(EndpointEventBroker::new()),
        ));
        let applications = Arc::new(
            ApplicationRegistry::new(
                store.clone(),
                endpoints.clone(),
                Arc::new(ApplicationEventBroker::new()),
            )
            .with_hard_delete(config.registry.hard_delete_on_removal),
        );
        let supervisors = Arc::new(ModuleRegistry::supervisors(store.clone()));
        let orchestrator = Arc::new(DiscoveryOrchestrator::new(
            supervisors.clone(),
            Arc::new(SupervisorTwinDiscoveryClient::new(store.clone())),
            OrchestratorConfig {
                refresh_interval: config.discovery.refresh_interval,
                retry_interval: config.discovery.retry_interval,
                activation_filter: config
                    .discovery
                    .activation_filter
                    .as_ref()
                    .map(|f| f.to_model()),
            },
        ));

        Ok(Self {
            publishers: Arc::new(ModuleRegistry::publishers(store.clone())),
            gateways: Arc::new(ModuleRegistry::gateways(store.clone())),
            client: build_client(client_settings(config))?,
            store,
            endpoints,
            applications,
            supervisors,
            orchestrator,
        })
    }
}

/// Maps the client section onto the client settings.
pub fn client_settings(config: &UaregConfig) -> ClientSettings {
    let opcua = &config.opcua;
    ClientSettings {
        application_name: opcua.application_name.clone(),
        application_uri: opcua.application_uri.clone(),
        pki_dir: opcua.pki_dir.clone(),
        session_timeout: opcua.session_timeout,
        keep_alive_interval: opcua.keep_alive_interval,
        connect_timeout: opcua.connect_timeout,
        operation_timeout: opcua.operation_timeout,
        use_reverse_proxy: opcua.use_reverse_proxy,
        cleanup_queue_capacity: opcua.cleanup_queue_capacity,
    }
}

#[cfg(feature = "real-transport")]
fn build_client(settings: ClientSettings) -> BinResult<Option<Arc<OpcUaServerClient>>> {
    use anyhow::Context;

    std::fs::create_dir_all(&settings.pki_dir)
        .with_context(|| format!("creating PKI directory {}", settings.pki_dir.display()))?;
    let factory = Arc::new(uareg_opcua::RealSessionFactory::new(settings.clone()));
    Ok(Some(Arc::new(OpcUaServerClient::new(factory, settings))))
}

#[cfg(not(feature = "real-transport"))]
fn build_client(_settings: ClientSettings) -> BinResult<Option<Arc<OpcUaServerClient>>> {
    warn!("Built without real-transport, OPC UA client disabled");
    Ok(None)
}

// =============================================================================
// RegistryRuntime
// =============================================================================

/// Runs the registry service until shutdown is signaled.
pub struct RegistryRuntime {
    config: Arc<UaregConfig>,
    services: RegistryServices,
    shutdown: ShutdownCoordinator,
    discovery: bool,
    shutdown_grace: Duration,
}

impl RegistryRuntime {
    /// Creates a runtime over an in-memory twin store.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(config: UaregConfig) -> BinResult<Self> {
        let services = RegistryServices::build(&config, Arc::new(MemoryTwinStore::new()))?;
        Ok(Self {
            config: Arc::new(config),
            services,
            shutdown: ShutdownCoordinator::new(),
            discovery: true,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        })
    }

    /// Enables or disables the discoverer refresh loop.
    pub fn with_discovery(mut self, enabled: bool) -> Self {
        self.discovery = enabled;
        self
    }

    /// Sets the grace period for closing sessions.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Returns the wired components.
    pub fn services(&self) -> &RegistryServices {
        &self.services
    }

    /// Returns the shutdown coordinator.
    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// Runs until shutdown is signaled.
    pub async fn run(self) -> BinResult<()> {
        info!(
            service_id = %self.config.service.id,
            version = crate::VERSION,
            "Starting OPC UA registry"
        );

        let mut tasks = Vec::new();
        if self.discovery {
            tasks.push(
                self.services
                    .orchestrator
                    .clone()
                    .start(self.shutdown.subscribe()),
            );
        }
        if let Some(not_seen_for) = self.config.registry.purge_not_seen_for {
            tasks.push(self.start_purge_loop(not_seen_for));
        }

        self.log_inventory().await;
        info!("OPC UA registry is ready");
        self.shutdown.wait_for_shutdown().await;

        info!("Shutdown initiated, cleaning up...");
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
        if let Some(client) = &self.services.client {
            client.shutdown(self.shutdown_grace).await;
            let stats = client.stats();
            info!(
                sessions_created = stats.sessions_created,
                sessions_reused = stats.sessions_reused,
                retries = stats.retries,
                "OPC UA client closed"
            );
        }
        let stats = self.services.orchestrator.stats();
        info!(
            refreshes = stats.refreshes,
            requests = stats.requests,
            "OPC UA registry shutdown complete"
        );
        Ok(())
    }

    /// Purges disabled applications once per `not_seen_for`.
    fn start_purge_loop(&self, not_seen_for: Duration) -> JoinHandle<()> {
        let applications = self.services.applications.clone();
        let authority = self.config.service.id.clone();
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            info!(
                not_seen_for = %humantime::format_duration(not_seen_for),
                "Application purge loop started"
            );
            let mut interval = tokio::time::interval(not_seen_for);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let context = RegistryOperationContext::now(Some(authority.clone()));
                        match applications.purge_disabled_applications(not_seen_for, Some(context)).await {
                            Ok(0) => debug!("No disabled applications to purge"),
                            Ok(purged) => info!(purged = purged, "Purged disabled applications"),
                            Err(e) => warn!(error = %e, "Application purge failed"),
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
            info!("Application purge loop stopped");
        })
    }

    async fn log_inventory(&self) {
        let page_size = Some(self.config.registry.page_size);
        match self
            .services
            .applications
            .list_applications(None, page_size)
            .await
        {
            Ok(page) => info!(
                applications = page.items.len(),
                more = page.continuation_token.is_some(),
                "Registry inventory"
            ),
            Err(e) => warn!(error = %e, "Failed to read registry inventory"),
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for constructing the registry runtime.
#[derive(Default)]
pub struct RuntimeBuilder {
    config_path: Option<PathBuf>,
    config: Option<UaregConfig>,
    discovery: Option<bool>,
    shutdown_grace: Option<Duration>,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration file path.
    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the configuration directly.
    pub fn config(mut self, config: UaregConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Enables or disables the discoverer refresh loop.
    pub fn discovery(mut self, enabled: bool) -> Self {
        self.discovery = Some(enabled);
        self
    }

    /// Sets the shutdown grace period.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = Some(grace);
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> BinResult<RegistryRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => {
                let path = self
                    .config_path
                    .ok_or_else(|| BinError::usage("no configuration given"))?;
                load_config(&path).map_err(|e| BinError::config(&path, e))?
            }
        };

        Ok(RegistryRuntime::new(config)?
            .with_discovery(self.discovery.unwrap_or(true))
            .with_shutdown_grace(self.shutdown_grace.unwrap_or(DEFAULT_SHUTDOWN_GRACE)))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> UaregConfig {
        let mut config = UaregConfig::default();
        config.opcua.pki_dir = std::env::temp_dir().join("uareg-runtime-test-pki");
        config
    }

    #[tokio::test]
    async fn test_runtime_builder() {
        let runtime = RuntimeBuilder::new()
            .config(test_config())
            .discovery(false)
            .shutdown_grace(Duration::from_secs(1))
            .build()
            .unwrap();

        assert!(!runtime.discovery);
        assert_eq!(runtime.shutdown_grace, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_runtime_builder_requires_config() {
        assert!(RuntimeBuilder::new().build().is_err());
    }

    #[test]
    fn test_client_settings_mapping() {
        let mut config = test_config();
        config.opcua.use_reverse_proxy = true;
        config.opcua.operation_timeout = Duration::from_secs(7);
        let settings = client_settings(&config);
        assert!(settings.use_reverse_proxy);
        assert_eq!(settings.operation_timeout, Duration::from_secs(7));
        assert_eq!(settings.pki_dir, config.opcua.pki_dir);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let mut config = test_config();
        config.registry.purge_not_seen_for = Some(Duration::from_secs(3600));
        let runtime = RuntimeBuilder::new().config(config).build().unwrap();
        let shutdown = runtime.shutdown().clone();

        let handle = tokio::spawn(runtime.run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.initiate_shutdown();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("runtime should stop")
            .unwrap()
            .unwrap();
    }
}
