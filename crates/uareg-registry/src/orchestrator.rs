// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Discovery orchestration.
//!
//! Keeps a list of the discovery agents (connected supervisors) that is
//! reloaded on a timer, and fans discovery requests out to every known agent.
//!
//! ```text
//!            ┌──────────── refresh_interval ◄── ok ───┐
//! start ──► refresh() ─┤                               │
//!            └──────────── retry_interval   ◄── err ──┘
//!
//! discover(request) ──► agent 1 ─┐
//!                   ──► agent 2 ─┼─► DiscoveryReport
//!                   ──► agent n ─┘
//! ```
//!
//! A failing agent is recorded in the report and never fails the request as
//! a whole.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use uareg_core::models::{DiscoveryRequestModel, EndpointActivationFilterModel};
use uareg_core::registration::identity;
use uareg_core::twin::TwinStore;
use uareg_core::{RegistryError, RegistryResult};

use crate::modules::ModuleRegistry;

/// Default refresh cadence.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Default delay before retrying a failed refresh.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(10);

// =============================================================================
// Seams
// =============================================================================

/// Source of the currently reachable discovery agents.
#[async_trait]
pub trait DiscovererSource: Send + Sync {
    /// Returns the ids of all agents that can take discovery requests.
    async fn list_discoverers(&self) -> RegistryResult<Vec<String>>;
}

#[async_trait]
impl DiscovererSource for ModuleRegistry {
    async fn list_discoverers(&self) -> RegistryResult<Vec<String>> {
        Ok(self.connected().await?.into_iter().map(|m| m.id).collect())
    }
}

/// Sends a discovery request to one agent.
#[async_trait]
pub trait DiscoveryClient: Send + Sync {
    /// Asks `discoverer_id` to run `request`.
    async fn discover(
        &self,
        discoverer_id: &str,
        request: &DiscoveryRequestModel,
    ) -> RegistryResult<()>;
}

/// Desired property a supervisor reads its pending discovery request from.
pub const DISCOVERY_REQUEST_PROPERTY: &str = "DiscoveryRequest";

/// Delivers discovery requests through the supervisor module twin.
pub struct SupervisorTwinDiscoveryClient {
    store: Arc<dyn TwinStore>,
}

impl SupervisorTwinDiscoveryClient {
    /// Creates the client.
    pub fn new(store: Arc<dyn TwinStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DiscoveryClient for SupervisorTwinDiscoveryClient {
    async fn discover(
        &self,
        discoverer_id: &str,
        request: &DiscoveryRequestModel,
    ) -> RegistryResult<()> {
        if discoverer_id.is_empty() {
            return Err(RegistryError::argument("discovererId", "Discoverer id is required"));
        }
        let (device_id, module_id) = identity::parse_module_identity(discoverer_id);
        let value = serde_json::to_value(request)?;
        self.store
            .update_property(&device_id, module_id.as_deref(), DISCOVERY_REQUEST_PROPERTY, value)
            .await?;
        debug!(discoverer_id = %discoverer_id, "Discovery request written to supervisor twin");
        Ok(())
    }
}

// =============================================================================
// Configuration and reporting
// =============================================================================

/// Settings of the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Delay between successful refreshes.
    pub refresh_interval: Duration,
    /// Delay after a failed refresh.
    pub retry_interval: Duration,
    /// Activation filter attached to requests that carry none.
    pub activation_filter: Option<EndpointActivationFilterModel>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            activation_filter: None,
        }
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    /// Agents the request was sent to.
    pub requested: usize,
    /// Agents that accepted the request.
    pub succeeded: Vec<String>,
    /// Agents that failed, with the error message.
    pub failed: Vec<(String, String)>,
}

impl DiscoveryReport {
    /// Returns `true` if no agent failed.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Default)]
struct OrchestratorStats {
    refreshes: AtomicU64,
    refresh_failures: AtomicU64,
    requests: AtomicU64,
    target_failures: AtomicU64,
}

/// Point-in-time copy of the orchestrator counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrchestratorStatsSnapshot {
    /// Successful refreshes.
    pub refreshes: u64,
    /// Failed refreshes.
    pub refresh_failures: u64,
    /// Discovery requests fanned out.
    pub requests: u64,
    /// Individual agent failures.
    pub target_failures: u64,
}

// =============================================================================
// DiscoveryOrchestrator
// =============================================================================

/// Refreshes the agent list and fans out discovery requests.
pub struct DiscoveryOrchestrator {
    source: Arc<dyn DiscovererSource>,
    client: Arc<dyn DiscoveryClient>,
    config: OrchestratorConfig,
    discoverers: RwLock<Vec<String>>,
    stats: OrchestratorStats,
}

impl DiscoveryOrchestrator {
    /// Creates the orchestrator. No agents are known until the first refresh.
    pub fn new(
        source: Arc<dyn DiscovererSource>,
        client: Arc<dyn DiscoveryClient>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            source,
            client,
            config,
            discoverers: RwLock::new(Vec::new()),
            stats: OrchestratorStats::default(),
        }
    }

    /// Returns the known agents.
    pub fn discoverers(&self) -> Vec<String> {
        self.discoverers.read().clone()
    }

    /// Returns the counters.
    pub fn stats(&self) -> OrchestratorStatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        OrchestratorStatsSnapshot {
            refreshes: load(&self.stats.refreshes),
            refresh_failures: load(&self.stats.refresh_failures),
            requests: load(&self.stats.requests),
            target_failures: load(&self.stats.target_failures),
        }
    }

    /// Reloads the agent list. Keeps the previous list on failure.
    pub async fn refresh(&self) -> RegistryResult<usize> {
        match self.source.list_discoverers().await {
            Ok(mut discoverers) => {
                discoverers.sort();
                discoverers.dedup();
                let count = discoverers.len();
                *self.discoverers.write() = discoverers;
                self.stats.refreshes.fetch_add(1, Ordering::Relaxed);
                debug!(count = count, "Discoverer list refreshed");
                Ok(count)
            }
            Err(e) => {
                self.stats.refresh_failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Spawns the refresh loop. It runs until `shutdown` fires.
    pub fn start(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                refresh_secs = self.config.refresh_interval.as_secs(),
                retry_secs = self.config.retry_interval.as_secs(),
                "Discovery orchestrator started"
            );
            loop {
                let delay = match self.refresh().await {
                    Ok(_) => self.config.refresh_interval,
                    Err(e) => {
                        warn!(
                            error = %e,
                            retry_secs = self.config.retry_interval.as_secs(),
                            "Failed to refresh discoverer list"
                        );
                        self.config.retry_interval
                    }
                };
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.recv() => break,
                }
            }
            info!("Discovery orchestrator stopped");
        })
    }

    fn with_default_filter(&self, request: &DiscoveryRequestModel) -> DiscoveryRequestModel {
        let mut request = request.clone();
        if let Some(filter) = &self.config.activation_filter {
            let configuration = request.configuration.get_or_insert_with(Default::default);
            if configuration.activation_filter.is_none() {
                configuration.activation_filter = Some(filter.clone());
            }
        }
        request
    }

    /// Sends `request` to every known agent.
    ///
    /// Requests without an activation filter get the configured one.
    pub async fn discover(&self, request: &DiscoveryRequestModel) -> DiscoveryReport {
        let request = &self.with_default_filter(request);
        let discoverers = self.discoverers();
        self.stats.requests.fetch_add(1, Ordering::Relaxed);
        if discoverers.is_empty() {
            warn!(request_id = ?request.id, "No discoverers known, discovery request dropped");
            return DiscoveryReport::default();
        }

        let outcomes = join_all(discoverers.iter().map(|id| async move {
            (id.clone(), self.client.discover(id, request).await)
        }))
        .await;

        let mut report = DiscoveryReport {
            requested: discoverers.len(),
            ..Default::default()
        };
        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => report.succeeded.push(id),
                Err(e) => {
                    self.stats.target_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(discoverer_id = %id, error = %e, "Discovery request failed");
                    report.failed.push((id, e.to_string()));
                }
            }
        }
        info!(
            request_id = ?request.id,
            requested = report.requested,
            failed = report.failed.len(),
            "Discovery request fanned out"
        );
        report
    }
}
