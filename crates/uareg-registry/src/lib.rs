// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uareg-registry
//!
//! Application, endpoint and edge module registries on top of a twin store.
//!
//! ```text
//! discovery events ──► ApplicationRegistry ──► EndpointRegistry ──► EndpointActivator
//!                             │                       │
//!                             └──── TwinStore ◄───────┘
//!                             │                       │
//!                     ApplicationEvent          EndpointEvent
//!                       listeners                 listeners
//! ```
//!
//! - **applications**: application lifecycle, queries, sites, purge and the
//!   per-site discovery merge
//! - **endpoints**: endpoint lifecycle, activation and the per-application
//!   discovery merge
//! - **modules**: supervisor, publisher and gateway registries
//! - **orchestrator**: discoverer refresh loop and discovery fan-out
//! - **reconcile**: keyed set difference used by both merges
//! - **events**: listener contracts and brokers

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Registries
// =============================================================================

pub mod applications;
pub mod endpoints;
pub mod modules;

// =============================================================================
// Supporting Modules
// =============================================================================

pub mod activation;
pub mod events;
pub mod orchestrator;
pub mod reconcile;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use activation::{EndpointActivator, SupervisorTwinActivator};
pub use applications::{application_query, ApplicationRegistry};
pub use endpoints::{endpoint_query, EndpointRegistry};
pub use events::{
    ApplicationEvent, ApplicationEventBroker, ApplicationRegistryListener, EndpointEvent,
    EndpointEventBroker, EndpointRegistryListener, EventBroker, ListenerId,
};
pub use modules::ModuleRegistry;
pub use orchestrator::{
    DiscovererSource, DiscoveryClient, DiscoveryOrchestrator, DiscoveryReport,
    OrchestratorConfig, OrchestratorStatsSnapshot, SupervisorTwinDiscoveryClient,
};
pub use reconcile::{diff, Diff, ReconcileReport};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
