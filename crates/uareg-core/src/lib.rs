// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uareg-core
//!
//! Core abstractions and shared types for the OPC UA registry.
//!
//! This crate provides the pieces every other registry crate builds on:
//!
//! - **Error**: Unified registry error hierarchy
//! - **Types**: Security modes, application types, activation states
//! - **Models**: Service-facing application, endpoint, module and discovery models
//! - **Twin**: Device twin records, truth-precedence `merge`, query builder,
//!   the `TwinStore` contract and an in-memory store
//! - **Registration**: Codec between service models and twin records,
//!   including logical and full equality
//! - **Retry**: Optimistic concurrency retry loop
//!
//! ## Example
//!
//! ```rust,ignore
//! use uareg_core::registration::EndpointRegistration;
//! use uareg_core::twin::{MemoryTwinStore, TwinStore};
//!
//! let store = MemoryTwinStore::new();
//! let registration = EndpointRegistration::from_service_model(&model, Some(false));
//! let twin = EndpointRegistration::patch(None, &registration)?;
//! store.create_or_update(twin, true).await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Core Modules
// =============================================================================

pub mod error;
pub mod models;
pub mod types;

// =============================================================================
// Persistence Modules
// =============================================================================

pub mod registration;
pub mod retry;
pub mod twin;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use error::{RegistryError, RegistryResult};
pub use types::*;

pub use registration::{ApplicationRegistration, EndpointRegistration, ModuleRegistration};
pub use retry::retry_on_out_of_date;
pub use twin::{merge, DeviceTwin, MemoryTwinStore, PropertyMap, TwinQuery, TwinStore};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
