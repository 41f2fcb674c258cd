// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uareg Integration Tests
//!
//! Integration tests and shared utilities for the OPC UA registry.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities, fixtures, and helpers
//!   - `fixtures`: Discovery events, registration requests, config documents
//!   - `assertions`: Custom assertion helpers
//!   - `mocks`: Flaky twin store, recording listeners, discovery seams
//!   - `harness`: Registry and client harnesses
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p uareg-tests
//!
//! # Run specific test suite
//! cargo test -p uareg-tests --test integration_session_pool
//! cargo test -p uareg-tests --test integration_reconcile
//! cargo test -p uareg-tests --test integration_registry
//! cargo test -p uareg-tests --test integration_config
//! ```
//!
//! ## Test Categories
//!
//! ### Session Pool Tests (`integration_session_pool.rs`)
//! - Session reuse under concurrent callers
//! - Retry-once on communication failures
//! - Keep-alive eviction and shutdown drain
//! - Node services over pooled sessions
//!
//! ### Reconcile Tests (`integration_reconcile.rs`)
//! - Discovery sweeps across applications and endpoints
//! - Auto-activation against supervisor twins
//! - Ownership between discoverers and supervisors
//! - Soft versus hard removal
//!
//! ### Registry Tests (`integration_registry.rs`)
//! - Application lifecycle cascading to endpoints
//! - Optimistic concurrency retries
//! - Discovery orchestration through supervisor twins
//!
//! ### Config Tests (`integration_config.rs`)
//! - YAML, TOML and JSON documents
//! - Environment placeholders and overrides
//! - Validation rules
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use uareg_tests::common::{DiscoveryFixtures, RegistryHarness};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let harness = RegistryHarness::new();
//!     harness.seed_supervisor(true).await;
//!     let events = DiscoveryFixtures::dual_endpoint_server("urn:plc", "plc");
//!     // ... test logic
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::assertions::*;
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
    pub use crate::common::mocks::*;
}
