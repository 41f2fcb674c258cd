// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uareg-bin
//!
//! CLI binary for the OPC UA registry service.
//!
//! - CLI argument parsing with clap
//! - Registry runtime wiring
//! - Graceful shutdown handling
//! - Logging initialization
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │                 main.rs                  │
//! └────────────────────┬─────────────────────┘
//!                      │
//!               ┌──────▼──────┐
//!               │   cli.rs    │
//!               └──────┬──────┘
//!                      │
//!          ┌───────────┼───────────┐
//!          ▼           ▼           ▼
//!    ┌──────────┐ ┌──────────┐ ┌──────────┐
//!    │ commands │ │ runtime  │ │ logging  │
//!    └──────────┘ └────┬─────┘ └──────────┘
//!                      │
//!               ┌──────▼──────┐
//!               │  shutdown   │
//!               └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the registry (default command)
//! uareg
//!
//! # Start with custom config and no discoverer refresh
//! uareg -c /etc/uareg/uareg.yaml run --no-discovery
//!
//! # Validate configuration
//! uareg validate --show-config
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{RegistryRuntime, RegistryServices, RuntimeBuilder};
pub use shutdown::ShutdownCoordinator;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
