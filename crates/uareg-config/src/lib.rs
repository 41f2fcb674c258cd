// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uareg-config
//!
//! Configuration management for the OPC UA registry service.
//!
//! ## Features
//!
//! - **Schema Definition**: Sectioned configuration with defaults and validation
//! - **Multi-Format Support**: YAML, TOML, and JSON configuration files
//! - **Environment Overrides**: Override selected values via `UAREG_*` variables
//! - **Placeholders**: `${VAR}` and `${VAR:default}` in configuration files
//!
//! ## Quick Start
//!
//! ```no_run
//! use uareg_config::loader::load_config;
//!
//! let config = load_config("uareg.yaml").unwrap();
//! println!("Service: {}", config.service.id);
//! ```
//!
//! ## Example File
//!
//! ```yaml
//! service:
//!   id: "${UAREG_INSTANCE:registry-01}"
//!   site_id: plant-7
//! opcua:
//!   pki_dir: ./pki
//!   session_timeout: 60s
//! registry:
//!   page_size: 100
//!   purge_not_seen_for: 30days
//! discovery:
//!   refresh_interval: 1m
//!   retry_interval: 10s
//!   activation_filter:
//!     security_mode: SignAndEncrypt
//! logging:
//!   level: info
//!   format: json
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod error;
pub mod loader;
pub mod schema;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    load_config, load_config_str, ConfigFormat, ConfigLoader, ConfigLoaderBuilder,
    DEFAULT_ENV_PREFIX,
};
pub use schema::{
    ActivationFilterConfig, DiscoveryConfig, LogFormat, LogLevel, LoggingConfig,
    OpcUaClientConfig, RegistryConfig, ServiceConfig, UaregConfig,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
