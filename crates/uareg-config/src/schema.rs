// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions for the registry service.
//!
//! # Schema Structure
//!
//! ```text
//! UaregConfig
//! ├── service: ServiceConfig
//! ├── opcua: OpcUaClientConfig
//! ├── registry: RegistryConfig
//! ├── discovery: DiscoveryConfig
//! │   └── activation_filter: ActivationFilterConfig
//! └── logging: LoggingConfig
//! ```
//!
//! Every section has defaults, so an empty document is a valid configuration.
//! Durations are written human-readable (`90s`, `5m`, `7days`).

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uareg_core::models::EndpointActivationFilterModel;
use uareg_core::types::SecurityMode;

// =============================================================================
// Constants
// =============================================================================

/// Default session timeout.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Default keep-alive interval.
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(5);

/// Default operation timeout.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Default timeout of endpoint discovery and session open.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default capacity of the session close queue.
pub const DEFAULT_CLEANUP_QUEUE_CAPACITY: usize = 64;

/// Default page size of registry queries.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Default discoverer refresh cadence.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Default delay after a failed discoverer refresh.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(10);

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// The root configuration structure of the registry service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UaregConfig {
    /// Service identification.
    pub service: ServiceConfig,

    /// OPC UA client settings.
    pub opcua: OpcUaClientConfig,

    /// Registry behavior.
    pub registry: RegistryConfig,

    /// Discovery orchestration.
    pub discovery: DiscoveryConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl UaregConfig {
    /// Validates the entire configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.service.validate()?;
        self.opcua.validate()?;
        self.registry.validate()?;
        self.discovery.validate()?;
        Ok(())
    }
}

// =============================================================================
// Service Configuration
// =============================================================================

/// Service identification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Unique service identifier, used as authority id in audit stamps.
    pub id: String,

    /// Human-readable service name.
    pub name: String,

    /// Site the service registers applications under when no gateway is known.
    pub site_id: Option<String>,
}

impl ServiceConfig {
    /// Validates the service configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::invalid("service.id", "cannot be empty"));
        }
        if self.id.len() > 64 {
            return Err(ConfigError::invalid(
                "service.id",
                "cannot exceed 64 characters",
            ));
        }
        if matches!(&self.site_id, Some(site) if site.trim().is_empty()) {
            return Err(ConfigError::invalid("service.site_id", "cannot be empty"));
        }
        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            id: "uareg-01".to_string(),
            name: "OPC UA Registry".to_string(),
            site_id: None,
        }
    }
}

// =============================================================================
// OPC UA Client Configuration
// =============================================================================

/// OPC UA client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpcUaClientConfig {
    /// Application name presented to servers.
    pub application_name: String,

    /// Application uri presented to servers.
    pub application_uri: String,

    /// PKI directory. A self-signed certificate is created here on first use.
    pub pki_dir: PathBuf,

    /// Requested session timeout.
    #[serde(with = "humantime_serde")]
    pub session_timeout: Duration,

    /// Keep-alive interval of open sessions.
    #[serde(with = "humantime_serde")]
    pub keep_alive_interval: Duration,

    /// Operation timeout of service calls.
    #[serde(with = "humantime_serde")]
    pub operation_timeout: Duration,

    /// Timeout of endpoint discovery and session open.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Route connections through the reverse proxy transport.
    pub use_reverse_proxy: bool,

    /// Capacity of the background session close queue.
    pub cleanup_queue_capacity: usize,
}

impl OpcUaClientConfig {
    /// Validates the client configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.application_uri.trim().is_empty() {
            return Err(ConfigError::invalid(
                "opcua.application_uri",
                "cannot be empty",
            ));
        }
        for (field, value) in [
            ("opcua.session_timeout", self.session_timeout),
            ("opcua.keep_alive_interval", self.keep_alive_interval),
            ("opcua.operation_timeout", self.operation_timeout),
            ("opcua.connect_timeout", self.connect_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::invalid(field, "must be greater than zero"));
            }
        }
        if self.keep_alive_interval >= self.session_timeout {
            return Err(ConfigError::invalid(
                "opcua.keep_alive_interval",
                "must be shorter than the session timeout",
            ));
        }
        if self.cleanup_queue_capacity == 0 {
            return Err(ConfigError::invalid(
                "opcua.cleanup_queue_capacity",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl Default for OpcUaClientConfig {
    fn default() -> Self {
        Self {
            application_name: "OPC UA Registry".to_string(),
            application_uri: "urn:uareg:client".to_string(),
            pki_dir: PathBuf::from("pki"),
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            use_reverse_proxy: false,
            cleanup_queue_capacity: DEFAULT_CLEANUP_QUEUE_CAPACITY,
        }
    }
}

// =============================================================================
// Registry Configuration
// =============================================================================

/// Registry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Page size of list and query operations.
    pub page_size: usize,

    /// Delete endpoints that discovery no longer reports instead of disabling them.
    pub hard_delete_on_removal: bool,

    /// Purge applications disabled for longer than this. `None` disables purging.
    #[serde(with = "humantime_serde")]
    pub purge_not_seen_for: Option<Duration>,
}

impl RegistryConfig {
    /// Validates the registry configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.page_size == 0 {
            return Err(ConfigError::invalid(
                "registry.page_size",
                "must be greater than zero",
            ));
        }
        if matches!(self.purge_not_seen_for, Some(d) if d.is_zero()) {
            return Err(ConfigError::invalid(
                "registry.purge_not_seen_for",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            hard_delete_on_removal: false,
            purge_not_seen_for: None,
        }
    }
}

// =============================================================================
// Discovery Configuration
// =============================================================================

/// Discovery orchestration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoveryConfig {
    /// Delay between discoverer refreshes.
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,

    /// Delay after a failed refresh.
    #[serde(with = "humantime_serde")]
    pub retry_interval: Duration,

    /// Endpoints matching this filter are activated when discovered.
    pub activation_filter: Option<ActivationFilterConfig>,
}

impl DiscoveryConfig {
    /// Validates the discovery configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.refresh_interval.is_zero() {
            return Err(ConfigError::invalid(
                "discovery.refresh_interval",
                "must be greater than zero",
            ));
        }
        if self.retry_interval.is_zero() {
            return Err(ConfigError::invalid(
                "discovery.retry_interval",
                "must be greater than zero",
            ));
        }
        if let Some(filter) = &self.activation_filter {
            filter.validate()?;
        }
        Ok(())
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            activation_filter: None,
        }
    }
}

/// Automatic activation filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActivationFilterConfig {
    /// Minimum security mode. Unset means only the strongest mode.
    pub security_mode: Option<SecurityMode>,

    /// Allowed security policy uris. Unset allows any.
    pub security_policies: Option<Vec<String>>,
}

impl ActivationFilterConfig {
    /// Validates the filter.
    pub fn validate(&self) -> ConfigResult<()> {
        if matches!(&self.security_policies, Some(p) if p.iter().any(|s| s.trim().is_empty())) {
            return Err(ConfigError::invalid(
                "discovery.activation_filter.security_policies",
                "cannot contain empty entries",
            ));
        }
        Ok(())
    }

    /// Converts the filter into the registry model.
    pub fn to_model(&self) -> EndpointActivationFilterModel {
        EndpointActivationFilterModel {
            security_mode: self.security_mode,
            security_policies: self.security_policies.clone(),
            trust_lists: None,
        }
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level. `RUST_LOG` takes precedence.
    pub level: LogLevel,

    /// Log format.
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter directive of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parses a level name, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Single-line compact text.
    Compact,
    /// JSON lines.
    Json,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = UaregConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.discovery.refresh_interval, Duration::from_secs(60));
        assert_eq!(config.discovery.retry_interval, Duration::from_secs(10));
        assert_eq!(config.opcua.session_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let mut config = UaregConfig::default();
        config.registry.page_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field, .. }) if field == "registry.page_size"
        ));

        let mut config = UaregConfig::default();
        config.discovery.retry_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = UaregConfig::default();
        config.service.id = "  ".into();
        assert!(config.validate().is_err());

        let mut config = UaregConfig::default();
        config.opcua.keep_alive_interval = Duration::from_secs(120);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_activation_filter_to_model() {
        let filter = ActivationFilterConfig {
            security_mode: Some(SecurityMode::Sign),
            security_policies: Some(vec!["http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256".into()]),
        };
        let model = filter.to_model();
        assert!(model.matches(
            Some(SecurityMode::SignAndEncrypt),
            Some("http://opcfoundation.org/UA/SecurityPolicy#basic256sha256")
        ));
        assert!(!model.matches(Some(SecurityMode::None), None));
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("loud"), None);
    }
}
