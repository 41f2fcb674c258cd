// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading and processing.
//!
//! # Loading Pipeline
//!
//! 1. Read the file and pick the format from its extension
//! 2. Resolve `${VAR}` / `${VAR:default}` placeholders in the raw text
//! 3. Parse YAML, TOML or JSON into [`UaregConfig`]
//! 4. Apply environment variable overrides
//! 5. Resolve the PKI directory against the config file location
//! 6. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! UAREG_SERVICE_ID=registry-eu-1
//! UAREG_SITE_ID=plant-7
//! UAREG_LOG_LEVEL=debug
//! UAREG_USE_REVERSE_PROXY=true
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{LogLevel, UaregConfig};
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default prefix of override variables.
pub const DEFAULT_ENV_PREFIX: &str = "UAREG";

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader.
///
/// # Examples
///
/// ```no_run
/// use uareg_config::loader::ConfigLoader;
///
/// let config = ConfigLoader::new().load("uareg.yaml").unwrap();
/// println!("{}", config.service.id);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Base directory for resolving relative paths.
    base_path: Option<PathBuf>,

    /// Environment variable prefix.
    env_prefix: String,

    /// Whether to resolve environment variables.
    resolve_env_vars: bool,

    /// Whether to resolve relative paths.
    resolve_paths: bool,
}

impl ConfigLoader {
    /// Creates a new configuration loader with default settings.
    pub fn new() -> Self {
        Self {
            base_path: None,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            resolve_env_vars: true,
            resolve_paths: true,
        }
    }

    /// Creates a builder for configuring the loader.
    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder::new()
    }

    /// Sets the base path for resolving relative paths.
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Enables or disables relative path resolution.
    pub fn with_path_resolution(mut self, enabled: bool) -> Self {
        self.resolve_paths = enabled;
        self
    }

    /// Loads configuration from a file.
    ///
    /// The format follows the extension: `.yaml`/`.yml`, `.toml` or `.json`.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<UaregConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let base_path = self.base_path.clone().unwrap_or_else(|| {
            path.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."))
        });

        let content = self.read_file(path)?;
        let format = ConfigFormat::from_path(path)?;
        let mut config = self.parse_content(&content, format, path)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }
        if self.resolve_paths {
            self.resolve_relative_paths(&mut config, &base_path);
        }

        config.validate()?;

        info!(service_id = %config.service.id, "Configuration loaded");
        debug!(
            page_size = config.registry.page_size,
            reverse_proxy = config.opcua.use_reverse_proxy,
            auto_activation = config.discovery.activation_filter.is_some(),
            "Effective configuration"
        );
        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<UaregConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)
        } else {
            content.to_string()
        };
        let mut config = parse_str(&content, format)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn read_file(&self, path: &Path) -> ConfigResult<String> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    fn parse_content(
        &self,
        content: &str,
        format: ConfigFormat,
        path: &Path,
    ) -> ConfigResult<UaregConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        parse_str(&content, format).map_err(|e| e.in_file(path))
    }

    /// Resolves `${VAR_NAME}` and `${VAR_NAME:default}` placeholders.
    ///
    /// Unknown variables without a default are kept verbatim.
    fn resolve_env_placeholders(&self, content: &str) -> String {
        let mut result = String::with_capacity(content.len());
        let mut chars = content.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' || chars.peek() != Some(&'{') {
                result.push(c);
                continue;
            }
            chars.next();

            let mut var_content = String::new();
            let mut found_close = false;
            for c in chars.by_ref() {
                if c == '}' {
                    found_close = true;
                    break;
                }
                var_content.push(c);
            }

            if !found_close {
                result.push_str("${");
                result.push_str(&var_content);
                continue;
            }

            let (var_name, default_value) = match var_content.split_once(':') {
                Some((name, default)) => (name, Some(default)),
                None => (var_content.as_str(), None),
            };

            match (env::var(var_name), default_value) {
                (Ok(value), _) => result.push_str(&value),
                (Err(_), Some(default)) => result.push_str(default),
                (Err(_), None) => {
                    warn!(variable = %var_name, "Environment variable not found");
                    result.push_str(&format!("${{{var_name}}}"));
                }
            }
        }

        result
    }

    fn apply_env_overrides(&self, config: &mut UaregConfig) -> ConfigResult<()> {
        let var = |suffix: &str| format!("{}_{}", self.env_prefix, suffix);

        if let Ok(value) = env::var(var("SERVICE_ID")) {
            config.service.id = value;
        }
        if let Ok(value) = env::var(var("SITE_ID")) {
            config.service.site_id = Some(value).filter(|s| !s.is_empty());
        }
        if let Ok(value) = env::var(var("LOG_LEVEL")) {
            config.logging.level = LogLevel::parse(&value).ok_or_else(|| ConfigError::EnvOverride {
                name: var("LOG_LEVEL"),
                value: value.clone(),
                expected: "one of trace, debug, info, warn or error",
            })?;
        }
        if let Ok(value) = env::var(var("USE_REVERSE_PROXY")) {
            config.opcua.use_reverse_proxy = parse_bool(&value);
        }

        Ok(())
    }

    fn resolve_relative_paths(&self, config: &mut UaregConfig, base_path: &Path) {
        if config.opcua.pki_dir.is_relative() {
            config.opcua.pki_dir = base_path.join(&config.opcua.pki_dir);
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigLoaderBuilder
// =============================================================================

/// Builder for ConfigLoader.
#[derive(Debug, Default)]
pub struct ConfigLoaderBuilder {
    base_path: Option<PathBuf>,
    env_prefix: Option<String>,
    resolve_env_vars: Option<bool>,
    resolve_paths: Option<bool>,
}

impl ConfigLoaderBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base path.
    pub fn base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Sets the environment prefix.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn resolve_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = Some(enabled);
        self
    }

    /// Enables or disables path resolution.
    pub fn resolve_paths(mut self, enabled: bool) -> Self {
        self.resolve_paths = Some(enabled);
        self
    }

    /// Builds the ConfigLoader.
    pub fn build(self) -> ConfigLoader {
        let mut loader = ConfigLoader::new();
        if let Some(base_path) = self.base_path {
            loader.base_path = Some(base_path);
        }
        if let Some(prefix) = self.env_prefix {
            loader.env_prefix = prefix;
        }
        if let Some(resolve_env_vars) = self.resolve_env_vars {
            loader.resolve_env_vars = resolve_env_vars;
        }
        if let Some(resolve_paths) = self.resolve_paths {
            loader.resolve_paths = resolve_paths;
        }
        loader
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_str(content: &str, format: ConfigFormat) -> ConfigResult<UaregConfig> {
    match format {
        ConfigFormat::Yaml => yaml_parse(content),
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::document(e))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::document(e))
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "enabled"
    )
}

/// YAML goes through the config crate.
fn yaml_parse<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .map_err(|e| ConfigError::document(e))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::document(e))
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<UaregConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<UaregConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    const YAML: &str = r#"
service:
  id: registry-test
  name: Test Registry

opcua:
  application_uri: urn:test:registry
  pki_dir: pki
  operation_timeout: 30s

registry:
  page_size: 50
  hard_delete_on_removal: true
  purge_not_seen_for: 7days

discovery:
  refresh_interval: 2m
  activation_filter:
    security_mode: Sign

logging:
  level: debug
  format: json
"#;

    #[test]
    fn test_load_yaml() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let config = ConfigLoader::new()
            .with_env_prefix("UAREG_TEST_LOAD_YAML")
            .load(file.path())
            .unwrap();

        assert_eq!(config.service.id, "registry-test");
        assert_eq!(config.opcua.operation_timeout, Duration::from_secs(30));
        assert_eq!(config.registry.page_size, 50);
        assert!(config.registry.hard_delete_on_removal);
        assert_eq!(
            config.registry.purge_not_seen_for,
            Some(Duration::from_secs(7 * 24 * 3600))
        );
        assert_eq!(config.discovery.refresh_interval, Duration::from_secs(120));
        assert_eq!(config.discovery.retry_interval, Duration::from_secs(10));
        assert!(config.discovery.activation_filter.is_some());
        assert_eq!(config.logging.level, LogLevel::Debug);

        let dir = file.path().parent().unwrap();
        assert_eq!(config.opcua.pki_dir, dir.join("pki"));
    }

    #[test]
    fn test_load_toml() {
        let toml = r#"
[service]
id = "registry-toml"

[discovery]
retry_interval = "5s"
"#;
        let config = ConfigLoader::new()
            .with_env_vars(false)
            .load_from_str(toml, ConfigFormat::Toml)
            .unwrap();
        assert_eq!(config.service.id, "registry-toml");
        assert_eq!(config.discovery.retry_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let json = r#"{"service": {"id": "x", "colour": "blue"}}"#;
        let result = ConfigLoader::new()
            .with_env_vars(false)
            .load_from_str(json, ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::Document(_))));
    }

    #[test]
    fn test_validation_applies_after_parse() {
        let json = r#"{"registry": {"page_size": 0}}"#;
        let result = ConfigLoader::new()
            .with_env_vars(false)
            .load_from_str(json, ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("uareg.yml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("uareg.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert!(ConfigFormat::from_path(Path::new("uareg.ini")).is_err());
        assert!(ConfigFormat::from_path(Path::new("uareg")).is_err());
    }

    #[test]
    fn test_env_placeholder_with_default() {
        let loader = ConfigLoader::new();
        assert_eq!(
            loader.resolve_env_placeholders("id: ${UAREG_TEST_NONEXISTENT_VAR:fallback}"),
            "id: fallback"
        );
        assert_eq!(
            loader.resolve_env_placeholders("id: ${UAREG_TEST_NONEXISTENT_VAR}"),
            "id: ${UAREG_TEST_NONEXISTENT_VAR}"
        );
        assert_eq!(loader.resolve_env_placeholders("id: ${open"), "id: ${open");
    }

    #[test]
    fn test_env_placeholder_resolution() {
        env::set_var("UAREG_TEST_PLACEHOLDER_SITE", "plant-9");
        let config = ConfigLoader::new()
            .with_env_prefix("UAREG_TEST_PLACEHOLDER")
            .load_from_str(
                "service:\n  id: r1\n  site_id: ${UAREG_TEST_PLACEHOLDER_SITE}\n",
                ConfigFormat::Yaml,
            )
            .unwrap();
        assert_eq!(config.service.site_id.as_deref(), Some("plant-9"));
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("UAREG_TEST_OVERRIDE_SERVICE_ID", "from-env");
        env::set_var("UAREG_TEST_OVERRIDE_LOG_LEVEL", "warn");
        env::set_var("UAREG_TEST_OVERRIDE_USE_REVERSE_PROXY", "yes");
        let config = ConfigLoader::new()
            .with_env_prefix("UAREG_TEST_OVERRIDE")
            .load_from_str("service:\n  id: from-file\n", ConfigFormat::Yaml)
            .unwrap();
        assert_eq!(config.service.id, "from-env");
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert!(config.opcua.use_reverse_proxy);
    }

    #[test]
    fn test_invalid_env_override() {
        env::set_var("UAREG_TEST_BADLEVEL_LOG_LEVEL", "loud");
        let result = ConfigLoader::new()
            .with_env_prefix("UAREG_TEST_BADLEVEL")
            .load_from_str("{}", ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::EnvOverride { .. })));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool("ON"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("no"));
    }

    #[test]
    fn test_loader_builder() {
        let loader = ConfigLoader::builder()
            .env_prefix("MYAPP")
            .resolve_env_vars(false)
            .resolve_paths(true)
            .build();

        assert_eq!(loader.env_prefix, "MYAPP");
        assert!(!loader.resolve_env_vars);
        assert!(loader.resolve_paths);
    }

    #[test]
    fn test_file_not_found() {
        let result = ConfigLoader::new().load("/nonexistent/path/uareg.yaml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }
}
