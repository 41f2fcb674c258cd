// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Pre-built discovery events, registration requests and configuration
//! documents shared by the integration suites.

use uareg_core::models::{
    ApplicationInfoModel, ApplicationRegistrationRequestModel, DiscoveryConfigModel,
    DiscoveryEventModel, DiscoveryResultModel, EndpointActivationFilterModel, EndpointModel,
    EndpointRegistrationModel,
};
use uareg_core::registration::identity;
use uareg_core::types::{ApplicationType, SecurityMode};

/// Security policy URI used by secure fixture endpoints.
pub const BASIC256SHA256: &str = "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256";

// =============================================================================
// Identity Fixtures
// =============================================================================

/// Fixture providing site, discoverer and supervisor identities.
pub struct IdentityFixtures;

impl IdentityFixtures {
    /// The default site.
    pub fn site() -> &'static str {
        "plant-1"
    }

    /// Edge device hosting the default supervisor.
    pub fn edge_device() -> &'static str {
        "edge-01"
    }

    /// Module id of the default supervisor.
    pub fn supervisor_module() -> &'static str {
        "twin"
    }

    /// Registry id of the default supervisor.
    pub fn supervisor_id() -> String {
        identity::module_identity(Self::edge_device(), Some(Self::supervisor_module()))
    }

    /// Registry id of a discoverer on `device`.
    pub fn discoverer_id(device: &str) -> String {
        identity::module_identity(device, Some("discovery"))
    }
}

// =============================================================================
// Discovery Fixtures
// =============================================================================

/// Fixture providing discovery events and results.
pub struct DiscoveryFixtures;

impl DiscoveryFixtures {
    /// One discovered endpoint of a server application, owned by the
    /// default supervisor.
    pub fn event(application_uri: &str, url: &str, mode: SecurityMode) -> DiscoveryEventModel {
        DiscoveryEventModel {
            application: ApplicationInfoModel {
                application_uri: application_uri.to_string(),
                application_type: ApplicationType::Server,
                application_name: Some(format!("{application_uri} server")),
                product_uri: Some("urn:vendor:product".to_string()),
                ..Default::default()
            },
            registration: EndpointRegistrationModel {
                endpoint_url: Some(url.to_string()),
                supervisor_id: Some(IdentityFixtures::supervisor_id()),
                security_level: Some(security_level(mode)),
                endpoint: EndpointModel::new(url).with_security(mode, policy_for(mode)),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// A server offering an unsecured and a signed-and-encrypted endpoint.
    pub fn dual_endpoint_server(application_uri: &str, host: &str) -> Vec<DiscoveryEventModel> {
        let url = format!("opc.tcp://{host}:4840");
        vec![
            Self::event(application_uri, &url, SecurityMode::None),
            Self::event(application_uri, &url, SecurityMode::SignAndEncrypt),
        ]
    }

    /// A full sweep result without activation filter.
    pub fn sweep() -> DiscoveryResultModel {
        DiscoveryResultModel::default()
    }

    /// A full sweep result that auto-activates endpoints matching `filter`.
    pub fn sweep_with_filter(filter: EndpointActivationFilterModel) -> DiscoveryResultModel {
        DiscoveryResultModel {
            discovery_config: Some(DiscoveryConfigModel {
                activation_filter: Some(filter),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// A register-only result.
    pub fn register_only() -> DiscoveryResultModel {
        DiscoveryResultModel {
            register_only: Some(true),
            ..Default::default()
        }
    }
}

fn policy_for(mode: SecurityMode) -> &'static str {
    match mode {
        SecurityMode::None => uareg_core::types::SECURITY_POLICY_NONE,
        _ => BASIC256SHA256,
    }
}

fn security_level(mode: SecurityMode) -> i32 {
    match mode {
        SecurityMode::SignAndEncrypt => 3,
        SecurityMode::Sign => 2,
        _ => 0,
    }
}

// =============================================================================
// Application Fixtures
// =============================================================================

/// Fixture providing application registration requests.
pub struct ApplicationFixtures;

impl ApplicationFixtures {
    /// A server registration request in the default site.
    pub fn server_request(application_uri: &str) -> ApplicationRegistrationRequestModel {
        ApplicationRegistrationRequestModel {
            application_uri: Some(application_uri.to_string()),
            application_type: Some(ApplicationType::Server),
            application_name: Some("Line controller".to_string()),
            site_id: Some(IdentityFixtures::site().to_string()),
            capabilities: Some(["DA".to_string(), "HD".to_string()].into()),
            discovery_urls: Some(["opc.tcp://line:4840".to_string()].into()),
            ..Default::default()
        }
    }
}

// =============================================================================
// Config Fixtures
// =============================================================================

/// Fixture providing configuration documents.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// A complete YAML configuration.
    pub fn full_yaml() -> &'static str {
        r#"
service:
  id: reg-plant-1
  name: Plant 1 registry
  site_id: plant-1

opcua:
  application_name: Plant 1 registry
  application_uri: urn:plant-1:registry
  pki_dir: pki
  session_timeout: 2m
  keep_alive_interval: 10s
  operation_timeout: 30s
  connect_timeout: 15s
  use_reverse_proxy: true
  cleanup_queue_capacity: 16

registry:
  page_size: 50
  hard_delete_on_removal: true
  purge_not_seen_for: 7days

discovery:
  refresh_interval: 2m
  retry_interval: 5s
  activation_filter:
    security_mode: SignAndEncrypt
    security_policies:
      - http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256

logging:
  level: debug
  format: json
"#
    }

    /// A minimal TOML configuration.
    pub fn minimal_toml() -> &'static str {
        r#"
[service]
id = "reg-toml"

[registry]
page_size = 25
"#
    }

    /// A minimal JSON configuration.
    pub fn minimal_json() -> &'static str {
        r#"{ "service": { "id": "reg-json" }, "logging": { "level": "warn" } }"#
    }
}
