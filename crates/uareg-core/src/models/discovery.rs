// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Discovery and operation context models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::application::ApplicationInfoModel;
use super::endpoint::EndpointRegistrationModel;
use crate::types::SecurityMode;

/// Who performed a registry operation and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryOperationContext {
    /// Operator or service identity.
    pub authority_id: Option<String>,
    /// Operation time.
    pub time: DateTime<Utc>,
}

impl RegistryOperationContext {
    /// Creates a context stamped with the current time.
    pub fn now(authority_id: Option<String>) -> Self {
        Self {
            authority_id,
            time: Utc::now(),
        }
    }

    /// Returns the given context, or a fresh one when absent.
    pub fn validated(context: Option<Self>) -> Self {
        context.unwrap_or_else(|| Self::now(None))
    }
}

impl Default for RegistryOperationContext {
    fn default() -> Self {
        Self::now(None)
    }
}

/// Selects which discovered endpoints are activated automatically.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointActivationFilterModel {
    /// Minimum security mode. Defaults to `Best`.
    pub security_mode: Option<SecurityMode>,
    /// Allowed security policies (case-insensitive). `None` allows any.
    pub security_policies: Option<Vec<String>>,
    /// Certificate trust lists (reserved for endpoint certificate validation).
    pub trust_lists: Option<Vec<String>>,
}

impl EndpointActivationFilterModel {
    /// Returns `true` if an endpoint with the given security matches the filter.
    pub fn matches(&self, mode: Option<SecurityMode>, policy: Option<&str>) -> bool {
        let mode = mode.unwrap_or(SecurityMode::None);
        if !mode.matches_filter(self.security_mode.unwrap_or(SecurityMode::Best)) {
            return false;
        }
        match &self.security_policies {
            Some(policies) => match policy {
                Some(policy) => policies.iter().any(|p| p.eq_ignore_ascii_case(policy)),
                None => false,
            },
            None => true,
        }
    }
}

/// Discovery configuration sent to a discoverer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfigModel {
    /// Address ranges to scan.
    pub address_ranges_to_scan: Option<String>,
    /// Port ranges to scan.
    pub port_ranges_to_scan: Option<String>,
    /// Discovery urls to probe directly.
    pub discovery_urls: Option<Vec<String>>,
    /// Auto-activation filter.
    pub activation_filter: Option<EndpointActivationFilterModel>,
}

/// Discovery mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DiscoveryMode {
    /// Discovery off.
    #[default]
    Off,
    /// Local machine only.
    Local,
    /// Attached networks.
    Network,
    /// Fast scan of known ports.
    Fast,
    /// Full scan.
    Scan,
}

/// A discovery request fanned out to discoverers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryRequestModel {
    /// Request id for correlation.
    pub id: Option<String>,
    /// Mode.
    pub discovery: Option<DiscoveryMode>,
    /// Configuration.
    pub configuration: Option<DiscoveryConfigModel>,
    /// Operation context.
    pub context: Option<RegistryOperationContext>,
}

/// Outcome of one discovery run, delivered with its events.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryResultModel {
    /// Request id the run answered.
    pub id: Option<String>,
    /// Only add or update, never remove.
    pub register_only: Option<bool>,
    /// Configuration the run used.
    pub discovery_config: Option<DiscoveryConfigModel>,
    /// Diagnostics.
    pub diagnostics: Option<serde_json::Value>,
    /// Operation context.
    pub context: Option<RegistryOperationContext>,
}

impl DiscoveryResultModel {
    /// Returns `true` if removals must be skipped.
    #[inline]
    pub fn is_register_only(&self) -> bool {
        self.register_only.unwrap_or(false)
    }

    /// Returns the activation filter, if any.
    pub fn activation_filter(&self) -> Option<&EndpointActivationFilterModel> {
        self.discovery_config
            .as_ref()
            .and_then(|c| c.activation_filter.as_ref())
    }
}

/// One discovered endpoint of one application.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryEventModel {
    /// Application the endpoint belongs to.
    pub application: ApplicationInfoModel,
    /// Discovered endpoint.
    pub registration: EndpointRegistrationModel,
    /// Index of the event in the run.
    pub index: u32,
    /// Time of discovery.
    pub time_stamp: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_filter_defaults_to_best() {
        let filter = EndpointActivationFilterModel::default();
        assert!(filter.matches(Some(SecurityMode::SignAndEncrypt), Some("any")));
        assert!(!filter.matches(Some(SecurityMode::Sign), Some("any")));
        assert!(!filter.matches(None, None));
    }

    #[test]
    fn test_activation_filter_policies_ignore_case() {
        let filter = EndpointActivationFilterModel {
            security_mode: Some(SecurityMode::None),
            security_policies: Some(vec![
                "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256".to_string(),
            ]),
            trust_lists: None,
        };
        assert!(filter.matches(
            Some(SecurityMode::Sign),
            Some("HTTP://OPCFOUNDATION.ORG/UA/SECURITYPOLICY#BASIC256SHA256")
        ));
        assert!(!filter.matches(
            Some(SecurityMode::Sign),
            Some("http://opcfoundation.org/UA/SecurityPolicy#None")
        ));
        assert!(!filter.matches(Some(SecurityMode::Sign), None));
    }

    #[test]
    fn test_context_validated() {
        let ctx = RegistryOperationContext::now(Some("operator".into()));
        let validated = RegistryOperationContext::validated(Some(ctx.clone()));
        assert_eq!(validated, ctx);
        assert!(RegistryOperationContext::validated(None).authority_id.is_none());
    }
}
