// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Application models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::discovery::RegistryOperationContext;
use super::endpoint::EndpointRegistrationModel;
use crate::types::ApplicationType;

/// An OPC UA application known to the registry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationInfoModel {
    /// Registry identifier, derived from site and application uri.
    pub application_id: String,
    /// Application type.
    pub application_type: ApplicationType,
    /// Application uri.
    pub application_uri: String,
    /// Product uri.
    pub product_uri: Option<String>,
    /// Default name.
    pub application_name: Option<String>,
    /// Locale of the default name.
    pub locale: Option<String>,
    /// Names by locale.
    pub localized_names: Option<BTreeMap<String, String>>,
    /// Application certificate.
    pub certificate: Option<Vec<u8>>,
    /// Server capabilities.
    pub capabilities: Option<BTreeSet<String>>,
    /// Discovery urls.
    pub discovery_urls: Option<BTreeSet<String>>,
    /// Discovery profile uri.
    pub discovery_profile_uri: Option<String>,
    /// Gateway server uri.
    pub gateway_server_uri: Option<String>,
    /// Host addresses the application was found on.
    pub host_addresses: Option<BTreeSet<String>>,
    /// Site of the application.
    pub site_id: Option<String>,
    /// Discoverer that found the application.
    pub discoverer_id: Option<String>,
    /// Set while the application is disabled.
    pub not_seen_since: Option<DateTime<Utc>>,
    /// Creation audit record.
    pub created: Option<RegistryOperationContext>,
    /// Last update audit record.
    pub updated: Option<RegistryOperationContext>,
}

impl ApplicationInfoModel {
    /// Returns the site or, when none, the discoverer the application belongs to.
    pub fn site_or_gateway_id(&self) -> Option<&str> {
        self.site_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.discoverer_id.as_deref())
    }
}

/// Application with its endpoints.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationRegistrationModel {
    /// Application.
    pub application: ApplicationInfoModel,
    /// Endpoints of the application.
    pub endpoints: Vec<EndpointRegistrationModel>,
}

/// Request to register an application explicitly.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationRegistrationRequestModel {
    /// Application uri (required).
    pub application_uri: Option<String>,
    /// Application type.
    pub application_type: Option<ApplicationType>,
    /// Product uri.
    pub product_uri: Option<String>,
    /// Default name.
    pub application_name: Option<String>,
    /// Locale of the default name.
    pub locale: Option<String>,
    /// Site of the application.
    pub site_id: Option<String>,
    /// Names by locale.
    pub localized_names: Option<BTreeMap<String, String>>,
    /// Capabilities.
    pub capabilities: Option<BTreeSet<String>>,
    /// Discovery urls.
    pub discovery_urls: Option<BTreeSet<String>>,
    /// Discovery profile uri.
    pub discovery_profile_uri: Option<String>,
    /// Gateway server uri.
    pub gateway_server_uri: Option<String>,
    /// Operation context.
    pub context: Option<RegistryOperationContext>,
}

/// Partial update of an application. Absent fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationRegistrationUpdateModel {
    /// Product uri.
    pub product_uri: Option<String>,
    /// Default name.
    pub application_name: Option<String>,
    /// Locale of the default name.
    pub locale: Option<String>,
    /// Names by locale.
    pub localized_names: Option<BTreeMap<String, String>>,
    /// Certificate.
    pub certificate: Option<Vec<u8>>,
    /// Capabilities.
    pub capabilities: Option<BTreeSet<String>>,
    /// Discovery urls.
    pub discovery_urls: Option<BTreeSet<String>>,
    /// Discovery profile uri.
    pub discovery_profile_uri: Option<String>,
    /// Gateway server uri.
    pub gateway_server_uri: Option<String>,
    /// Operation context.
    pub context: Option<RegistryOperationContext>,
}

/// Filter for application queries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationRegistrationQueryModel {
    /// Application uri (compared lower-cased).
    pub application_uri: Option<String>,
    /// Application type.
    pub application_type: Option<ApplicationType>,
    /// Application name.
    pub application_name: Option<String>,
    /// Locale the name is matched in.
    pub locale: Option<String>,
    /// Product uri.
    pub product_uri: Option<String>,
    /// Capability.
    pub capability: Option<String>,
    /// Discoverer id.
    pub discoverer_id: Option<String>,
    /// Gateway server uri.
    pub gateway_server_uri: Option<String>,
    /// Discovery profile uri.
    pub discovery_profile_uri: Option<String>,
    /// Site or gateway id.
    pub site_or_gateway_id: Option<String>,
    /// Include disabled applications.
    pub include_not_seen_since: Option<bool>,
}

/// A page of applications.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationInfoListModel {
    /// Applications on this page.
    pub items: Vec<ApplicationInfoModel>,
    /// Token for the next page, if any.
    pub continuation_token: Option<String>,
}

/// A page of site identifiers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSiteListModel {
    /// Sites on this page.
    pub sites: Vec<String>,
    /// Token for the next page, if any.
    pub continuation_token: Option<String>,
}
