// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Endpoint models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::{
    CredentialType, EndpointActivationState, EndpointConnectivityState, SecurityMode,
};

/// User credential used to open a session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialModel {
    /// Credential type. `None` means anonymous.
    pub credential_type: Option<CredentialType>,
    /// Credential payload (user name/password object, certificate, token).
    pub value: Option<serde_json::Value>,
}

impl CredentialModel {
    /// Creates a user name and password credential.
    pub fn user_name(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credential_type: Some(CredentialType::UserName),
            value: Some(serde_json::json!({
                "user": user.into(),
                "password": password.into(),
            })),
        }
    }

    /// Returns the effective credential type.
    #[inline]
    pub fn effective_type(&self) -> CredentialType {
        self.credential_type.unwrap_or_default()
    }
}

/// Address and security settings of a server endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointModel {
    /// Endpoint url.
    pub url: String,
    /// Alternative urls reaching the same endpoint.
    pub alternative_urls: Option<BTreeSet<String>>,
    /// User credential.
    pub user: Option<CredentialModel>,
    /// Security mode. `None` means best available.
    pub security_mode: Option<SecurityMode>,
    /// Security policy uri.
    pub security_policy: Option<String>,
    /// Thumbprint of the server certificate.
    pub server_thumbprint: Option<Vec<u8>>,
    /// Client certificate to present.
    pub client_certificate: Option<Vec<u8>>,
}

impl EndpointModel {
    /// Creates an endpoint model for a url with default security.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the security mode and policy.
    pub fn with_security(mut self, mode: SecurityMode, policy: impl Into<String>) -> Self {
        self.security_mode = Some(mode);
        self.security_policy = Some(policy.into());
        self
    }

    /// Sets the user credential.
    pub fn with_user(mut self, user: CredentialModel) -> Self {
        self.user = Some(user);
        self
    }
}

/// Authentication method advertised by an endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthenticationMethodModel {
    /// Method identifier.
    pub id: String,
    /// Credential type the method accepts.
    pub credential_type: Option<CredentialType>,
    /// Security policy applied to the token.
    pub security_policy: Option<String>,
    /// Method specific configuration.
    pub configuration: Option<serde_json::Value>,
}

/// Registration details of an endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointRegistrationModel {
    /// Registered identifier of the endpoint.
    pub id: String,
    /// Url the endpoint was discovered or registered under.
    pub endpoint_url: Option<String>,
    /// Site of the endpoint.
    pub site_id: Option<String>,
    /// Supervisor that manages the endpoint.
    pub supervisor_id: Option<String>,
    /// Discoverer that reported the endpoint.
    pub discoverer_id: Option<String>,
    /// Endpoint address and security.
    pub endpoint: EndpointModel,
    /// Security level reported by the server.
    pub security_level: Option<i32>,
    /// Endpoint certificate.
    pub certificate: Option<Vec<u8>>,
    /// Supported authentication methods.
    pub authentication_methods: Option<Vec<AuthenticationMethodModel>>,
}

/// Endpoint registration with its activation and connectivity state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointInfoModel {
    /// Owning application.
    pub application_id: String,
    /// Registration details.
    pub registration: EndpointRegistrationModel,
    /// Activation state.
    pub activation_state: Option<EndpointActivationState>,
    /// Connectivity state, present only when activated and connected.
    pub endpoint_state: Option<EndpointConnectivityState>,
    /// Set when the supervisor's reported state differs from the desired state.
    pub out_of_sync: Option<bool>,
    /// Set while the endpoint is disabled.
    pub not_seen_since: Option<DateTime<Utc>>,
}

/// Filter for endpoint queries. Absent fields do not constrain the result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointRegistrationQueryModel {
    /// Endpoint url (compared lower-cased).
    pub url: Option<String>,
    /// Application id.
    pub application_id: Option<String>,
    /// Supervisor id.
    pub supervisor_id: Option<String>,
    /// Discoverer id.
    pub discoverer_id: Option<String>,
    /// Site or gateway id.
    pub site_or_gateway_id: Option<String>,
    /// Certificate thumbprint.
    pub certificate: Option<String>,
    /// Security mode.
    pub security_mode: Option<SecurityMode>,
    /// Security policy uri.
    pub security_policy: Option<String>,
    /// Activation flag.
    pub activated: Option<bool>,
    /// Connection flag.
    pub connected: Option<bool>,
    /// Reported connectivity state.
    pub endpoint_state: Option<EndpointConnectivityState>,
    /// Include disabled endpoints.
    pub include_not_seen_since: Option<bool>,
}

/// A page of endpoints.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointInfoListModel {
    /// Endpoints on this page.
    pub items: Vec<EndpointInfoModel>,
    /// Token for the next page, if any.
    pub continuation_token: Option<String>,
}
