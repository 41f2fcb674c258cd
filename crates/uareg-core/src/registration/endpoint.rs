// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Endpoint registration.
//!
//! ```text
//! tags      EndpointUrlLC, EndpointRegistrationUrl, SecurityLevel, Activated,
//!           AuthenticationMethods + shared tags
//! desired   EndpointUrl, AlternativeUrls, SecurityMode, SecurityPolicy,
//!           CredentialType, Credential, ServerThumbprint, ClientCertificate
//! reported  State (+ any desired key reported back by the supervisor)
//! ```

use std::collections::BTreeSet;

use serde_json::Value;

use super::{get, identity, tag, device_type, RegistrationBase, TwinPatch};
use crate::error::{RegistryError, RegistryResult};
use crate::models::{
    AuthenticationMethodModel, CredentialModel, EndpointInfoModel, EndpointModel,
    EndpointRegistrationModel,
};
use crate::twin::{merge, DeviceTwin, PropertyMap};
use crate::types::{
    CredentialType, EndpointActivationState, EndpointConnectivityState, SecurityMode,
};

/// Lower-cased registration url tag.
pub const ENDPOINT_URL_LC: &str = "EndpointUrlLC";
const ENDPOINT_REGISTRATION_URL: &str = "EndpointRegistrationUrl";
const SECURITY_LEVEL: &str = "SecurityLevel";
/// Activation flag tag.
pub const ACTIVATED: &str = "Activated";
const AUTHENTICATION_METHODS: &str = "AuthenticationMethods";
const ENDPOINT_URL: &str = "EndpointUrl";
const ALTERNATIVE_URLS: &str = "AlternativeUrls";
/// Security mode property.
pub const SECURITY_MODE: &str = "SecurityMode";
/// Security policy property.
pub const SECURITY_POLICY: &str = "SecurityPolicy";
const CREDENTIAL_TYPE: &str = "CredentialType";
const CREDENTIAL: &str = "Credential";
const SERVER_THUMBPRINT: &str = "ServerThumbprint";
const CLIENT_CERTIFICATE: &str = "ClientCertificate";
/// Reported connectivity state property.
pub const STATE: &str = "State";

/// Identity of an endpoint across discovery sweeps.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointLogicalKey {
    /// Lower-cased endpoint url.
    pub url_lc: Option<String>,
    /// Owning application.
    pub application_id: Option<String>,
    /// Security policy.
    pub security_policy: Option<String>,
    /// Security mode.
    pub security_mode: SecurityMode,
}

/// An endpoint as persisted in the twin store.
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistration {
    /// Shared registration fields.
    pub base: RegistrationBase,
    /// Url the endpoint was registered under.
    pub endpoint_registration_url: Option<String>,
    /// Security level reported by the server.
    pub security_level: Option<i32>,
    /// Activation flag.
    pub activated: Option<bool>,
    /// Supported authentication methods.
    pub authentication_methods: Option<Vec<AuthenticationMethodModel>>,
    /// Url used to connect.
    pub endpoint_url: Option<String>,
    /// Alternative urls.
    pub alternative_urls: Option<BTreeSet<String>>,
    /// Credential type.
    pub credential_type: Option<CredentialType>,
    /// Credential payload.
    pub credential: Option<Value>,
    /// Security policy.
    pub security_policy: Option<String>,
    /// Security mode.
    pub security_mode: Option<SecurityMode>,
    /// Server thumbprint.
    pub server_thumbprint: Option<Vec<u8>>,
    /// Client certificate.
    pub client_certificate: Option<Vec<u8>>,
    /// Connectivity state reported by the supervisor.
    pub state: EndpointConnectivityState,
    in_sync: bool,
}

impl EndpointRegistration {
    /// Returns the lower-cased registration url.
    pub fn endpoint_url_lc(&self) -> Option<String> {
        self.endpoint_registration_url.as_ref().map(|u| u.to_lowercase())
    }

    /// Returns the identifier derived from the identity fields.
    pub fn id(&self) -> Option<String> {
        let application_id = self.base.application_id.as_deref()?;
        let url = self.endpoint_registration_url.as_deref()?;
        Some(identity::endpoint_id(
            application_id,
            url,
            self.security_mode,
            self.security_policy.as_deref(),
        ))
    }

    /// Returns the twin id, falling back to the derived id.
    pub fn device_id(&self) -> Option<String> {
        self.base.device_id.clone().or_else(|| self.id())
    }

    /// Returns `true` if the endpoint is activated.
    #[inline]
    pub fn is_activated(&self) -> bool {
        self.activated.unwrap_or(false)
    }

    /// Returns the activation state, taking the connection into account.
    pub fn activation_state(&self) -> EndpointActivationState {
        match (self.is_activated(), self.base.connected) {
            (true, true) => EndpointActivationState::ActivatedAndConnected,
            (true, false) => EndpointActivationState::Activated,
            _ => EndpointActivationState::Deactivated,
        }
    }

    /// Sets the activation flag from a state.
    pub fn set_activation_state(&mut self, state: EndpointActivationState) {
        self.activated = Some(state.is_activated());
    }

    /// Returns `true` if desired and reported state agree.
    #[inline]
    pub fn is_in_sync(&self) -> bool {
        self.in_sync
    }

    /// Returns the logical identity.
    pub fn logical_key(&self) -> EndpointLogicalKey {
        EndpointLogicalKey {
            url_lc: self.endpoint_url_lc(),
            application_id: self.base.application_id.clone(),
            security_policy: self.security_policy.clone(),
            security_mode: self.security_mode.unwrap_or_default(),
        }
    }

    /// Compares identity fields only.
    pub fn logical_equals(&self, other: &Self) -> bool {
        self.logical_key() == other.logical_key()
    }

    /// Compares every persisted field.
    pub fn full_equals(&self, other: &Self) -> bool {
        self.base.full_equals(&other.base)
            && self.is_activated() == other.is_activated()
            && self.endpoint_url_lc() == other.endpoint_url_lc()
            && self.credential == other.credential
            && self.state == other.state
            && self.credential_type == other.credential_type
            && self.security_level == other.security_level
            && self.security_policy == other.security_policy
            && self.security_mode == other.security_mode
            && same_set(&self.authentication_methods, &other.authentication_methods)
            && self.client_certificate == other.client_certificate
            && self.server_thumbprint == other.server_thumbprint
    }

    // =========================================================================
    // Twin mapping
    // =========================================================================

    /// Builds the twin patch that turns `existing` into `update`.
    ///
    /// The id is derived again from the resulting identity fields. When it
    /// differs from the existing twin id the etag is cleared so that the store
    /// creates a new twin instead of overwriting the old identity.
    pub fn patch(existing: Option<&Self>, update: &Self) -> RegistryResult<DeviceTwin> {
        let mut patch = TwinPatch::default();
        RegistrationBase::patch(
            &mut patch,
            existing.map(|e| &e.base),
            &update.base,
            device_type::ENDPOINT,
        )?;

        if update.endpoint_registration_url.is_some()
            && update.endpoint_registration_url
                != existing.and_then(|e| e.endpoint_registration_url.clone())
        {
            patch.tag(ENDPOINT_URL_LC, update.endpoint_url_lc())?;
            patch.tag(ENDPOINT_REGISTRATION_URL, &update.endpoint_registration_url)?;
        }
        if update.security_level != existing.and_then(|e| e.security_level) {
            patch.tag(SECURITY_LEVEL, update.security_level)?;
        }
        if update.activated.is_some() && update.activated != existing.and_then(|e| e.activated) {
            patch.tag(ACTIVATED, update.activated)?;
        }
        if !same_set(
            &update.authentication_methods,
            &existing.and_then(|e| e.authentication_methods.clone()),
        ) {
            patch.tag(AUTHENTICATION_METHODS, &update.authentication_methods)?;
        }

        if update.endpoint_url.is_some()
            && update.endpoint_url != existing.and_then(|e| e.endpoint_url.clone())
        {
            patch.desired(ENDPOINT_URL, &update.endpoint_url)?;
        }
        if update.alternative_urls != existing.and_then(|e| e.alternative_urls.clone()) {
            patch.desired(ALTERNATIVE_URLS, &update.alternative_urls)?;
        }
        if update.security_mode.is_some()
            && update.security_mode != existing.and_then(|e| e.security_mode)
        {
            patch.desired(SECURITY_MODE, update.security_mode)?;
        }
        if update.security_policy.is_some()
            && update.security_policy != existing.and_then(|e| e.security_policy.clone())
        {
            patch.desired(SECURITY_POLICY, &update.security_policy)?;
        }
        if update.credential_type != existing.and_then(|e| e.credential_type) {
            patch.desired(CREDENTIAL_TYPE, update.credential_type)?;
        }
        if update.credential != existing.and_then(|e| e.credential.clone()) {
            patch.desired(CREDENTIAL, &update.credential)?;
        }
        if update.server_thumbprint != existing.and_then(|e| e.server_thumbprint.clone()) {
            patch.desired(SERVER_THUMBPRINT, update.server_thumbprint.as_ref().map(hex::encode))?;
        }
        if update.client_certificate.is_some()
            && update.client_certificate != existing.and_then(|e| e.client_certificate.clone())
        {
            patch.desired(CLIENT_CERTIFICATE, update.client_certificate.as_ref().map(hex::encode))?;
        }

        let url = update
            .endpoint_registration_url
            .as_deref()
            .or(existing.and_then(|e| e.endpoint_registration_url.as_deref()))
            .ok_or_else(|| RegistryError::argument("endpointUrl", "Endpoint url is required"))?;
        let application_id = update
            .base
            .application_id
            .as_deref()
            .or(existing.and_then(|e| e.base.application_id.as_deref()))
            .ok_or_else(|| RegistryError::argument("applicationId", "Application id is required"))?;
        let security_mode = update.security_mode.or(existing.and_then(|e| e.security_mode));
        let security_policy = update
            .security_policy
            .as_deref()
            .or(existing.and_then(|e| e.security_policy.as_deref()));

        let id = identity::endpoint_id(application_id, url, security_mode, security_policy);
        let existing_id = existing.and_then(|e| e.base.device_id.as_deref());
        let etag = if existing_id == Some(id.as_str()) {
            existing.and_then(|e| e.base.etag.clone())
        } else {
            None
        };
        Ok(patch.into_twin(id, None, etag))
    }

    /// Decodes a registration from a twin and a property view.
    pub fn from_twin_properties(twin: &DeviceTwin, properties: &PropertyMap) -> Self {
        let tags = twin.tags.as_ref();
        let props = Some(properties);
        let mut base = RegistrationBase::from_twin(twin);
        if let Some(site) = get::<String>(props, super::PROPERTY_SITE_ID) {
            base.site_id = Some(site);
        }
        Self {
            base,
            endpoint_registration_url: get(tags, ENDPOINT_REGISTRATION_URL),
            security_level: get(tags, SECURITY_LEVEL),
            activated: get(tags, ACTIVATED),
            authentication_methods: get(tags, AUTHENTICATION_METHODS),
            endpoint_url: get(props, ENDPOINT_URL),
            alternative_urls: get(props, ALTERNATIVE_URLS),
            credential_type: get(props, CREDENTIAL_TYPE),
            credential: get(props, CREDENTIAL),
            security_policy: get(props, SECURITY_POLICY),
            security_mode: get(props, SECURITY_MODE),
            server_thumbprint: get::<String>(props, SERVER_THUMBPRINT)
                .and_then(|v| hex::decode(v).ok()),
            client_certificate: get::<String>(props, CLIENT_CERTIFICATE)
                .and_then(|v| hex::decode(v).ok()),
            state: get(props, STATE).unwrap_or(EndpointConnectivityState::Connecting),
            in_sync: false,
        }
    }

    /// Decodes a registration from a twin.
    ///
    /// By default the consolidated view (reported over desired) is returned.
    /// With `only_server_state` the desired view is returned. Either way the
    /// result is marked in sync when both views agree.
    pub fn from_twin(twin: &DeviceTwin, only_server_state: bool) -> Self {
        let consolidated = Self::from_twin_properties(twin, &twin.consolidated());
        let desired = twin
            .desired()
            .map(|desired| Self::from_twin_properties(twin, &merge(None, Some(desired))));
        let (mut result, other) = match (only_server_state, desired) {
            (true, Some(desired)) => (desired, Some(consolidated)),
            (_, desired) => (consolidated, desired),
        };
        result.in_sync = other.map(|o| result.sync_fields_equal(&o)).unwrap_or(false);
        result
    }

    fn sync_fields_equal(&self, other: &Self) -> bool {
        self.endpoint_url == other.endpoint_url
            && self.alternative_urls == other.alternative_urls
            && self.credential_type == other.credential_type
            && self.credential == other.credential
            && self.security_policy == other.security_policy
            && self.security_mode == other.security_mode
            && self.client_certificate == other.client_certificate
            && self.server_thumbprint == other.server_thumbprint
    }

    // =========================================================================
    // Service model mapping
    // =========================================================================

    /// Converts into the service model.
    pub fn to_service_model(&self) -> EndpointInfoModel {
        let activation_state = self.activation_state();
        let url = non_empty(&self.endpoint_url)
            .or_else(|| self.endpoint_url_lc())
            .unwrap_or_default();
        EndpointInfoModel {
            application_id: self.base.application_id.clone().unwrap_or_default(),
            registration: EndpointRegistrationModel {
                id: self.device_id().unwrap_or_default(),
                endpoint_url: non_empty(&self.endpoint_registration_url)
                    .or_else(|| Some(url.clone()))
                    .filter(|u| !u.is_empty()),
                site_id: non_empty(&self.base.site_id),
                supervisor_id: non_empty(&self.base.supervisor_id),
                discoverer_id: non_empty(&self.base.discoverer_id),
                endpoint: EndpointModel {
                    url,
                    alternative_urls: self.alternative_urls.clone(),
                    user: self.credential_type.map(|credential_type| CredentialModel {
                        credential_type: (credential_type != CredentialType::None)
                            .then_some(credential_type),
                        value: self.credential.clone(),
                    }),
                    security_mode: self.security_mode.filter(|m| *m != SecurityMode::Best),
                    security_policy: non_empty(&self.security_policy),
                    server_thumbprint: self.server_thumbprint.clone(),
                    client_certificate: self.client_certificate.clone(),
                },
                security_level: self.security_level,
                certificate: self.base.certificate.clone(),
                authentication_methods: self.authentication_methods.clone(),
            },
            activation_state: Some(activation_state),
            endpoint_state: (activation_state == EndpointActivationState::ActivatedAndConnected)
                .then_some(self.state),
            out_of_sync: (self.base.connected && !self.in_sync).then_some(true),
            not_seen_since: self.base.not_seen_since,
        }
    }

    /// Builds a registration from the service model.
    pub fn from_service_model(model: &EndpointInfoModel, disabled: Option<bool>) -> Self {
        let registration = &model.registration;
        let endpoint = &registration.endpoint;
        let mut result = Self {
            base: RegistrationBase {
                is_disabled: disabled,
                not_seen_since: model.not_seen_since,
                application_id: Some(model.application_id.clone()).filter(|a| !a.is_empty()),
                site_id: registration.site_id.clone(),
                supervisor_id: registration.supervisor_id.clone(),
                discoverer_id: registration.discoverer_id.clone(),
                certificate: registration.certificate.clone(),
                thumbprint: registration.certificate.as_deref().map(identity::thumbprint),
                ..Default::default()
            },
            endpoint_registration_url: registration
                .endpoint_url
                .clone()
                .or_else(|| Some(endpoint.url.clone()))
                .filter(|u| !u.is_empty()),
            security_level: registration.security_level,
            authentication_methods: registration.authentication_methods.clone(),
            endpoint_url: Some(endpoint.url.clone()).filter(|u| !u.is_empty()),
            alternative_urls: endpoint.alternative_urls.clone(),
            credential_type: Some(
                endpoint
                    .user
                    .as_ref()
                    .map(CredentialModel::effective_type)
                    .unwrap_or_default(),
            ),
            credential: endpoint.user.as_ref().and_then(|u| u.value.clone()),
            security_mode: Some(endpoint.security_mode.unwrap_or_default()),
            security_policy: endpoint.security_policy.clone(),
            server_thumbprint: endpoint.server_thumbprint.clone(),
            client_certificate: endpoint.client_certificate.clone(),
            ..Default::default()
        };
        if let Some(state) = model.activation_state {
            result.set_activation_state(state);
        }
        result
    }

    /// Returns `true` if the registration describes the given endpoint.
    pub fn matches_endpoint(&self, endpoint: &EndpointModel) -> bool {
        self.endpoint_url.as_deref() == Some(endpoint.url.as_str())
            && self.alternative_urls == endpoint.alternative_urls
            && self.credential_type.unwrap_or_default()
                == endpoint.user.as_ref().map(CredentialModel::effective_type).unwrap_or_default()
            && self.credential == endpoint.user.as_ref().and_then(|u| u.value.clone())
            && self.security_mode.unwrap_or_default() == endpoint.security_mode.unwrap_or_default()
            && self.security_policy == endpoint.security_policy
            && self.client_certificate == endpoint.client_certificate
            && self.server_thumbprint == endpoint.server_thumbprint
    }

    /// Returns `true` if the registration describes the given endpoint info.
    pub fn matches(&self, model: &EndpointInfoModel) -> bool {
        self.matches_endpoint(&model.registration.endpoint)
            && self.base.not_seen_since == model.not_seen_since
            && self.base.application_id.as_deref() == Some(model.application_id.as_str())
            && self.activation_state()
                == model.activation_state.unwrap_or(EndpointActivationState::Deactivated)
            && self.base.certificate == model.registration.certificate
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.is_empty())
}

fn same_set<T: PartialEq>(a: &Option<Vec<T>>, b: &Option<Vec<T>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            a.len() == b.len() && a.iter().all(|x| b.contains(x)) && b.iter().all(|x| a.contains(x))
        }
        _ => false,
    }
}
