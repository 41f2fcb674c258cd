// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Application registration. All application fields are twin tags.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use super::{device_type, get, identity, RegistrationBase, TwinPatch};
use crate::error::{RegistryError, RegistryResult};
use crate::models::{ApplicationInfoModel, RegistryOperationContext};
use crate::twin::DeviceTwin;
use crate::types::ApplicationType;

/// Application uri tag.
pub const APPLICATION_URI: &str = "ApplicationUri";
/// Lower-cased application uri tag.
pub const APPLICATION_URI_LC: &str = "ApplicationUriLC";
/// Application name tag.
pub const APPLICATION_NAME: &str = "ApplicationName";
/// Localized names tag (object keyed by locale).
pub const LOCALIZED_NAMES: &str = "LocalizedNames";
/// Application type tag.
pub const APPLICATION_TYPE: &str = "ApplicationType";
/// Product uri tag.
pub const PRODUCT_URI: &str = "ProductUri";
/// Capabilities tag (object of sanitized capability to `true`).
pub const CAPABILITIES: &str = "Capabilities";
/// Discovery profile uri tag.
pub const DISCOVERY_PROFILE_URI: &str = "DiscoveryProfileUri";
/// Gateway server uri tag.
pub const GATEWAY_SERVER_URI: &str = "GatewayServerUri";
const LOCALE: &str = "Locale";
const DISCOVERY_URLS: &str = "DiscoveryUrls";
const HOST_ADDRESSES: &str = "HostAddresses";
const CREATE_AUTHORITY_ID: &str = "CreateAuthorityId";
const CREATE_TIME: &str = "CreateTime";
const UPDATE_AUTHORITY_ID: &str = "UpdateAuthorityId";
const UPDATE_TIME: &str = "UpdateTime";

/// Normalizes a capability into a tag key.
pub fn capability_key(capability: &str) -> String {
    capability
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

/// Identity of an application across discovery sweeps.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApplicationLogicalKey {
    /// Site or gateway id.
    pub site_or_gateway_id: Option<String>,
    /// Lower-cased application uri.
    pub application_uri_lc: Option<String>,
}

/// An application as persisted in the twin store.
#[derive(Debug, Clone, Default)]
pub struct ApplicationRegistration {
    /// Shared registration fields.
    pub base: RegistrationBase,
    /// Application uri.
    pub application_uri: Option<String>,
    /// Default name.
    pub application_name: Option<String>,
    /// Locale of the default name.
    pub locale: Option<String>,
    /// Names by locale.
    pub localized_names: Option<BTreeMap<String, String>>,
    /// Application type.
    pub application_type: Option<ApplicationType>,
    /// Product uri.
    pub product_uri: Option<String>,
    /// Capabilities.
    pub capabilities: Option<BTreeSet<String>>,
    /// Discovery urls.
    pub discovery_urls: Option<BTreeSet<String>>,
    /// Discovery profile uri.
    pub discovery_profile_uri: Option<String>,
    /// Gateway server uri.
    pub gateway_server_uri: Option<String>,
    /// Host addresses.
    pub host_addresses: Option<BTreeSet<String>>,
    /// Creator.
    pub create_authority_id: Option<String>,
    /// Creation time.
    pub create_time: Option<DateTime<Utc>>,
    /// Last updater.
    pub update_authority_id: Option<String>,
    /// Last update time.
    pub update_time: Option<DateTime<Utc>>,
}

impl ApplicationRegistration {
    /// Returns the lower-cased application uri.
    pub fn application_uri_lc(&self) -> Option<String> {
        self.application_uri.as_ref().map(|u| u.to_lowercase())
    }

    /// Returns the identifier derived from site and application uri.
    pub fn id(&self) -> Option<String> {
        identity::application_id(self.base.site_or_gateway_id(), self.application_uri.as_deref())
    }

    /// Returns the twin id, falling back to the derived id.
    pub fn device_id(&self) -> Option<String> {
        self.base.device_id.clone().or_else(|| self.id())
    }

    /// Returns the logical identity.
    pub fn logical_key(&self) -> ApplicationLogicalKey {
        ApplicationLogicalKey {
            site_or_gateway_id: self.base.site_or_gateway_id().map(str::to_string),
            application_uri_lc: self.application_uri_lc(),
        }
    }

    /// Compares identity fields only.
    pub fn logical_equals(&self, other: &Self) -> bool {
        self.logical_key() == other.logical_key()
    }

    /// Compares every persisted field except audit stamps.
    pub fn full_equals(&self, other: &Self) -> bool {
        self.base.full_equals(&other.base)
            && self.application_uri_lc() == other.application_uri_lc()
            && self.application_name == other.application_name
            && self.locale == other.locale
            && self.localized_names == other.localized_names
            && self.application_type == other.application_type
            && self.product_uri == other.product_uri
            && self.capabilities_keys() == other.capabilities_keys()
            && self.discovery_urls == other.discovery_urls
            && self.discovery_profile_uri == other.discovery_profile_uri
            && self.gateway_server_uri == other.gateway_server_uri
            && self.host_addresses == other.host_addresses
    }

    fn capabilities_keys(&self) -> Option<BTreeSet<String>> {
        self.capabilities
            .as_ref()
            .map(|c| c.iter().map(|c| capability_key(c)).collect())
    }

    /// Builds the twin patch that turns `existing` into `update`.
    ///
    /// Clears the etag when the derived id differs from the existing twin id.
    pub fn patch(existing: Option<&Self>, update: &Self) -> RegistryResult<DeviceTwin> {
        let mut patch = TwinPatch::default();
        let mut base = update.base.clone();
        base.application_id = update.id().or_else(|| existing.and_then(Self::id));
        RegistrationBase::patch(
            &mut patch,
            existing.map(|e| &e.base),
            &base,
            device_type::APPLICATION,
        )?;

        macro_rules! tag_if_changed {
            ($name:expr, $field:ident) => {
                if update.$field != existing.and_then(|e| e.$field.clone()) {
                    patch.tag($name, &update.$field)?;
                }
            };
        }

        if update.application_uri.is_some()
            && update.application_uri != existing.and_then(|e| e.application_uri.clone())
        {
            patch.tag(APPLICATION_URI, &update.application_uri)?;
            patch.tag(APPLICATION_URI_LC, update.application_uri_lc())?;
        }
        tag_if_changed!(APPLICATION_NAME, application_name);
        tag_if_changed!(LOCALE, locale);
        tag_if_changed!(LOCALIZED_NAMES, localized_names);
        tag_if_changed!(APPLICATION_TYPE, application_type);
        tag_if_changed!(PRODUCT_URI, product_uri);
        tag_if_changed!(DISCOVERY_URLS, discovery_urls);
        tag_if_changed!(DISCOVERY_PROFILE_URI, discovery_profile_uri);
        tag_if_changed!(GATEWAY_SERVER_URI, gateway_server_uri);
        tag_if_changed!(HOST_ADDRESSES, host_addresses);
        tag_if_changed!(CREATE_AUTHORITY_ID, create_authority_id);
        tag_if_changed!(CREATE_TIME, create_time);
        tag_if_changed!(UPDATE_AUTHORITY_ID, update_authority_id);
        tag_if_changed!(UPDATE_TIME, update_time);

        let capabilities = update.capabilities_keys();
        if capabilities != existing.and_then(Self::capabilities_keys) {
            let map: Option<BTreeMap<String, bool>> =
                capabilities.map(|c| c.into_iter().map(|k| (k, true)).collect());
            patch.tag(CAPABILITIES, map)?;
        }

        let application_uri = update
            .application_uri
            .as_deref()
            .or(existing.and_then(|e| e.application_uri.as_deref()));
        let site_or_gateway = update
            .base
            .site_or_gateway_id()
            .or(existing.and_then(|e| e.base.site_or_gateway_id()));
        let id = identity::application_id(site_or_gateway, application_uri).ok_or_else(|| {
            RegistryError::argument("applicationUri", "Application uri is required")
        })?;
        let etag = if existing.and_then(|e| e.base.device_id.as_deref()) == Some(id.as_str()) {
            existing.and_then(|e| e.base.etag.clone())
        } else {
            None
        };
        Ok(patch.into_twin(id, None, etag))
    }

    /// Decodes a registration from a twin.
    pub fn from_twin(twin: &DeviceTwin) -> Self {
        let tags = twin.tags.as_ref();
        Self {
            base: RegistrationBase::from_twin(twin),
            application_uri: get(tags, APPLICATION_URI),
            application_name: get(tags, APPLICATION_NAME),
            locale: get(tags, LOCALE),
            localized_names: get(tags, LOCALIZED_NAMES),
            application_type: get(tags, APPLICATION_TYPE),
            product_uri: get(tags, PRODUCT_URI),
            capabilities: get::<BTreeMap<String, bool>>(tags, CAPABILITIES)
                .map(|m| m.into_keys().collect()),
            discovery_urls: get(tags, DISCOVERY_URLS),
            discovery_profile_uri: get(tags, DISCOVERY_PROFILE_URI),
            gateway_server_uri: get(tags, GATEWAY_SERVER_URI),
            host_addresses: get(tags, HOST_ADDRESSES),
            create_authority_id: get(tags, CREATE_AUTHORITY_ID),
            create_time: get(tags, CREATE_TIME),
            update_authority_id: get(tags, UPDATE_AUTHORITY_ID),
            update_time: get(tags, UPDATE_TIME),
        }
    }

    /// Converts into the service model.
    pub fn to_service_model(&self) -> ApplicationInfoModel {
        ApplicationInfoModel {
            application_id: self.device_id().unwrap_or_default(),
            application_type: self.application_type.unwrap_or_default(),
            application_uri: self.application_uri.clone().unwrap_or_default(),
            product_uri: self.product_uri.clone(),
            application_name: self.application_name.clone(),
            locale: self.locale.clone(),
            localized_names: self.localized_names.clone(),
            certificate: self.base.certificate.clone(),
            capabilities: self.capabilities.clone(),
            discovery_urls: self.discovery_urls.clone(),
            discovery_profile_uri: self.discovery_profile_uri.clone(),
            gateway_server_uri: self.gateway_server_uri.clone(),
            host_addresses: self.host_addresses.clone(),
            site_id: self.base.site_id.clone().filter(|s| !s.is_empty()),
            discoverer_id: self.base.discoverer_id.clone(),
            not_seen_since: self.base.not_seen_since,
            created: self.create_time.map(|time| RegistryOperationContext {
                authority_id: self.create_authority_id.clone(),
                time,
            }),
            updated: self.update_time.map(|time| RegistryOperationContext {
                authority_id: self.update_authority_id.clone(),
                time,
            }),
        }
    }

    /// Builds a registration from the service model.
    pub fn from_service_model(
        model: &ApplicationInfoModel,
        disabled: Option<bool>,
        etag: Option<String>,
    ) -> Self {
        let mut registration = Self {
            base: RegistrationBase {
                device_id: Some(model.application_id.clone()).filter(|id| !id.is_empty()),
                etag,
                is_disabled: disabled,
                not_seen_since: model.not_seen_since,
                site_id: model.site_id.clone(),
                discoverer_id: model.discoverer_id.clone(),
                certificate: model.certificate.clone(),
                thumbprint: model.certificate.as_deref().map(identity::thumbprint),
                ..Default::default()
            },
            application_uri: Some(model.application_uri.clone()).filter(|u| !u.is_empty()),
            application_name: model.application_name.clone(),
            locale: model.locale.clone(),
            localized_names: model.localized_names.clone(),
            application_type: Some(model.application_type),
            product_uri: model.product_uri.clone(),
            capabilities: model.capabilities.clone(),
            discovery_urls: model.discovery_urls.clone(),
            discovery_profile_uri: model.discovery_profile_uri.clone(),
            gateway_server_uri: model.gateway_server_uri.clone(),
            host_addresses: model.host_addresses.clone(),
            create_authority_id: model.created.as_ref().and_then(|c| c.authority_id.clone()),
            create_time: model.created.as_ref().map(|c| c.time),
            update_authority_id: model.updated.as_ref().and_then(|c| c.authority_id.clone()),
            update_time: model.updated.as_ref().map(|c| c.time),
        };
        registration.base.application_id = registration.device_id();
        registration
    }
}
