// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Registration codec.
//!
//! Maps service models to twin records and back. Each registration type
//! offers two distinct comparisons:
//!
//! - `logical_key` / `logical_equals`: identity only, used to diff found and
//!   existing sets during reconciliation
//! - `full_equals`: every persisted field, used to decide whether a patch is
//!   needed
//!
//! A patch only carries the keys whose value changed; `null` removes a key.

pub mod application;
pub mod endpoint;
pub mod identity;
pub mod module;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use crate::error::RegistryResult;
use crate::twin::{DeviceTwin, PropertyMap, TwinProperties};

pub use application::{ApplicationLogicalKey, ApplicationRegistration};
pub use endpoint::{EndpointLogicalKey, EndpointRegistration};
pub use module::ModuleRegistration;

/// Twin tag names.
pub mod tag {
    /// Registration kind.
    pub const DEVICE_TYPE: &str = "DeviceType";
    /// Disabled flag.
    pub const IS_DISABLED: &str = "IsDisabled";
    /// Time the registration was disabled.
    pub const NOT_SEEN_SINCE: &str = "NotSeenSince";
    /// Site id.
    pub const SITE_ID: &str = "SiteId";
    /// Site id or, without site, the discoverer/gateway id.
    pub const SITE_OR_GATEWAY_ID: &str = "SiteOrGatewayId";
    /// Managing supervisor.
    pub const SUPERVISOR_ID: &str = "SupervisorId";
    /// Reporting discoverer.
    pub const DISCOVERER_ID: &str = "DiscovererId";
    /// Owning application.
    pub const APPLICATION_ID: &str = "ApplicationId";
    /// Certificate (hex).
    pub const CERTIFICATE: &str = "Certificate";
    /// Certificate thumbprint.
    pub const THUMBPRINT: &str = "Thumbprint";
}

/// Registration kinds persisted in the `DeviceType` tag.
pub mod device_type {
    /// Application twin.
    pub const APPLICATION: &str = "Application";
    /// Endpoint twin.
    pub const ENDPOINT: &str = "Endpoint";
    /// Supervisor module twin.
    pub const SUPERVISOR: &str = "Supervisor";
    /// Publisher module twin.
    pub const PUBLISHER: &str = "Publisher";
    /// Gateway device twin.
    pub const GATEWAY: &str = "Gateway";
}

/// Desired property holding the site of an edge module.
pub const PROPERTY_SITE_ID: &str = "__siteId__";

/// Reported property holding the version of an edge module.
pub const PROPERTY_VERSION: &str = "__version__";

// =============================================================================
// RegistrationBase
// =============================================================================

/// Fields shared by every registration kind.
#[derive(Debug, Clone, Default)]
pub struct RegistrationBase {
    /// Twin device id.
    pub device_id: Option<String>,
    /// Twin etag.
    pub etag: Option<String>,
    /// Disabled flag.
    pub is_disabled: Option<bool>,
    /// Time the registration was disabled.
    pub not_seen_since: Option<DateTime<Utc>>,
    /// Site id.
    pub site_id: Option<String>,
    /// Managing supervisor.
    pub supervisor_id: Option<String>,
    /// Reporting discoverer.
    pub discoverer_id: Option<String>,
    /// Owning application.
    pub application_id: Option<String>,
    /// Certificate.
    pub certificate: Option<Vec<u8>>,
    /// Certificate thumbprint.
    pub thumbprint: Option<String>,
    /// Twin connection state.
    pub connected: bool,
}

impl RegistrationBase {
    /// Returns `true` if the registration is disabled.
    #[inline]
    pub fn disabled(&self) -> bool {
        self.is_disabled.unwrap_or(false)
    }

    /// Returns the site id or, without site, the discoverer id.
    pub fn site_or_gateway_id(&self) -> Option<&str> {
        self.site_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.discoverer_id.as_deref())
    }

    /// Reads the shared tags of a twin.
    pub fn from_twin(twin: &DeviceTwin) -> Self {
        let tags = twin.tags.as_ref();
        Self {
            device_id: Some(twin.id.clone()),
            etag: twin.etag.clone(),
            is_disabled: get(tags, tag::IS_DISABLED),
            not_seen_since: get(tags, tag::NOT_SEEN_SINCE),
            site_id: get(tags, tag::SITE_ID),
            supervisor_id: get(tags, tag::SUPERVISOR_ID),
            discoverer_id: get(tags, tag::DISCOVERER_ID),
            application_id: get(tags, tag::APPLICATION_ID),
            certificate: get::<String>(tags, tag::CERTIFICATE).and_then(|c| hex::decode(c).ok()),
            thumbprint: get(tags, tag::THUMBPRINT),
            connected: twin.is_connected(),
        }
    }

    /// Writes the changed shared tags into a patch.
    ///
    /// Disabling always stamps `NotSeenSince`, enabling always clears it.
    pub fn patch(
        patch: &mut TwinPatch,
        existing: Option<&Self>,
        update: &Self,
        device_type: &str,
    ) -> RegistryResult<()> {
        if let Some(disabled) = update.is_disabled {
            if disabled != existing.map(Self::disabled).unwrap_or(false) || existing.is_none() {
                patch.tag(tag::IS_DISABLED, disabled.then_some(true))?;
                patch.tag(
                    tag::NOT_SEEN_SINCE,
                    if disabled {
                        Some(update.not_seen_since.unwrap_or_else(Utc::now))
                    } else {
                        None
                    },
                )?;
            }
        }
        let site_or_gateway = update.site_or_gateway_id();
        if site_or_gateway != existing.and_then(Self::site_or_gateway_id) {
            patch.tag(tag::SITE_OR_GATEWAY_ID, site_or_gateway)?;
        }
        if update.site_id.is_some() && update.site_id != existing.and_then(|e| e.site_id.clone()) {
            patch.tag(tag::SITE_ID, &update.site_id)?;
        }
        if update.supervisor_id != existing.and_then(|e| e.supervisor_id.clone()) {
            patch.tag(tag::SUPERVISOR_ID, &update.supervisor_id)?;
        }
        if update.discoverer_id != existing.and_then(|e| e.discoverer_id.clone()) {
            patch.tag(tag::DISCOVERER_ID, &update.discoverer_id)?;
        }
        if update.application_id.is_some()
            && update.application_id != existing.and_then(|e| e.application_id.clone())
        {
            patch.tag(tag::APPLICATION_ID, &update.application_id)?;
        }
        if update.certificate.is_some()
            && update.certificate != existing.and_then(|e| e.certificate.clone())
        {
            let certificate = update.certificate.as_deref();
            patch.tag(tag::CERTIFICATE, certificate.map(hex::encode))?;
            patch.tag(tag::THUMBPRINT, certificate.map(identity::thumbprint))?;
        }
        patch.tag(tag::DEVICE_TYPE, device_type)?;
        Ok(())
    }

    /// Compares the shared persisted fields.
    pub fn full_equals(&self, other: &Self) -> bool {
        self.disabled() == other.disabled()
            && self.site_id == other.site_id
            && self.supervisor_id == other.supervisor_id
            && self.discoverer_id == other.discoverer_id
            && self.application_id == other.application_id
            && self.certificate == other.certificate
    }
}

// =============================================================================
// TwinPatch
// =============================================================================

/// Accumulates the changed keys of a twin patch.
#[derive(Debug, Default)]
pub struct TwinPatch {
    /// Changed tags.
    pub tags: PropertyMap,
    /// Changed desired properties.
    pub desired: PropertyMap,
}

impl TwinPatch {
    /// Sets a tag. `None` serializes to `null` and removes the tag.
    pub fn tag(&mut self, name: &str, value: impl Serialize) -> RegistryResult<()> {
        self.tags.insert(name.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Sets a desired property. `None` removes it.
    pub fn desired(&mut self, name: &str, value: impl Serialize) -> RegistryResult<()> {
        self.desired.insert(name.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Builds the twin patch.
    pub fn into_twin(self, id: String, module_id: Option<String>, etag: Option<String>) -> DeviceTwin {
        DeviceTwin {
            id,
            module_id,
            etag,
            tags: Some(self.tags),
            properties: Some(TwinProperties {
                desired: Some(self.desired),
                reported: None,
            }),
            connection_state: None,
        }
    }
}

/// Reads and decodes a value from a property map, ignoring `null` and
/// undecodable entries.
pub fn get<T: DeserializeOwned>(map: Option<&PropertyMap>, name: &str) -> Option<T> {
    map.and_then(|m| m.get(name))
        .filter(|v| !v.is_null())
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// Returns the device type tag of a twin.
pub fn twin_device_type(twin: &DeviceTwin) -> Option<&str> {
    twin.tag_str(tag::DEVICE_TYPE)
}
