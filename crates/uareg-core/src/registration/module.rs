// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Edge module registration (supervisor, publisher, gateway).

use super::{device_type, get, identity, tag, RegistrationBase, TwinPatch};
use super::{PROPERTY_SITE_ID, PROPERTY_VERSION};
use crate::error::{RegistryError, RegistryResult};
use crate::models::EdgeModuleModel;
use crate::twin::DeviceTwin;
use crate::types::{IdentityType, TraceLogLevel};

/// Log level desired property.
pub const LOG_LEVEL: &str = "LogLevel";

/// Returns the `DeviceType` tag value for a module kind.
pub fn kind_device_type(kind: IdentityType) -> &'static str {
    match kind {
        IdentityType::Supervisor => device_type::SUPERVISOR,
        IdentityType::Publisher => device_type::PUBLISHER,
        IdentityType::Gateway => device_type::GATEWAY,
        IdentityType::Application => device_type::APPLICATION,
        IdentityType::Endpoint => device_type::ENDPOINT,
    }
}

/// An edge module or gateway as persisted in the twin store.
#[derive(Debug, Clone)]
pub struct ModuleRegistration {
    /// Kind of module.
    pub kind: IdentityType,
    /// Shared registration fields.
    pub base: RegistrationBase,
    /// Module id, absent for gateways.
    pub module_id: Option<String>,
    /// Log level.
    pub log_level: Option<TraceLogLevel>,
    /// Reported version.
    pub version: Option<String>,
    in_sync: bool,
}

impl ModuleRegistration {
    /// Creates an empty registration for a module.
    pub fn new(kind: IdentityType, device_id: impl Into<String>, module_id: Option<String>) -> Self {
        Self {
            kind,
            base: RegistrationBase {
                device_id: Some(device_id.into()),
                ..Default::default()
            },
            module_id,
            log_level: None,
            version: None,
            in_sync: false,
        }
    }

    /// Returns the module identifier (`<device>_module_<module>`).
    pub fn id(&self) -> String {
        identity::module_identity(
            self.base.device_id.as_deref().unwrap_or_default(),
            self.module_id.as_deref(),
        )
    }

    /// Returns `true` if desired and reported state agree.
    #[inline]
    pub fn is_in_sync(&self) -> bool {
        self.in_sync
    }

    /// Builds the twin patch that turns `existing` into `update`.
    pub fn patch(existing: Option<&Self>, update: &Self) -> RegistryResult<DeviceTwin> {
        let mut patch = TwinPatch::default();
        let mut base = update.base.clone();
        base.site_id = None;
        RegistrationBase::patch(
            &mut patch,
            existing.map(|e| &e.base),
            &base,
            kind_device_type(update.kind),
        )?;
        if update.base.site_id != existing.and_then(|e| e.base.site_id.clone()) {
            let site = update.base.site_id.clone().filter(|s| !s.is_empty());
            patch.desired(PROPERTY_SITE_ID, &site)?;
            patch.tag(tag::SITE_ID, &site)?;
        }
        if update.log_level != existing.and_then(|e| e.log_level) {
            patch.desired(LOG_LEVEL, update.log_level)?;
        }
        let id = update
            .base
            .device_id
            .clone()
            .or_else(|| existing.and_then(|e| e.base.device_id.clone()))
            .ok_or_else(|| RegistryError::argument("deviceId", "Device id is required"))?;
        let module_id = update
            .module_id
            .clone()
            .or_else(|| existing.and_then(|e| e.module_id.clone()));
        Ok(patch.into_twin(id, module_id, existing.and_then(|e| e.base.etag.clone())))
    }

    /// Decodes a registration from a twin.
    ///
    /// Returns `None` if the twin is not a known module kind.
    pub fn from_twin(twin: &DeviceTwin, only_server_state: bool) -> Option<Self> {
        let kind = match super::twin_device_type(twin)? {
            device_type::SUPERVISOR => IdentityType::Supervisor,
            device_type::PUBLISHER => IdentityType::Publisher,
            device_type::GATEWAY => IdentityType::Gateway,
            _ => return None,
        };
        let desired = twin.desired();
        let consolidated = twin.consolidated();
        let view = if only_server_state {
            desired
        } else {
            Some(&consolidated)
        };
        let mut base = RegistrationBase::from_twin(twin);
        base.site_id = get(view, PROPERTY_SITE_ID).or(base.site_id);
        let log_level: Option<TraceLogLevel> = get(view, LOG_LEVEL);
        let in_sync = get::<TraceLogLevel>(desired, LOG_LEVEL) == get(Some(&consolidated), LOG_LEVEL)
            && get::<String>(desired, PROPERTY_SITE_ID)
                == get(Some(&consolidated), PROPERTY_SITE_ID);
        Some(Self {
            kind,
            base,
            module_id: twin.module_id.clone(),
            log_level,
            version: get(twin.reported(), PROPERTY_VERSION),
            in_sync,
        })
    }

    /// Converts into the service model.
    pub fn to_service_model(&self) -> EdgeModuleModel {
        EdgeModuleModel {
            id: self.id(),
            kind: self.kind,
            site_id: self.base.site_id.clone(),
            log_level: self.log_level,
            connected: self.base.connected.then_some(true),
            out_of_sync: (self.base.connected && !self.in_sync).then_some(true),
            version: self.version.clone(),
        }
    }
}
