// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Registration identifiers.
//!
//! Identifiers are derived from the fields that identify the real-world
//! entity, so the same server found twice maps to the same twin.
//!
//! ```text
//! application  uaa + sha256(site_or_gateway + lower(application_uri))[..40]
//! endpoint     uat + sha256(application_id + lower(url) + mode + policy)[..40]
//! supervisor   <device>_module_<module>
//! ```

use sha2::{Digest, Sha256};

use crate::types::SecurityMode;

const APPLICATION_PREFIX: &str = "uaa";
const ENDPOINT_PREFIX: &str = "uat";
const MODULE_SEPARATOR: &str = "_module_";
const HASH_LENGTH: usize = 40;

fn hashed(prefix: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    format!("{prefix}{}", &digest[..HASH_LENGTH])
}

/// Derives the application id.
///
/// Returns `None` when the application uri is missing or empty.
pub fn application_id(site_or_gateway_id: Option<&str>, application_uri: Option<&str>) -> Option<String> {
    let uri = application_uri.filter(|u| !u.is_empty())?;
    Some(hashed(
        APPLICATION_PREFIX,
        &[site_or_gateway_id.unwrap_or_default(), &uri.to_lowercase()],
    ))
}

/// Derives the endpoint id.
///
/// A missing security mode hashes as `Best` and a missing policy as empty, so
/// unset and default values produce the same id.
pub fn endpoint_id(
    application_id: &str,
    url: &str,
    security_mode: Option<SecurityMode>,
    security_policy: Option<&str>,
) -> String {
    hashed(
        ENDPOINT_PREFIX,
        &[
            application_id,
            &url.to_lowercase(),
            security_mode.unwrap_or_default().as_str(),
            security_policy.unwrap_or_default(),
        ],
    )
}

/// Builds a module identifier from device and module id.
pub fn module_identity(device_id: &str, module_id: Option<&str>) -> String {
    match module_id.filter(|m| !m.is_empty()) {
        Some(module_id) => format!("{device_id}{MODULE_SEPARATOR}{module_id}"),
        None => device_id.to_string(),
    }
}

/// Splits a module identifier into device and module id.
pub fn parse_module_identity(id: &str) -> (String, Option<String>) {
    match id.split_once(MODULE_SEPARATOR) {
        Some((device, module)) => (device.to_string(), Some(module.to_string())),
        None => (id.to_string(), None),
    }
}

/// Returns the lower-case hex sha256 thumbprint of a certificate.
pub fn thumbprint(certificate: &[u8]) -> String {
    hex::encode(Sha256::digest(certificate))
}
