// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Device twin records and the twin store seam.
//!
//! A twin carries three property classes:
//!
//! - **tags**: service-owned, queryable attributes
//! - **desired**: service intent sent towards an edge agent
//! - **reported**: state observed and written back by the agent
//!
//! A twin patch only names the keys it changes. A `null` value removes the
//! key from the stored record.

pub mod memory;
pub mod query;
pub mod store;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub use memory::MemoryTwinStore;
pub use query::{FieldPath, Predicate, QuerySource, TwinQuery};
pub use store::{TwinPage, TwinStore};

/// A property bag keyed by property name.
pub type PropertyMap = BTreeMap<String, Value>;

/// Connection state string reported by the twin store for live devices.
pub const CONNECTION_STATE_CONNECTED: &str = "Connected";

// =============================================================================
// DeviceTwin
// =============================================================================

/// Desired and reported property sets of a twin.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TwinProperties {
    /// Service intent.
    pub desired: Option<PropertyMap>,
    /// Agent-observed state.
    pub reported: Option<PropertyMap>,
}

/// A device or module twin record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceTwin {
    /// Device identifier.
    pub id: String,
    /// Module identifier for module twins.
    pub module_id: Option<String>,
    /// Version token for optimistic concurrency.
    pub etag: Option<String>,
    /// Tags.
    pub tags: Option<PropertyMap>,
    /// Desired and reported properties.
    pub properties: Option<TwinProperties>,
    /// Connection state as seen by the twin store.
    pub connection_state: Option<String>,
}

impl DeviceTwin {
    /// Creates an empty twin patch for a device.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Returns a tag value, ignoring `null`.
    pub fn tag(&self, name: &str) -> Option<&Value> {
        self.tags
            .as_ref()
            .and_then(|t| t.get(name))
            .filter(|v| !v.is_null())
    }

    /// Returns a string tag.
    pub fn tag_str(&self, name: &str) -> Option<&str> {
        self.tag(name).and_then(Value::as_str)
    }

    /// Returns a boolean tag.
    pub fn tag_bool(&self, name: &str) -> Option<bool> {
        self.tag(name).and_then(Value::as_bool)
    }

    /// Returns the desired properties.
    pub fn desired(&self) -> Option<&PropertyMap> {
        self.properties.as_ref().and_then(|p| p.desired.as_ref())
    }

    /// Returns the reported properties.
    pub fn reported(&self) -> Option<&PropertyMap> {
        self.properties.as_ref().and_then(|p| p.reported.as_ref())
    }

    /// Returns `true` if the twin store reports the device as connected.
    pub fn is_connected(&self) -> bool {
        self.connection_state.as_deref() == Some(CONNECTION_STATE_CONNECTED)
    }

    /// Returns the consolidated property view (see [`merge`]).
    pub fn consolidated(&self) -> PropertyMap {
        merge(self.reported(), self.desired())
    }
}

// =============================================================================
// Truth precedence
// =============================================================================

/// Consolidates reported and desired properties.
///
/// Reported values win over desired ones. Keys that are only desired are kept
/// as the best known value. `null` entries count as absent.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use uareg_core::twin::{merge, PropertyMap};
///
/// let desired: PropertyMap = [("Mode".to_string(), json!("Sign")), ("Url".to_string(), json!("opc.tcp://a"))].into();
/// let reported: PropertyMap = [("Mode".to_string(), json!("None"))].into();
///
/// let merged = merge(Some(&reported), Some(&desired));
/// assert_eq!(merged["Mode"], json!("None"));
/// assert_eq!(merged["Url"], json!("opc.tcp://a"));
/// ```
pub fn merge(reported: Option<&PropertyMap>, desired: Option<&PropertyMap>) -> PropertyMap {
    let mut merged = PropertyMap::new();
    for source in [desired, reported].into_iter().flatten() {
        for (key, value) in source {
            if !value.is_null() {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}

/// Applies a patch map onto a stored map. `null` removes the key.
pub(crate) fn apply_patch(target: &mut PropertyMap, patch: &PropertyMap) {
    for (key, value) in patch {
        if value.is_null() {
            target.remove(key);
        } else {
            target.insert(key.clone(), value.clone());
        }
    }
}
