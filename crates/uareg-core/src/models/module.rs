// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Edge module models (supervisors, publishers and gateways).

use serde::{Deserialize, Serialize};

use crate::types::{IdentityType, TraceLogLevel};

/// An edge module or gateway registered in the twin store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeModuleModel {
    /// Identifier (`<device>_module_<module>` for modules, device id for gateways).
    pub id: String,
    /// Kind of module.
    pub kind: IdentityType,
    /// Site the module serves.
    pub site_id: Option<String>,
    /// Current log level.
    pub log_level: Option<TraceLogLevel>,
    /// Connection state reported by the twin store.
    pub connected: Option<bool>,
    /// Set when reported and desired state disagree.
    pub out_of_sync: Option<bool>,
    /// Module version.
    pub version: Option<String>,
}

/// Partial update of an edge module.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeModuleUpdateModel {
    /// New site id. An empty string clears it.
    pub site_id: Option<String>,
    /// New log level.
    pub log_level: Option<TraceLogLevel>,
}

/// Filter for edge module queries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeModuleQueryModel {
    /// Site id.
    pub site_id: Option<String>,
    /// Connection flag.
    pub connected: Option<bool>,
}

/// A page of edge modules.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeModuleListModel {
    /// Modules on this page.
    pub items: Vec<EdgeModuleModel>,
    /// Token for the next page, if any.
    pub continuation_token: Option<String>,
}
