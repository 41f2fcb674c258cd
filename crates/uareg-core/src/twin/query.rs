// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Twin query builder.
//!
//! Queries are built as a predicate tree so they can be both rendered into the
//! store's SQL-like language and evaluated in-process by the memory store.
//!
//! ```text
//! SELECT * FROM devices WHERE tags.DeviceType = 'Endpoint'
//!     AND tags.ApplicationId = 'uaa...' AND NOT IS_DEFINED(tags.NotSeenSince)
//! ```

use serde_json::Value;
use std::fmt;

use super::DeviceTwin;

/// Collection a query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuerySource {
    /// Device twins.
    Devices,
    /// Module twins.
    Modules,
}

/// A field reference inside a twin.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldPath {
    /// `tags.<path>`
    Tag(String),
    /// `properties.desired.<path>`
    Desired(String),
    /// `properties.reported.<path>`
    Reported(String),
    /// `connectionState`
    ConnectionState,
}

impl FieldPath {
    fn resolve<'a>(&self, twin: &'a DeviceTwin) -> Option<Value> {
        let (root, path) = match self {
            Self::Tag(p) => (twin.tags.as_ref(), p),
            Self::Desired(p) => (twin.desired(), p),
            Self::Reported(p) => (twin.reported(), p),
            Self::ConnectionState => {
                return twin.connection_state.clone().map(Value::String);
            }
        };
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current: &'a Value = root?.get(first)?;
        for segment in segments {
            current = current.get(segment)?;
        }
        if current.is_null() {
            None
        } else {
            Some(current.clone())
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(p) => write!(f, "tags.{p}"),
            Self::Desired(p) => write!(f, "properties.desired.{p}"),
            Self::Reported(p) => write!(f, "properties.reported.{p}"),
            Self::ConnectionState => write!(f, "connectionState"),
        }
    }
}

/// A filter predicate over twins.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Field equals value.
    Eq(FieldPath, Value),
    /// Field is present and not `null`.
    IsDefined(FieldPath),
    /// Negation.
    Not(Box<Predicate>),
    /// Conjunction.
    And(Vec<Predicate>),
    /// Disjunction.
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Evaluates the predicate against a twin.
    pub fn matches(&self, twin: &DeviceTwin) -> bool {
        match self {
            Self::Eq(path, value) => path.resolve(twin).as_ref() == Some(value),
            Self::IsDefined(path) => path.resolve(twin).is_some(),
            Self::Not(inner) => !inner.matches(twin),
            Self::And(all) => all.iter().all(|p| p.matches(twin)),
            Self::Or(any) => any.iter().any(|p| p.matches(twin)),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq(path, value) => write!(f, "{path} = {}", literal(value)),
            Self::IsDefined(path) => write!(f, "IS_DEFINED({path})"),
            Self::Not(inner) => write!(f, "NOT {inner}"),
            Self::And(all) => join(f, all, " AND "),
            Self::Or(any) => {
                write!(f, "(")?;
                join(f, any, " OR ")?;
                write!(f, ")")
            }
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, items: &[Predicate], separator: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => other.to_string(),
    }
}

// =============================================================================
// TwinQuery
// =============================================================================

/// A query over the twin store. Conditions are combined with `AND`.
#[derive(Debug, Clone, PartialEq)]
pub struct TwinQuery {
    source: QuerySource,
    conditions: Vec<Predicate>,
}

impl TwinQuery {
    /// Starts a query over device twins.
    pub fn devices() -> Self {
        Self {
            source: QuerySource::Devices,
            conditions: Vec::new(),
        }
    }

    /// Starts a query over module twins.
    pub fn modules() -> Self {
        Self {
            source: QuerySource::Modules,
            conditions: Vec::new(),
        }
    }

    /// Returns the collection the query runs against.
    pub fn source(&self) -> QuerySource {
        self.source
    }

    /// Adds an arbitrary condition.
    pub fn and(mut self, predicate: Predicate) -> Self {
        self.conditions.push(predicate);
        self
    }

    /// Adds `tags.<name> = value`.
    pub fn tag_eq(self, name: &str, value: impl Into<Value>) -> Self {
        self.and(Predicate::Eq(FieldPath::Tag(name.to_string()), value.into()))
    }

    /// Adds `tags.<name> = value` when a value is given.
    pub fn tag_eq_opt<V: Into<Value>>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.tag_eq(name, v),
            None => self,
        }
    }

    /// Adds `properties.desired.<name> = value`.
    pub fn desired_eq(self, name: &str, value: impl Into<Value>) -> Self {
        self.and(Predicate::Eq(FieldPath::Desired(name.to_string()), value.into()))
    }

    /// Adds `properties.reported.<name> = value`.
    pub fn reported_eq(self, name: &str, value: impl Into<Value>) -> Self {
        self.and(Predicate::Eq(FieldPath::Reported(name.to_string()), value.into()))
    }

    /// Adds `NOT IS_DEFINED(tags.<name>)`.
    pub fn tag_not_defined(self, name: &str) -> Self {
        self.and(Predicate::Not(Box::new(Predicate::IsDefined(FieldPath::Tag(
            name.to_string(),
        )))))
    }

    /// Adds a connection state condition.
    pub fn connected(self, connected: bool) -> Self {
        let predicate = Predicate::Eq(
            FieldPath::ConnectionState,
            Value::String(super::CONNECTION_STATE_CONNECTED.to_string()),
        );
        if connected {
            self.and(predicate)
        } else {
            self.and(Predicate::Not(Box::new(predicate)))
        }
    }

    /// Evaluates the query against a twin, including the source collection.
    pub fn matches(&self, twin: &DeviceTwin) -> bool {
        let source_ok = match self.source {
            QuerySource::Devices => twin.module_id.is_none(),
            QuerySource::Modules => twin.module_id.is_some(),
        };
        source_ok && self.conditions.iter().all(|c| c.matches(twin))
    }

    /// Renders the query in the store's SQL-like language.
    pub fn to_sql(&self) -> String {
        let from = match self.source {
            QuerySource::Devices => "devices",
            QuerySource::Modules => "devices.modules",
        };
        if self.conditions.is_empty() {
            format!("SELECT * FROM {from}")
        } else {
            format!(
                "SELECT * FROM {from} WHERE {}",
                Predicate::And(self.conditions.clone())
            )
        }
    }
}

impl fmt::Display for TwinQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::twin::{PropertyMap, TwinProperties};
    use serde_json::json;

    fn endpoint_twin() -> DeviceTwin {
        let tags: PropertyMap = [
            ("DeviceType".to_string(), json!("Endpoint")),
            ("ApplicationId".to_string(), json!("uaa1")),
            ("Capabilities".to_string(), json!({"DA": true})),
        ]
        .into();
        let desired: PropertyMap = [("SecurityMode".to_string(), json!("Sign"))].into();
        DeviceTwin {
            id: "uat1".into(),
            tags: Some(tags),
            properties: Some(TwinProperties {
                desired: Some(desired),
                reported: None,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_to_sql() {
        let query = TwinQuery::devices()
            .tag_eq("DeviceType", "Endpoint")
            .tag_eq("ApplicationId", "o'brien")
            .desired_eq("SecurityMode", "Sign")
            .tag_not_defined("NotSeenSince");
        assert_eq!(
            query.to_sql(),
            "SELECT * FROM devices WHERE tags.DeviceType = 'Endpoint' AND \
             tags.ApplicationId = 'o''brien' AND properties.desired.SecurityMode = 'Sign' \
             AND NOT IS_DEFINED(tags.NotSeenSince)"
        );
    }

    #[test]
    fn test_or_group_rendering() {
        let query = TwinQuery::devices().and(Predicate::Or(vec![
            Predicate::Eq(FieldPath::Tag("SiteId".into()), json!("s")),
            Predicate::Eq(FieldPath::Tag("DiscovererId".into()), json!("d")),
        ]));
        assert_eq!(
            query.to_sql(),
            "SELECT * FROM devices WHERE (tags.SiteId = 's' OR tags.DiscovererId = 'd')"
        );
    }

    #[test]
    fn test_matches() {
        let twin = endpoint_twin();
        assert!(TwinQuery::devices()
            .tag_eq("DeviceType", "Endpoint")
            .desired_eq("SecurityMode", "Sign")
            .tag_not_defined("NotSeenSince")
            .matches(&twin));
        assert!(TwinQuery::devices().tag_eq("Capabilities.DA", true).matches(&twin));
        assert!(!TwinQuery::devices().tag_eq("ApplicationId", "uaa2").matches(&twin));
        assert!(!TwinQuery::modules().matches(&twin));
        assert!(!TwinQuery::devices().connected(true).matches(&twin));
        assert!(TwinQuery::devices().connected(false).matches(&twin));
    }
}
