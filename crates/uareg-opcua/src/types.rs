// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client types.
//!
//! This module provides the value types exchanged with the protocol stack:
//!
//! - **NodeId**: The four OPC UA node identifier forms with parsing
//! - **UaValue / DataValue**: Variant values and read results
//! - **EndpointDescription**: Endpoints advertised by `GetEndpoints`
//! - **UserIdentity / ServerEndpoint**: Connection target and credential
//! - **Service models**: Browse, read, write and call requests and results
//! - **ClientSettings**: Stack level settings for the client facade
//!
//! # Examples
//!
//! ```
//! use uareg_opcua::types::{NodeId, ServerEndpoint, UserIdentity};
//!
//! let node: NodeId = "ns=2;s=Line1.Temperature".parse().unwrap();
//! assert_eq!(node.namespace_index, 2);
//!
//! let endpoint = ServerEndpoint::new("opc.tcp://plc:4840")
//!     .with_identity(UserIdentity::user_name("operator", "secret"))
//!     .trusted(true);
//! assert_eq!(endpoint.identity.user(), Some("operator"));
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uareg_core::models::{CredentialModel, EndpointModel};
use uareg_core::types::{CredentialType, SecurityMode};
use uuid::Uuid;

use crate::error::{status, OpcUaError, OpcUaResult};

/// Transport profile of the binary UA-TCP mapping.
pub const UA_TCP_TRANSPORT_PROFILE: &str =
    "http://opcfoundation.org/UA-Profile/Transport/uatcp-uasc-uabinary";

// =============================================================================
// NodeId
// =============================================================================

/// OPC UA node identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Namespace index (0 = OPC UA standard namespace).
    pub namespace_index: u16,

    /// The node identifier.
    pub identifier: NodeIdentifier,
}

impl NodeId {
    /// Creates a numeric node ID.
    #[inline]
    pub fn numeric(namespace_index: u16, value: u32) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Numeric(value),
        }
    }

    /// Creates a string node ID.
    #[inline]
    pub fn string(namespace_index: u16, value: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::String(value.into()),
        }
    }

    /// Creates a GUID node ID.
    #[inline]
    pub fn guid(namespace_index: u16, value: Uuid) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Guid(value),
        }
    }

    /// Creates an opaque node ID.
    #[inline]
    pub fn opaque(namespace_index: u16, value: Vec<u8>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Opaque(value),
        }
    }

    /// The root folder (`i=84`), the default browse start.
    #[inline]
    pub fn root_folder() -> Self {
        Self::numeric(0, 84)
    }

    /// The objects folder (`i=85`).
    #[inline]
    pub fn objects_folder() -> Self {
        Self::numeric(0, 85)
    }

    /// Returns `true` if this is the null node ID (ns=0, i=0).
    #[inline]
    pub fn is_null(&self) -> bool {
        self.namespace_index == 0 && matches!(self.identifier, NodeIdentifier::Numeric(0))
    }

    /// Formats as `ns=<namespace>;{i|s|g|b}=<identifier>`.
    ///
    /// The namespace prefix is omitted for namespace 0.
    pub fn to_opc_string(&self) -> String {
        if self.namespace_index == 0 {
            self.identifier.to_string()
        } else {
            format!("ns={};{}", self.namespace_index, self.identifier)
        }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::numeric(0, 0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_opc_string())
    }
}

impl FromStr for NodeId {
    type Err = OpcUaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |reason: &str| OpcUaError::argument("node_id", format!("'{}': {}", s, reason));

        let (namespace_index, identifier_part) = match s.strip_prefix("ns=") {
            Some(rest) => {
                let (ns, identifier) = rest
                    .split_once(';')
                    .ok_or_else(|| invalid("missing identifier after namespace"))?;
                let ns: u16 = ns.parse().map_err(|_| invalid("invalid namespace index"))?;
                (ns, identifier)
            }
            None => (0, s),
        };

        let identifier = if let Some(id) = identifier_part.strip_prefix("i=") {
            NodeIdentifier::Numeric(id.parse().map_err(|_| invalid("invalid numeric identifier"))?)
        } else if let Some(id) = identifier_part.strip_prefix("s=") {
            NodeIdentifier::String(id.to_string())
        } else if let Some(id) = identifier_part.strip_prefix("g=") {
            NodeIdentifier::Guid(Uuid::parse_str(id).map_err(|_| invalid("invalid guid"))?)
        } else if let Some(id) = identifier_part.strip_prefix("b=") {
            NodeIdentifier::Opaque(BASE64.decode(id).map_err(|_| invalid("invalid base64"))?)
        } else {
            return Err(invalid("expected i=, s=, g= or b="));
        };

        Ok(Self {
            namespace_index,
            identifier,
        })
    }
}

/// Identifier part of a [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum NodeIdentifier {
    /// Numeric identifier.
    Numeric(u32),
    /// String identifier.
    String(String),
    /// GUID identifier.
    Guid(Uuid),
    /// Opaque identifier.
    Opaque(Vec<u8>),
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "i={}", v),
            Self::String(v) => write!(f, "s={}", v),
            Self::Guid(v) => write!(f, "g={}", v),
            Self::Opaque(v) => write!(f, "b={}", BASE64.encode(v)),
        }
    }
}

// =============================================================================
// Browse Enumerations
// =============================================================================

/// Browse direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BrowseDirection {
    /// Forward references.
    #[default]
    Forward,
    /// Inverse references.
    Inverse,
    /// Both directions.
    Both,
}

/// Node class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    /// Object node.
    Object,
    /// Variable node.
    Variable,
    /// Method node.
    Method,
    /// Object type node.
    ObjectType,
    /// Variable type node.
    VariableType,
    /// Reference type node.
    ReferenceType,
    /// Data type node.
    DataType,
    /// View node.
    View,
}

impl NodeClass {
    /// Returns the node class bit.
    pub const fn value(&self) -> u32 {
        match self {
            Self::Object => 1,
            Self::Variable => 2,
            Self::Method => 4,
            Self::ObjectType => 8,
            Self::VariableType => 16,
            Self::ReferenceType => 32,
            Self::DataType => 64,
            Self::View => 128,
        }
    }

    /// Creates from the node class bit.
    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Object),
            2 => Some(Self::Variable),
            4 => Some(Self::Method),
            8 => Some(Self::ObjectType),
            16 => Some(Self::VariableType),
            32 => Some(Self::ReferenceType),
            64 => Some(Self::DataType),
            128 => Some(Self::View),
            _ => None,
        }
    }
}

/// Node attributes the node services read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttributeId {
    /// Node class.
    NodeClass,
    /// Browse name.
    BrowseName,
    /// Display name.
    DisplayName,
    /// Description.
    Description,
    /// Value.
    #[default]
    Value,
    /// Data type.
    DataType,
    /// Value rank.
    ValueRank,
    /// Access level.
    AccessLevel,
    /// User access level.
    UserAccessLevel,
    /// Executable flag of a method.
    Executable,
}

impl AttributeId {
    /// Returns the numeric attribute id.
    pub const fn value(&self) -> u32 {
        match self {
            Self::NodeClass => 2,
            Self::BrowseName => 3,
            Self::DisplayName => 4,
            Self::Description => 5,
            Self::Value => 13,
            Self::DataType => 14,
            Self::ValueRank => 15,
            Self::AccessLevel => 17,
            Self::UserAccessLevel => 18,
            Self::Executable => 21,
        }
    }
}

// =============================================================================
// UaValue
// =============================================================================

/// Variant value exchanged with a server.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum UaValue {
    /// Boolean value.
    Boolean(bool),
    /// Signed byte.
    SByte(i8),
    /// Unsigned byte.
    Byte(u8),
    /// 16-bit signed integer.
    Int16(i16),
    /// 16-bit unsigned integer.
    UInt16(u16),
    /// 32-bit signed integer.
    Int32(i32),
    /// 32-bit unsigned integer.
    UInt32(u32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit unsigned integer.
    UInt64(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit double.
    Double(f64),
    /// String value.
    String(String),
    /// Date/time value.
    DateTime(DateTime<Utc>),
    /// GUID value.
    Guid(Uuid),
    /// Byte string.
    ByteString(Vec<u8>),
    /// Node id value.
    NodeId(NodeId),
    /// Array of values.
    Array(Vec<UaValue>),
    /// Null value.
    #[default]
    Null,
}

impl UaValue {
    /// Returns `true` if this is a null value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Attempts to get the value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => self.as_i64().map(|v| v != 0),
        }
    }

    /// Attempts to get the value as an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::SByte(v) => Some(*v as i64),
            Self::Byte(v) => Some(*v as i64),
            Self::Int16(v) => Some(*v as i64),
            Self::UInt16(v) => Some(*v as i64),
            Self::Int32(v) => Some(*v as i64),
            Self::UInt32(v) => Some(*v as i64),
            Self::Int64(v) => Some(*v),
            Self::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Attempts to get the value as an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            Self::UInt64(v) => Some(*v as f64),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    /// Attempts to get the value as a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Converts to a JSON value for service responses.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            Self::Boolean(v) => Value::Bool(*v),
            Self::SByte(v) => Value::from(*v),
            Self::Byte(v) => Value::from(*v),
            Self::Int16(v) => Value::from(*v),
            Self::UInt16(v) => Value::from(*v),
            Self::Int32(v) => Value::from(*v),
            Self::UInt32(v) => Value::from(*v),
            Self::Int64(v) => Value::from(*v),
            Self::UInt64(v) => Value::from(*v),
            Self::Float(v) => Value::from(*v as f64),
            Self::Double(v) => Value::from(*v),
            Self::String(v) => Value::String(v.clone()),
            Self::DateTime(v) => Value::String(v.to_rfc3339()),
            Self::Guid(v) => Value::String(v.to_string()),
            Self::ByteString(v) => Value::String(BASE64.encode(v)),
            Self::NodeId(v) => Value::String(v.to_opc_string()),
            Self::Array(v) => Value::Array(v.iter().map(UaValue::to_json).collect()),
            Self::Null => Value::Null,
        }
    }

    /// Converts a JSON value into the closest variant.
    ///
    /// Integers become `Int64`, other numbers `Double`. Objects are rejected.
    pub fn from_json(value: &serde_json::Value) -> OpcUaResult<Self> {
        use serde_json::Value;

        Ok(match value {
            Value::Null => Self::Null,
            Value::Bool(v) => Self::Boolean(*v),
            Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
                (Some(v), _, _) => Self::Int64(v),
                (None, Some(v), _) => Self::UInt64(v),
                (_, _, Some(v)) => Self::Double(v),
                _ => return Err(OpcUaError::argument("value", "unrepresentable number")),
            },
            Value::String(v) => Self::String(v.clone()),
            Value::Array(items) => Self::Array(
                items
                    .iter()
                    .map(UaValue::from_json)
                    .collect::<OpcUaResult<Vec<_>>>()?,
            ),
            Value::Object(_) => {
                return Err(OpcUaError::argument(
                    "value",
                    "structured values are not supported",
                ))
            }
        })
    }
}

impl fmt::Display for UaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByteString(v) => write!(f, "<{} bytes>", v.len()),
            Self::Array(v) => write!(f, "[{} items]", v.len()),
            Self::Null => write!(f, "null"),
            Self::String(v) => write!(f, "{}", v),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

/// Value read from a node attribute.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataValue {
    /// The value.
    pub value: UaValue,
    /// Status code of the value.
    pub status_code: u32,
    /// Source timestamp.
    pub source_timestamp: Option<DateTime<Utc>>,
    /// Server timestamp.
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl DataValue {
    /// Creates a good value.
    pub fn good(value: UaValue) -> Self {
        Self {
            value,
            status_code: status::GOOD,
            source_timestamp: None,
            server_timestamp: Some(Utc::now()),
        }
    }

    /// Creates a bad value.
    pub fn bad(status_code: u32) -> Self {
        Self {
            status_code,
            ..Default::default()
        }
    }

    /// Returns `true` if the status code is good.
    #[inline]
    pub fn is_good(&self) -> bool {
        status::is_good(self.status_code)
    }
}

// =============================================================================
// Endpoint Discovery
// =============================================================================

/// Endpoint advertised by a server's discovery service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointDescription {
    /// Url of the endpoint.
    pub endpoint_url: String,
    /// Application uri of the server.
    pub server_application_uri: String,
    /// Discovery urls of the server.
    pub discovery_urls: Vec<String>,
    /// Message security mode.
    pub security_mode: SecurityMode,
    /// Security policy uri.
    pub security_policy_uri: String,
    /// Relative security level assigned by the server.
    pub security_level: u8,
    /// Transport profile uri.
    pub transport_profile_uri: String,
    /// Server certificate (DER).
    pub server_certificate: Option<Vec<u8>>,
    /// User token types the endpoint accepts.
    pub user_token_types: Vec<CredentialType>,
}

impl EndpointDescription {
    /// Returns `true` for UA-TCP binary endpoints.
    #[inline]
    pub fn is_ua_tcp(&self) -> bool {
        self.transport_profile_uri == UA_TCP_TRANSPORT_PROFILE
    }
}

// =============================================================================
// Connection Target
// =============================================================================

/// User identity presented when activating a session.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub enum UserIdentity {
    /// Anonymous identity.
    #[default]
    Anonymous,
    /// User name and password.
    UserName {
        /// User name.
        user: String,
        /// Password.
        password: String,
    },
    /// X.509 identity certificate.
    X509 {
        /// Path to the certificate (DER).
        certificate_path: PathBuf,
        /// Path to the private key (PEM).
        private_key_path: PathBuf,
    },
}

impl UserIdentity {
    /// Creates a user name identity.
    pub fn user_name(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UserName {
            user: user.into(),
            password: password.into(),
        }
    }

    /// Returns the credential type of the identity.
    pub fn credential_type(&self) -> CredentialType {
        match self {
            Self::Anonymous => CredentialType::None,
            Self::UserName { .. } => CredentialType::UserName,
            Self::X509 { .. } => CredentialType::X509Certificate,
        }
    }

    /// Returns the user name, if any.
    pub fn user(&self) -> Option<&str> {
        match self {
            Self::UserName { user, .. } => Some(user),
            _ => None,
        }
    }

    /// Builds an identity from a registry credential.
    ///
    /// User name credentials carry `{"user": .., "password": ..}`; X.509
    /// credentials carry `{"certificate": <path>, "privateKey": <path>}`.
    pub fn from_credential(credential: &CredentialModel) -> OpcUaResult<Self> {
        let field = |name: &str| {
            credential
                .value
                .as_ref()
                .and_then(|value| value.get(name))
                .and_then(|value| value.as_str())
                .map(str::to_string)
        };
        match credential.effective_type() {
            CredentialType::None => Ok(Self::Anonymous),
            CredentialType::UserName => {
                let user = field("user")
                    .ok_or_else(|| OpcUaError::argument("credential", "missing user name"))?;
                Ok(Self::UserName {
                    user,
                    password: field("password").unwrap_or_default(),
                })
            }
            CredentialType::X509Certificate => {
                let certificate = field("certificate")
                    .ok_or_else(|| OpcUaError::argument("credential", "missing certificate"))?;
                let key = field("privateKey")
                    .ok_or_else(|| OpcUaError::argument("credential", "missing private key"))?;
                Ok(Self::X509 {
                    certificate_path: certificate.into(),
                    private_key_path: key.into(),
                })
            }
            CredentialType::JwtToken => Err(OpcUaError::argument(
                "credential",
                "issued token identities are not supported",
            )),
        }
    }
}

impl fmt::Debug for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => write!(f, "Anonymous"),
            Self::UserName { user, .. } => f
                .debug_struct("UserName")
                .field("user", user)
                .field("password", &"***")
                .finish(),
            Self::X509 {
                certificate_path, ..
            } => f
                .debug_struct("X509")
                .field("certificate_path", certificate_path)
                .finish_non_exhaustive(),
        }
    }
}

/// Target of a client call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ServerEndpoint {
    /// Discovery url of the server.
    pub url: String,
    /// Identity to present.
    pub identity: UserIdentity,
    /// Accept an untrusted server certificate.
    pub is_trusted: Option<bool>,
    /// Expected server certificate thumbprint.
    pub server_thumbprint: Option<Vec<u8>>,
    /// Client certificate to present.
    pub client_certificate: Option<Vec<u8>>,
    /// Edge controller that proxies the connection.
    pub edge_controller: Option<String>,
}

impl ServerEndpoint {
    /// Creates an anonymous target.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the identity.
    pub fn with_identity(mut self, identity: UserIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Sets the trust flag.
    pub fn trusted(mut self, trusted: bool) -> Self {
        self.is_trusted = Some(trusted);
        self
    }

    /// Routes the connection through an edge controller.
    pub fn via_edge(mut self, edge_controller: impl Into<String>) -> Self {
        self.edge_controller = Some(edge_controller.into());
        self
    }

    /// Returns `true` if an untrusted server certificate may be accepted.
    #[inline]
    pub fn accepts_untrusted(&self) -> bool {
        self.is_trusted.unwrap_or(false)
    }

    /// Builds a target from a registered endpoint.
    pub fn from_endpoint_model(endpoint: &EndpointModel) -> OpcUaResult<Self> {
        let identity = match &endpoint.user {
            Some(credential) => UserIdentity::from_credential(credential)?,
            None => UserIdentity::Anonymous,
        };
        Ok(Self {
            url: endpoint.url.clone(),
            identity,
            is_trusted: None,
            server_thumbprint: endpoint.server_thumbprint.clone(),
            client_certificate: endpoint.client_certificate.clone(),
            edge_controller: None,
        })
    }
}

// =============================================================================
// Service Models
// =============================================================================

/// Browse request for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowseRequest {
    /// Node to browse.
    pub node_id: NodeId,
    /// Direction of references.
    pub direction: BrowseDirection,
    /// Node class mask, 0 for all classes.
    pub node_class_mask: u32,
    /// Maximum references to return, 0 for server default.
    pub max_references: u32,
}

impl BrowseRequest {
    /// Browses forward hierarchical references of a node.
    pub fn forward(node_id: NodeId) -> Self {
        Self {
            node_id,
            direction: BrowseDirection::Forward,
            node_class_mask: 0,
            max_references: 0,
        }
    }
}

/// Reference returned by a browse.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceDescription {
    /// Reference type.
    pub reference_type_id: NodeId,
    /// `true` for a forward reference.
    pub is_forward: bool,
    /// Target node.
    pub node_id: NodeId,
    /// Browse name of the target.
    pub browse_name: String,
    /// Display name of the target.
    pub display_name: String,
    /// Node class of the target.
    pub node_class: Option<NodeClass>,
    /// Type definition of the target.
    pub type_definition: Option<NodeId>,
}

/// Result of browsing one node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowseResult {
    /// Status of the browse.
    pub status_code: u32,
    /// References found.
    pub references: Vec<ReferenceDescription>,
    /// Continuation point when more references are available.
    pub continuation_point: Option<Vec<u8>>,
}

/// Attribute read request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    /// Node to read.
    pub node_id: NodeId,
    /// Attribute to read.
    pub attribute: AttributeId,
}

impl ReadRequest {
    /// Reads the value attribute.
    pub fn value(node_id: NodeId) -> Self {
        Self {
            node_id,
            attribute: AttributeId::Value,
        }
    }
}

/// Value write request.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    /// Node to write.
    pub node_id: NodeId,
    /// Value to write.
    pub value: UaValue,
}

/// Method call request.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    /// Object owning the method.
    pub object_id: NodeId,
    /// Method to call.
    pub method_id: NodeId,
    /// Input arguments.
    pub input_arguments: Vec<UaValue>,
}

/// Method call result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallResult {
    /// Status of the call.
    pub status_code: u32,
    /// Per argument status codes.
    pub input_argument_results: Vec<u32>,
    /// Output arguments.
    pub output_arguments: Vec<UaValue>,
}

// =============================================================================
// ClientSettings
// =============================================================================

/// Stack settings for the client facade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Application name presented to servers.
    pub application_name: String,
    /// Application uri presented to servers.
    pub application_uri: String,
    /// PKI directory holding the application certificate.
    pub pki_dir: PathBuf,
    /// Requested session timeout.
    #[serde(with = "duration_ms")]
    pub session_timeout: Duration,
    /// Keep-alive interval.
    #[serde(with = "duration_ms")]
    pub keep_alive_interval: Duration,
    /// Timeout of endpoint discovery and session open.
    #[serde(with = "duration_ms")]
    pub connect_timeout: Duration,
    /// Operation timeout of service calls.
    #[serde(with = "duration_ms")]
    pub operation_timeout: Duration,
    /// Route connections through the reverse proxy transport.
    pub use_reverse_proxy: bool,
    /// Capacity of the background close queue.
    pub cleanup_queue_capacity: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            application_name: "OPC UA Registry".to_string(),
            application_uri: "urn:uareg:client".to_string(),
            pki_dir: PathBuf::from("pki"),
            session_timeout: Duration::from_secs(60),
            keep_alive_interval: Duration::from_secs(5),
            connect_timeout: Duration::from_millis(60_000),
            operation_timeout: Duration::from_secs(120),
            use_reverse_proxy: false,
            cleanup_queue_capacity: 64,
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_parse_and_format() {
        let node: NodeId = "ns=2;s=Line1.Temperature".parse().unwrap();
        assert_eq!(node, NodeId::string(2, "Line1.Temperature"));
        assert_eq!(node.to_string(), "ns=2;s=Line1.Temperature");

        let node: NodeId = "i=85".parse().unwrap();
        assert_eq!(node, NodeId::objects_folder());
        assert_eq!(node.to_string(), "i=85");

        let node = NodeId::opaque(3, vec![1, 2, 3]);
        let parsed: NodeId = node.to_string().parse().unwrap();
        assert_eq!(parsed, node);
    }

    #[test]
    fn test_node_id_parse_errors() {
        assert!("ns=x;i=1".parse::<NodeId>().is_err());
        assert!("ns=1".parse::<NodeId>().is_err());
        assert!("q=1".parse::<NodeId>().is_err());
        assert!("i=abc".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_value_json_conversion() {
        let value = UaValue::Array(vec![UaValue::Int32(4), UaValue::String("x".into())]);
        assert_eq!(value.to_json(), serde_json::json!([4, "x"]));

        assert_eq!(
            UaValue::from_json(&serde_json::json!(12)).unwrap(),
            UaValue::Int64(12)
        );
        assert_eq!(
            UaValue::from_json(&serde_json::json!(1.5)).unwrap(),
            UaValue::Double(1.5)
        );
        assert!(UaValue::from_json(&serde_json::json!({"a": 1})).is_err());
    }

    #[test]
    fn test_identity_from_credential() {
        let credential = CredentialModel::user_name("operator", "secret");
        let identity = UserIdentity::from_credential(&credential).unwrap();
        assert_eq!(identity, UserIdentity::user_name("operator", "secret"));
        assert!(!format!("{:?}", identity).contains("secret"));

        let anonymous = UserIdentity::from_credential(&CredentialModel::default()).unwrap();
        assert_eq!(anonymous, UserIdentity::Anonymous);
    }

    #[test]
    fn test_server_endpoint_from_model() {
        let model = EndpointModel::new("opc.tcp://plc:4840")
            .with_user(CredentialModel::user_name("u", "p"));
        let endpoint = ServerEndpoint::from_endpoint_model(&model).unwrap();
        assert_eq!(endpoint.url, "opc.tcp://plc:4840");
        assert_eq!(endpoint.identity.credential_type(), CredentialType::UserName);
        assert!(!endpoint.accepts_untrusted());
    }
}
