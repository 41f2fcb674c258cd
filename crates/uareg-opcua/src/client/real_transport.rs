// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session factory backed by the `opcua` crate.
//!
//! The `opcua` client API is synchronous. Every call into the stack runs on
//! the blocking thread pool so the async runtime is never stalled by a slow
//! server.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use uareg_opcua::client::{OpcUaServerClient, RealSessionFactory};
//! use uareg_opcua::types::ClientSettings;
//!
//! let settings = ClientSettings::default();
//! let factory = Arc::new(RealSessionFactory::new(settings.clone()));
//! let client = OpcUaServerClient::new(factory, settings);
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, trace, warn};

use opcua::client::prelude::*;
use opcua::sync::RwLock as OpcUaRwLock;

use super::transport::{KeepAliveHandler, SessionFactory, SessionHandle, SessionOptions, UaSession};
use crate::error::{status, OpcUaError, OpcUaResult};
use crate::types::{
    self as ua, ClientSettings, NodeIdentifier, UaValue, UserIdentity,
};
use uareg_core::types::{CredentialType, SecurityMode};

// =============================================================================
// RealSessionFactory
// =============================================================================

/// Opens sessions with the `opcua` client stack.
pub struct RealSessionFactory {
    settings: ClientSettings,
}

impl RealSessionFactory {
    /// Creates a factory for the given client settings.
    pub fn new(settings: ClientSettings) -> Self {
        Self { settings }
    }

    fn build_client(&self, trust_server_certs: bool) -> OpcUaResult<Client> {
        ClientBuilder::new()
            .application_name(self.settings.application_name.as_str())
            .application_uri(self.settings.application_uri.as_str())
            .product_uri(self.settings.application_uri.as_str())
            .pki_dir(self.settings.pki_dir.clone())
            .create_sample_keypair(true)
            .trust_server_certs(trust_server_certs)
            .session_retry_limit(0)
            .session_timeout(self.settings.session_timeout.as_millis() as u32)
            .client()
            .ok_or_else(|| OpcUaError::stack("invalid client configuration"))
    }

    fn certificate_path(&self) -> PathBuf {
        self.settings.pki_dir.join("own").join("cert.der")
    }
}

#[async_trait]
impl SessionFactory for RealSessionFactory {
    async fn ensure_application_certificate(&self) -> OpcUaResult<bool> {
        // Building a client creates the key pair on first use.
        self.build_client(false)?;
        let present = self.certificate_path().exists();
        if !present {
            warn!(pki_dir = %self.settings.pki_dir.display(), "No application certificate available");
        }
        Ok(present)
    }

    async fn get_endpoints(
        &self,
        discovery_url: &str,
        timeout: Duration,
    ) -> OpcUaResult<Vec<ua::EndpointDescription>> {
        let client = self.build_client(false)?;
        let url = discovery_url.to_string();
        trace!(url = %url, "Getting endpoints");
        let endpoints = blocking(timeout, move || {
            client
                .get_server_endpoints_from_url(url.as_str())
                .map_err(status_error)
        })
        .await?;
        Ok(endpoints.iter().map(from_opcua_endpoint).collect())
    }

    async fn open_session(
        &self,
        options: SessionOptions,
        keep_alive: KeepAliveHandler,
    ) -> OpcUaResult<SessionHandle> {
        let mut client = self.build_client(options.accept_untrusted)?;
        let endpoint = to_opcua_endpoint(&options.endpoint);
        let identity = identity_token(&options.identity);
        let name = options.session_name.clone();

        debug!(
            endpoint = %options.endpoint.endpoint_url,
            security_mode = %options.endpoint.security_mode,
            "Opening session"
        );

        let session = blocking(options.timeout, move || {
            client
                .connect_to_endpoint(endpoint, identity)
                .map_err(status_error)
        })
        .await?;

        let connected = Arc::new(AtomicBool::new(true));
        {
            let flag = Arc::clone(&connected);
            let callback = ConnectionStatusCallback::new(move |is_connected| {
                flag.store(is_connected, Ordering::SeqCst);
                keep_alive(if is_connected {
                    status::GOOD
                } else {
                    status::BAD_CONNECTION_CLOSED
                });
            });
            session.write().set_connection_status_callback(callback);
        }

        info!(session = %name, "Stack session opened");
        Ok(Arc::new(RealSession {
            id: name,
            session,
            connected,
            operation_timeout: self.settings.operation_timeout,
        }))
    }
}

// =============================================================================
// RealSession
// =============================================================================

struct RealSession {
    id: String,
    session: Arc<OpcUaRwLock<Session>>,
    connected: Arc<AtomicBool>,
    operation_timeout: Duration,
}

impl RealSession {
    async fn run<T, F>(&self, f: F) -> OpcUaResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Session) -> Result<T, StatusCode> + Send + 'static,
    {
        let session = Arc::clone(&self.session);
        blocking(self.operation_timeout, move || {
            let guard = session.read();
            f(&guard).map_err(status_error)
        })
        .await
    }
}

#[async_trait]
impl UaSession for RealSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.session.read().is_connected()
    }

    async fn browse(&self, requests: &[ua::BrowseRequest]) -> OpcUaResult<Vec<ua::BrowseResult>> {
        let descriptions: Vec<BrowseDescription> = requests
            .iter()
            .map(|r| BrowseDescription {
                node_id: to_opcua_node_id(&r.node_id),
                browse_direction: match r.direction {
                    ua::BrowseDirection::Forward => BrowseDirection::Forward,
                    ua::BrowseDirection::Inverse => BrowseDirection::Inverse,
                    ua::BrowseDirection::Both => BrowseDirection::Both,
                },
                reference_type_id: ReferenceTypeId::HierarchicalReferences.into(),
                include_subtypes: true,
                node_class_mask: r.node_class_mask,
                result_mask: BrowseDescriptionResultMask::all().bits() as u32,
            })
            .collect();
        let results = self
            .run(move |s| s.browse(&descriptions))
            .await?
            .unwrap_or_default();
        Ok(results.iter().map(from_opcua_browse_result).collect())
    }

    async fn browse_next(&self, continuation_points: &[Vec<u8>]) -> OpcUaResult<Vec<ua::BrowseResult>> {
        let points: Vec<ByteString> = continuation_points
            .iter()
            .map(|cp| ByteString::from(cp.as_slice()))
            .collect();
        let results = self
            .run(move |s| s.browse_next(false, &points))
            .await?
            .unwrap_or_default();
        Ok(results.iter().map(from_opcua_browse_result).collect())
    }

    async fn read(&self, requests: &[ua::ReadRequest]) -> OpcUaResult<Vec<ua::DataValue>> {
        let ids: Vec<ReadValueId> = requests
            .iter()
            .map(|r| ReadValueId {
                node_id: to_opcua_node_id(&r.node_id),
                attribute_id: r.attribute.value(),
                index_range: UAString::null(),
                data_encoding: QualifiedName::null(),
            })
            .collect();
        let values = self
            .run(move |s| s.read(&ids, TimestampsToReturn::Both, 0.0))
            .await?;
        Ok(values.iter().map(from_opcua_data_value).collect())
    }

    async fn write(&self, requests: &[ua::WriteRequest]) -> OpcUaResult<Vec<u32>> {
        let values: Vec<WriteValue> = requests
            .iter()
            .map(|r| WriteValue {
                node_id: to_opcua_node_id(&r.node_id),
                attribute_id: AttributeId::Value as u32,
                index_range: UAString::null(),
                value: DataValue::new_now(to_opcua_variant(&r.value)),
            })
            .collect();
        let results = self.run(move |s| s.write(&values)).await?;
        Ok(results.iter().map(|c| c.bits()).collect())
    }

    async fn call(&self, requests: &[ua::CallRequest]) -> OpcUaResult<Vec<ua::CallResult>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let method = CallMethodRequest {
                object_id: to_opcua_node_id(&request.object_id),
                method_id: to_opcua_node_id(&request.method_id),
                input_arguments: Some(
                    request.input_arguments.iter().map(to_opcua_variant).collect(),
                ),
            };
            let result = self.run(move |s| s.call(method)).await?;
            results.push(ua::CallResult {
                status_code: result.status_code.bits(),
                input_argument_results: result
                    .input_argument_results
                    .unwrap_or_default()
                    .iter()
                    .map(|c| c.bits())
                    .collect(),
                output_arguments: result
                    .output_arguments
                    .unwrap_or_default()
                    .iter()
                    .map(from_opcua_variant)
                    .collect(),
            });
        }
        Ok(results)
    }

    async fn close(&self) -> OpcUaResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || session.read().disconnect())
            .await
            .map_err(|e| OpcUaError::stack(format!("close task failed: {}", e)))
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn blocking<T, F>(timeout: Duration, f: F) -> OpcUaResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> OpcUaResult<T> + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(f)).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(OpcUaError::stack(format!("stack task failed: {}", e))),
        Err(_) => Err(OpcUaError::Timeout(timeout)),
    }
}

fn status_error(code: StatusCode) -> OpcUaError {
    OpcUaError::status(code.bits())
}

fn identity_token(identity: &UserIdentity) -> IdentityToken {
    match identity {
        UserIdentity::Anonymous => IdentityToken::Anonymous,
        UserIdentity::UserName { user, password } => {
            IdentityToken::UserName(user.clone(), password.clone())
        }
        UserIdentity::X509 {
            certificate_path,
            private_key_path,
        } => IdentityToken::X509(certificate_path.into(), private_key_path.into()),
    }
}

fn to_opcua_endpoint(endpoint: &ua::EndpointDescription) -> EndpointDescription {
    let mode = match endpoint.security_mode {
        SecurityMode::None => MessageSecurityMode::None,
        SecurityMode::Sign => MessageSecurityMode::Sign,
        SecurityMode::SignAndEncrypt | SecurityMode::Best => MessageSecurityMode::SignAndEncrypt,
    };
    (
        endpoint.endpoint_url.as_str(),
        endpoint.security_policy_uri.as_str(),
        mode,
        UserTokenPolicy::anonymous(),
    )
        .into()
}

fn from_opcua_endpoint(endpoint: &EndpointDescription) -> ua::EndpointDescription {
    ua::EndpointDescription {
        endpoint_url: endpoint.endpoint_url.as_ref().to_string(),
        server_application_uri: endpoint.server.application_uri.as_ref().to_string(),
        discovery_urls: endpoint
            .server
            .discovery_urls
            .as_ref()
            .map(|urls| urls.iter().map(|u| u.as_ref().to_string()).collect())
            .unwrap_or_default(),
        security_mode: match endpoint.security_mode {
            MessageSecurityMode::Sign => SecurityMode::Sign,
            MessageSecurityMode::SignAndEncrypt => SecurityMode::SignAndEncrypt,
            _ => SecurityMode::None,
        },
        security_policy_uri: endpoint.security_policy_uri.as_ref().to_string(),
        security_level: endpoint.security_level,
        transport_profile_uri: endpoint.transport_profile_uri.as_ref().to_string(),
        server_certificate: endpoint.server_certificate.value.clone(),
        user_token_types: endpoint
            .user_identity_tokens
            .as_ref()
            .map(|tokens| {
                tokens
                    .iter()
                    .map(|t| match t.token_type {
                        UserTokenType::UserName => CredentialType::UserName,
                        UserTokenType::Certificate => CredentialType::X509Certificate,
                        UserTokenType::IssuedToken => CredentialType::JwtToken,
                        UserTokenType::Anonymous => CredentialType::None,
                    })
                    .collect()
            })
            .unwrap_or_default(),
    }
}

fn from_opcua_browse_result(result: &BrowseResult) -> ua::BrowseResult {
    ua::BrowseResult {
        status_code: result.status_code.bits(),
        references: result
            .references
            .as_ref()
            .map(|refs| {
                refs.iter()
                    .map(|r| ua::ReferenceDescription {
                        reference_type_id: from_opcua_node_id(&r.reference_type_id),
                        is_forward: r.is_forward,
                        node_id: from_opcua_node_id(&r.node_id.node_id),
                        browse_name: r.browse_name.name.as_ref().to_string(),
                        display_name: r.display_name.text.as_ref().to_string(),
                        node_class: ua::NodeClass::from_value(r.node_class as u32),
                        type_definition: if r.type_definition.node_id.is_null() {
                            None
                        } else {
                            Some(from_opcua_node_id(&r.type_definition.node_id))
                        },
                    })
                    .collect()
            })
            .unwrap_or_default(),
        continuation_point: result.continuation_point.value.clone().filter(|cp| !cp.is_empty()),
    }
}

fn from_opcua_data_value(value: &DataValue) -> ua::DataValue {
    ua::DataValue {
        value: value
            .value
            .as_ref()
            .map(from_opcua_variant)
            .unwrap_or_default(),
        status_code: value.status.map(|s| s.bits()).unwrap_or(status::GOOD),
        source_timestamp: value.source_timestamp.map(|t| t.as_chrono()),
        server_timestamp: value.server_timestamp.map(|t| t.as_chrono()),
    }
}

fn to_opcua_node_id(node_id: &ua::NodeId) -> NodeId {
    match &node_id.identifier {
        NodeIdentifier::Numeric(v) => NodeId::new(node_id.namespace_index, *v),
        NodeIdentifier::String(v) => NodeId::new(node_id.namespace_index, v.clone()),
        NodeIdentifier::Guid(v) => {
            NodeId::new(node_id.namespace_index, Guid::from_bytes(*v.as_bytes()))
        }
        NodeIdentifier::Opaque(v) => {
            NodeId::new(node_id.namespace_index, ByteString::from(v.as_slice()))
        }
    }
}

fn from_opcua_node_id(node_id: &NodeId) -> ua::NodeId {
    let ns = node_id.namespace;
    match &node_id.identifier {
        Identifier::Numeric(v) => ua::NodeId::numeric(ns, *v),
        Identifier::String(v) => ua::NodeId::string(ns, v.as_ref()),
        Identifier::Guid(v) => ua::NodeId::guid(ns, uuid::Uuid::from_bytes(*v.as_bytes())),
        Identifier::ByteString(v) => ua::NodeId::opaque(ns, v.value.clone().unwrap_or_default()),
    }
}

fn from_opcua_variant(variant: &Variant) -> UaValue {
    match variant {
        Variant::Empty => UaValue::Null,
        Variant::Boolean(v) => UaValue::Boolean(*v),
        Variant::SByte(v) => UaValue::SByte(*v),
        Variant::Byte(v) => UaValue::Byte(*v),
        Variant::Int16(v) => UaValue::Int16(*v),
        Variant::UInt16(v) => UaValue::UInt16(*v),
        Variant::Int32(v) => UaValue::Int32(*v),
        Variant::UInt32(v) => UaValue::UInt32(*v),
        Variant::Int64(v) => UaValue::Int64(*v),
        Variant::UInt64(v) => UaValue::UInt64(*v),
        Variant::Float(v) => UaValue::Float(*v),
        Variant::Double(v) => UaValue::Double(*v),
        Variant::String(v) => UaValue::String(v.as_ref().to_string()),
        Variant::DateTime(v) => UaValue::DateTime(v.as_chrono()),
        Variant::Guid(v) => UaValue::Guid(uuid::Uuid::from_bytes(*v.as_bytes())),
        Variant::ByteString(v) => UaValue::ByteString(v.value.clone().unwrap_or_default()),
        Variant::NodeId(v) => UaValue::NodeId(from_opcua_node_id(v)),
        Variant::LocalizedText(v) => UaValue::String(v.text.as_ref().to_string()),
        Variant::QualifiedName(v) => UaValue::String(v.name.as_ref().to_string()),
        Variant::Array(array) => UaValue::Array(array.values.iter().map(from_opcua_variant).collect()),
        other => UaValue::String(format!("{:?}", other)),
    }
}

fn to_opcua_variant(value: &UaValue) -> Variant {
    match value {
        UaValue::Null => Variant::Empty,
        UaValue::Boolean(v) => Variant::Boolean(*v),
        UaValue::SByte(v) => Variant::SByte(*v),
        UaValue::Byte(v) => Variant::Byte(*v),
        UaValue::Int16(v) => Variant::Int16(*v),
        UaValue::UInt16(v) => Variant::UInt16(*v),
        UaValue::Int32(v) => Variant::Int32(*v),
        UaValue::UInt32(v) => Variant::UInt32(*v),
        UaValue::Int64(v) => Variant::Int64(*v),
        UaValue::UInt64(v) => Variant::UInt64(*v),
        UaValue::Float(v) => Variant::Float(*v),
        UaValue::Double(v) => Variant::Double(*v),
        UaValue::String(v) => Variant::String(UAString::from(v.as_str())),
        UaValue::DateTime(v) => Variant::DateTime(Box::new(DateTime::from(*v))),
        UaValue::Guid(v) => Variant::Guid(Box::new(Guid::from_bytes(*v.as_bytes()))),
        UaValue::ByteString(v) => Variant::ByteString(ByteString::from(v.as_slice())),
        UaValue::NodeId(v) => Variant::NodeId(Box::new(to_opcua_node_id(v))),
        UaValue::Array(values) => {
            let variants: Vec<Variant> = values.iter().map(to_opcua_variant).collect();
            Array::new(VariantTypeId::Variant, variants)
                .map(|array| Variant::Array(Box::new(array)))
                .unwrap_or(Variant::Empty)
        }
    }
}
