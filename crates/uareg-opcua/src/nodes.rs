// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Node services.
//!
//! Browse, read, write and method call against a server, each executed on a
//! pooled session through [`OpcUaServerClient::execute_service`]. Values are
//! exchanged as JSON so callers stay independent of the variant type.
//!
//! # Examples
//!
//! ```rust,ignore
//! use uareg_opcua::nodes::{BrowseNodeRequest, NodeServices};
//!
//! let services = NodeServices::new(client);
//! let result = services
//!     .browse(&endpoint, BrowseNodeRequest::default().read_values(true))
//!     .await?;
//! for reference in result.references {
//!     println!("{} = {:?}", reference.target.display_name, reference.target.value);
//! }
//! ```

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{OpcUaServerClient, SessionHandle};
use crate::error::{status, OpcUaError, OpcUaResult};
use crate::types::{
    AttributeId, BrowseDirection, BrowseRequest, BrowseResult, CallRequest, NodeClass, NodeId,
    ReadRequest, ReferenceDescription, ServerEndpoint, UaValue, WriteRequest,
};

/// Upper bound of `BrowseNext` rounds when continuation is followed.
const MAX_BROWSE_NEXT_ROUNDS: usize = 64;

// =============================================================================
// Models
// =============================================================================

/// Browse request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowseNodeRequest {
    /// Node to browse. The root folder when absent.
    pub node_id: Option<String>,
    /// Direction of references.
    pub direction: BrowseDirection,
    /// Maximum references per round, 0 for server default.
    pub max_references: u32,
    /// Keep calling `BrowseNext` until the server has no more references.
    pub follow_continuation: bool,
    /// Read the value of variable targets.
    pub read_values: bool,
}

impl BrowseNodeRequest {
    /// Browses a specific node.
    pub fn node(node_id: impl Into<String>) -> Self {
        Self {
            node_id: Some(node_id.into()),
            ..Default::default()
        }
    }

    /// Reads values of variable targets.
    pub fn read_values(mut self, value: bool) -> Self {
        self.read_values = value;
        self
    }

    /// Follows continuation points.
    pub fn follow_continuation(mut self, value: bool) -> Self {
        self.follow_continuation = value;
        self
    }
}

/// A node as returned by the services.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeModel {
    /// Node id in string form.
    pub node_id: String,
    /// Display name.
    pub display_name: Option<String>,
    /// Browse name.
    pub browse_name: Option<String>,
    /// Node class.
    pub node_class: Option<NodeClass>,
    /// Value of a variable node, when read.
    pub value: Option<serde_json::Value>,
    /// Status of the value read.
    pub value_status: Option<u32>,
}

/// A reference from the browsed node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReferenceModel {
    /// Reference type id.
    pub reference_type_id: String,
    /// `true` for a forward reference.
    pub is_forward: bool,
    /// Target node.
    pub target: NodeModel,
    /// Type definition of the target.
    pub type_definition: Option<String>,
}

/// Browse response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrowseNodeResult {
    /// The browsed node.
    pub node: NodeModel,
    /// References found.
    pub references: Vec<NodeReferenceModel>,
    /// Token for [`NodeServices::browse_next`] when more references exist.
    pub continuation_token: Option<String>,
}

/// Result of reading a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueReadResult {
    /// Value as JSON.
    pub value: serde_json::Value,
    /// Status code of the value.
    pub status_code: u32,
    /// Source timestamp.
    pub source_timestamp: Option<DateTime<Utc>>,
    /// Server timestamp.
    pub server_timestamp: Option<DateTime<Utc>>,
}

/// Method call response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCallResult {
    /// Output arguments as JSON.
    pub outputs: Vec<serde_json::Value>,
}

// =============================================================================
// NodeServices
// =============================================================================

/// Browse, read, write and call services over the client facade.
#[derive(Clone)]
pub struct NodeServices {
    client: Arc<OpcUaServerClient>,
}

impl NodeServices {
    /// Creates the services.
    pub fn new(client: Arc<OpcUaServerClient>) -> Self {
        Self { client }
    }

    /// Browses the references of a node.
    pub async fn browse(
        &self,
        endpoint: &ServerEndpoint,
        request: BrowseNodeRequest,
    ) -> OpcUaResult<BrowseNodeResult> {
        let node_id = match &request.node_id {
            Some(id) if !id.trim().is_empty() => id.parse::<NodeId>()?,
            _ => NodeId::root_folder(),
        };
        debug!(endpoint = %endpoint.url, node = %node_id, "Browsing node");

        self.client
            .execute_service(endpoint, |session| {
                let request = request.clone();
                let node_id = node_id.clone();
                async move {
                    let node = read_node(&session, &node_id).await?;
                    let browse = BrowseRequest {
                        node_id: node_id.clone(),
                        direction: request.direction,
                        node_class_mask: 0,
                        max_references: request.max_references,
                    };
                    let first = first_result(session.browse(&[browse]).await?, &node_id)?;
                    let (references, continuation_point) =
                        collect_references(&session, first, request.follow_continuation, &node_id)
                            .await?;
                    let references = to_reference_models(&session, references, request.read_values)
                        .await?;
                    Ok(BrowseNodeResult {
                        node,
                        references,
                        continuation_token: continuation_point.map(|cp| BASE64.encode(cp)),
                    })
                }
            })
            .await
    }

    /// Continues a browse from a continuation token.
    pub async fn browse_next(
        &self,
        endpoint: &ServerEndpoint,
        continuation_token: &str,
        read_values: bool,
    ) -> OpcUaResult<BrowseNodeResult> {
        let continuation_point = BASE64
            .decode(continuation_token)
            .map_err(|_| OpcUaError::argument("continuation_token", "not a valid token"))?;

        self.client
            .execute_service(endpoint, |session| {
                let continuation_point = continuation_point.clone();
                async move {
                    let results = session.browse_next(&[continuation_point]).await?;
                    let result = first_result(results, &NodeId::default())?;
                    let next = result.continuation_point.map(|cp| BASE64.encode(cp));
                    let references =
                        to_reference_models(&session, result.references, read_values).await?;
                    Ok(BrowseNodeResult {
                        node: NodeModel::default(),
                        references,
                        continuation_token: next,
                    })
                }
            })
            .await
    }

    /// Reads the value of a node.
    pub async fn read_value(
        &self,
        endpoint: &ServerEndpoint,
        node_id: &str,
    ) -> OpcUaResult<ValueReadResult> {
        let node_id: NodeId = node_id.parse()?;
        self.client
            .execute_service(endpoint, |session| {
                let node_id = node_id.clone();
                async move {
                    let mut values = session.read(&[ReadRequest::value(node_id.clone())]).await?;
                    let value = values.pop().ok_or_else(|| {
                        OpcUaError::stack(format!("empty read response for {}", node_id))
                    })?;
                    if status::is_bad(value.status_code) {
                        return Err(OpcUaError::status_with_context(
                            value.status_code,
                            node_id.to_string(),
                        ));
                    }
                    Ok(ValueReadResult {
                        value: value.value.to_json(),
                        status_code: value.status_code,
                        source_timestamp: value.source_timestamp,
                        server_timestamp: value.server_timestamp,
                    })
                }
            })
            .await
    }

    /// Writes the value of a node.
    pub async fn write_value(
        &self,
        endpoint: &ServerEndpoint,
        node_id: &str,
        value: &serde_json::Value,
    ) -> OpcUaResult<()> {
        let node_id: NodeId = node_id.parse()?;
        let value = UaValue::from_json(value)?;
        self.client
            .execute_service(endpoint, |session| {
                let request = WriteRequest {
                    node_id: node_id.clone(),
                    value: value.clone(),
                };
                async move {
                    let results = session.write(std::slice::from_ref(&request)).await?;
                    match results.first() {
                        Some(code) if status::is_bad(*code) => Err(
                            OpcUaError::status_with_context(*code, request.node_id.to_string()),
                        ),
                        Some(_) => Ok(()),
                        None => Err(OpcUaError::stack("empty write response")),
                    }
                }
            })
            .await
    }

    /// Calls a method on an object.
    pub async fn call_method(
        &self,
        endpoint: &ServerEndpoint,
        object_id: &str,
        method_id: &str,
        arguments: &[serde_json::Value],
    ) -> OpcUaResult<MethodCallResult> {
        let request = CallRequest {
            object_id: object_id.parse()?,
            method_id: method_id.parse()?,
            input_arguments: arguments
                .iter()
                .map(UaValue::from_json)
                .collect::<OpcUaResult<Vec<_>>>()?,
        };
        self.client
            .execute_service(endpoint, |session| {
                let request = request.clone();
                async move {
                    let mut results = session.call(std::slice::from_ref(&request)).await?;
                    let result = results
                        .pop()
                        .ok_or_else(|| OpcUaError::stack("empty call response"))?;
                    if status::is_bad(result.status_code) {
                        return Err(OpcUaError::status_with_context(
                            result.status_code,
                            request.method_id.to_string(),
                        ));
                    }
                    Ok(MethodCallResult {
                        outputs: result.output_arguments.iter().map(UaValue::to_json).collect(),
                    })
                }
            })
            .await
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn first_result(results: Vec<BrowseResult>, node_id: &NodeId) -> OpcUaResult<BrowseResult> {
    let result = results
        .into_iter()
        .next()
        .ok_or_else(|| OpcUaError::stack("empty browse response"))?;
    if status::is_bad(result.status_code) {
        return Err(OpcUaError::status_with_context(
            result.status_code,
            node_id.to_string(),
        ));
    }
    Ok(result)
}

async fn collect_references(
    session: &SessionHandle,
    first: BrowseResult,
    follow: bool,
    node_id: &NodeId,
) -> OpcUaResult<(Vec<ReferenceDescription>, Option<Vec<u8>>)> {
    let mut references = first.references;
    let mut continuation_point = first.continuation_point;
    if !follow {
        return Ok((references, continuation_point));
    }
    let mut rounds = 0;
    while let Some(cp) = continuation_point.take() {
        if rounds == MAX_BROWSE_NEXT_ROUNDS {
            continuation_point = Some(cp);
            break;
        }
        rounds += 1;
        let next = first_result(session.browse_next(&[cp]).await?, node_id)?;
        references.extend(next.references);
        continuation_point = next.continuation_point;
    }
    Ok((references, continuation_point))
}

async fn read_node(session: &SessionHandle, node_id: &NodeId) -> OpcUaResult<NodeModel> {
    let requests = [
        ReadRequest {
            node_id: node_id.clone(),
            attribute: AttributeId::DisplayName,
        },
        ReadRequest {
            node_id: node_id.clone(),
            attribute: AttributeId::NodeClass,
        },
    ];
    let values = session.read(&requests).await?;
    let display_name = values
        .first()
        .filter(|v| v.is_good())
        .and_then(|v| v.value.as_str().map(str::to_string));
    let node_class = values
        .get(1)
        .filter(|v| v.is_good())
        .and_then(|v| v.value.as_i64())
        .and_then(|v| NodeClass::from_value(v as u32));
    Ok(NodeModel {
        node_id: node_id.to_string(),
        display_name,
        node_class,
        ..Default::default()
    })
}

async fn to_reference_models(
    session: &SessionHandle,
    references: Vec<ReferenceDescription>,
    read_values: bool,
) -> OpcUaResult<Vec<NodeReferenceModel>> {
    let mut models: Vec<NodeReferenceModel> = references
        .into_iter()
        .map(|r| NodeReferenceModel {
            reference_type_id: r.reference_type_id.to_string(),
            is_forward: r.is_forward,
            target: NodeModel {
                node_id: r.node_id.to_string(),
                display_name: Some(r.display_name),
                browse_name: Some(r.browse_name),
                node_class: r.node_class,
                ..Default::default()
            },
            type_definition: r.type_definition.map(|t| t.to_string()),
        })
        .collect();

    if !read_values {
        return Ok(models);
    }
    let variables: Vec<usize> = models
        .iter()
        .enumerate()
        .filter(|(_, m)| m.target.node_class == Some(NodeClass::Variable))
        .map(|(i, _)| i)
        .collect();
    if variables.is_empty() {
        return Ok(models);
    }
    let requests = variables
        .iter()
        .map(|&i| models[i].target.node_id.parse().map(ReadRequest::value))
        .collect::<OpcUaResult<Vec<_>>>()?;
    let values = session.read(&requests).await?;
    for (index, value) in variables.into_iter().zip(values) {
        let target = &mut models[index].target;
        target.value_status = Some(value.status_code);
        if value.is_good() {
            target.value = Some(value.value.to_json());
        }
    }
    Ok(models)
}
