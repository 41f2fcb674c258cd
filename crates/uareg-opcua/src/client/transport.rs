// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Seams to the OPC UA protocol stack.
//!
//! The client facade never talks to a protocol implementation directly. It
//! opens sessions through a [`SessionFactory`] and runs units of work against
//! [`UaSession`] handles. The `real-transport` feature provides an
//! implementation backed by the `opcua` crate; tests plug in mocks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::OpcUaResult;
use crate::types::{
    BrowseRequest, BrowseResult, CallRequest, CallResult, DataValue, EndpointDescription,
    ReadRequest, UserIdentity, WriteRequest,
};

// =============================================================================
// UaSession
// =============================================================================

/// An authenticated session to one server endpoint.
///
/// Service calls fail with [`OpcUaError::Status`](crate::error::OpcUaError)
/// carrying the service level status code. Per node status codes are returned
/// inside the results.
#[async_trait]
pub trait UaSession: Send + Sync {
    /// Unique id of the session.
    fn id(&self) -> &str;

    /// Returns `true` while the session's connection is up.
    fn is_connected(&self) -> bool;

    /// Browses the references of nodes.
    async fn browse(&self, requests: &[BrowseRequest]) -> OpcUaResult<Vec<BrowseResult>>;

    /// Continues a browse from continuation points.
    async fn browse_next(&self, continuation_points: &[Vec<u8>]) -> OpcUaResult<Vec<BrowseResult>>;

    /// Reads node attributes.
    async fn read(&self, requests: &[ReadRequest]) -> OpcUaResult<Vec<DataValue>>;

    /// Writes node values and returns per node status codes.
    async fn write(&self, requests: &[WriteRequest]) -> OpcUaResult<Vec<u32>>;

    /// Calls methods.
    async fn call(&self, requests: &[CallRequest]) -> OpcUaResult<Vec<CallResult>>;

    /// Closes the session.
    async fn close(&self) -> OpcUaResult<()>;
}

/// Shared session handle.
pub type SessionHandle = Arc<dyn UaSession>;

/// Callback invoked with the status of every keep-alive response.
pub type KeepAliveHandler = Arc<dyn Fn(u32) + Send + Sync>;

// =============================================================================
// SessionFactory
// =============================================================================

/// Parameters for opening a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Selected endpoint.
    pub endpoint: EndpointDescription,
    /// Identity to activate the session with.
    pub identity: UserIdentity,
    /// Session name.
    pub session_name: String,
    /// Open timeout.
    pub timeout: Duration,
    /// Keep-alive interval.
    pub keep_alive_interval: Duration,
    /// Accept the server certificate when it is untrusted.
    pub accept_untrusted: bool,
}

/// Creates sessions against remote servers.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Returns `true` if connections can be tunneled through the reverse
    /// proxy transport.
    fn supports_reverse_proxy(&self) -> bool {
        false
    }

    /// Validates the local application configuration, creating a self
    /// signed application certificate on first use.
    ///
    /// Returns `true` when an application certificate is available.
    async fn ensure_application_certificate(&self) -> OpcUaResult<bool>;

    /// Calls `GetEndpoints` on a discovery url.
    async fn get_endpoints(
        &self,
        discovery_url: &str,
        timeout: Duration,
    ) -> OpcUaResult<Vec<EndpointDescription>>;

    /// Opens and activates a session.
    ///
    /// `keep_alive` is invoked with every keep-alive status until the
    /// session is closed.
    async fn open_session(
        &self,
        options: SessionOptions,
        keep_alive: KeepAliveHandler,
    ) -> OpcUaResult<SessionHandle>;
}
