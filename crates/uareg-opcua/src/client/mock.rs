// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-process session and session factory for tests.
//!
//! [`MockSession`] serves an address space held in memory and can be told to
//! fail upcoming service calls with a status code. [`MockSessionFactory`]
//! records every session it opens and lets tests fire keep-alive events.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use super::transport::{KeepAliveHandler, SessionFactory, SessionHandle, SessionOptions, UaSession};
use crate::error::{status, OpcUaError, OpcUaResult};
use crate::types::{
    BrowseRequest, BrowseResult, CallRequest, CallResult, DataValue, EndpointDescription,
    NodeId, ReadRequest, ReferenceDescription, UaValue, WriteRequest, UA_TCP_TRANSPORT_PROFILE,
};

// =============================================================================
// MockSession
// =============================================================================

/// A session backed by an in-memory address space.
#[derive(Debug)]
pub struct MockSession {
    id: String,
    connected: AtomicBool,
    fail_close: AtomicBool,
    hang_close: AtomicBool,
    close_count: AtomicU64,
    call_count: AtomicU64,
    failures: Mutex<VecDeque<u32>>,
    values: RwLock<HashMap<NodeId, UaValue>>,
    references: RwLock<HashMap<NodeId, Vec<ReferenceDescription>>>,
}

impl MockSession {
    /// Creates a connected session.
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            connected: AtomicBool::new(true),
            fail_close: AtomicBool::new(false),
            hang_close: AtomicBool::new(false),
            close_count: AtomicU64::new(0),
            call_count: AtomicU64::new(0),
            failures: Mutex::new(VecDeque::new()),
            values: RwLock::new(HashMap::new()),
            references: RwLock::new(HashMap::new()),
        })
    }

    /// Marks the connection as lost.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Makes `close` fail.
    pub fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }

    /// Makes `close` never complete.
    pub fn hang_close(&self) {
        self.hang_close.store(true, Ordering::SeqCst);
    }

    /// Fails the next service call with `status_code`.
    pub fn fail_next(&self, status_code: u32) {
        self.failures.lock().push_back(status_code);
    }

    /// Sets the value of a node.
    pub fn set_value(&self, node_id: NodeId, value: UaValue) {
        self.values.write().insert(node_id, value);
    }

    /// Returns the value of a node.
    pub fn value(&self, node_id: &NodeId) -> Option<UaValue> {
        self.values.read().get(node_id).cloned()
    }

    /// Adds a reference below `parent`.
    pub fn add_reference(&self, parent: NodeId, reference: ReferenceDescription) {
        self.references.write().entry(parent).or_default().push(reference);
    }

    /// Number of `close` calls.
    pub fn close_count(&self) -> u64 {
        self.close_count.load(Ordering::SeqCst)
    }

    /// Number of service calls.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }

    fn begin_call(&self) -> OpcUaResult<()> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if !self.connected.load(Ordering::SeqCst) {
            return Err(OpcUaError::status(status::BAD_NOT_CONNECTED));
        }
        match self.failures.lock().pop_front() {
            Some(code) => Err(OpcUaError::status(code)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl UaSession for MockSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn browse(&self, requests: &[BrowseRequest]) -> OpcUaResult<Vec<BrowseResult>> {
        self.begin_call()?;
        let references = self.references.read();
        Ok(requests
            .iter()
            .map(|request| match references.get(&request.node_id) {
                Some(found) => BrowseResult {
                    status_code: status::GOOD,
                    references: found
                        .iter()
                        .filter(|r| {
                            request.node_class_mask == 0
                                || r.node_class
                                    .map(|c| c.value() & request.node_class_mask != 0)
                                    .unwrap_or(false)
                        })
                        .cloned()
                        .collect(),
                    continuation_point: None,
                },
                None => BrowseResult {
                    status_code: status::BAD_NODE_ID_UNKNOWN,
                    ..Default::default()
                },
            })
            .collect())
    }

    async fn browse_next(&self, continuation_points: &[Vec<u8>]) -> OpcUaResult<Vec<BrowseResult>> {
        self.begin_call()?;
        Ok(continuation_points
            .iter()
            .map(|_| BrowseResult::default())
            .collect())
    }

    async fn read(&self, requests: &[ReadRequest]) -> OpcUaResult<Vec<DataValue>> {
        self.begin_call()?;
        let values = self.values.read();
        Ok(requests
            .iter()
            .map(|request| match values.get(&request.node_id) {
                Some(value) => DataValue::good(value.clone()),
                None => DataValue::bad(status::BAD_NODE_ID_UNKNOWN),
            })
            .collect())
    }

    async fn write(&self, requests: &[WriteRequest]) -> OpcUaResult<Vec<u32>> {
        self.begin_call()?;
        let mut values = self.values.write();
        Ok(requests
            .iter()
            .map(|request| match values.get_mut(&request.node_id) {
                Some(value) => {
                    *value = request.value.clone();
                    status::GOOD
                }
                None => status::BAD_NODE_ID_UNKNOWN,
            })
            .collect())
    }

    async fn call(&self, requests: &[CallRequest]) -> OpcUaResult<Vec<CallResult>> {
        self.begin_call()?;
        Ok(requests
            .iter()
            .map(|request| CallResult {
                status_code: status::GOOD,
                input_argument_results: vec![status::GOOD; request.input_arguments.len()],
                output_arguments: request.input_arguments.clone(),
            })
            .collect())
    }

    async fn close(&self) -> OpcUaResult<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        if self.hang_close.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(OpcUaError::status(status::BAD_SESSION_CLOSED));
        }
        Ok(())
    }
}

// =============================================================================
// MockSessionFactory
// =============================================================================

/// Session factory producing [`MockSession`]s.
pub struct MockSessionFactory {
    has_certificate: AtomicBool,
    endpoints: RwLock<Vec<EndpointDescription>>,
    open_failures: Mutex<VecDeque<u32>>,
    opened: RwLock<Vec<Arc<MockSession>>>,
    options: RwLock<Vec<SessionOptions>>,
    keep_alive: RwLock<HashMap<String, KeepAliveHandler>>,
    setup: RwLock<Option<Arc<dyn Fn(&MockSession) + Send + Sync>>>,
    discovery_count: AtomicU64,
}

impl MockSessionFactory {
    /// Creates a factory advertising one unsecured UA-TCP endpoint.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            has_certificate: AtomicBool::new(false),
            endpoints: RwLock::new(vec![EndpointDescription {
                endpoint_url: "opc.tcp://localhost:4840".to_string(),
                security_policy_uri: uareg_core::types::SECURITY_POLICY_NONE.to_string(),
                security_mode: uareg_core::types::SecurityMode::None,
                transport_profile_uri: UA_TCP_TRANSPORT_PROFILE.to_string(),
                ..Default::default()
            }]),
            open_failures: Mutex::new(VecDeque::new()),
            opened: RwLock::new(Vec::new()),
            options: RwLock::new(Vec::new()),
            keep_alive: RwLock::new(HashMap::new()),
            setup: RwLock::new(None),
            discovery_count: AtomicU64::new(0),
        })
    }

    /// Sets whether an application certificate is available.
    pub fn set_has_certificate(&self, value: bool) {
        self.has_certificate.store(value, Ordering::SeqCst);
    }

    /// Replaces the advertised endpoints.
    pub fn set_endpoints(&self, endpoints: Vec<EndpointDescription>) {
        *self.endpoints.write() = endpoints;
    }

    /// Fails the next session open with `status_code`.
    pub fn fail_next_open(&self, status_code: u32) {
        self.open_failures.lock().push_back(status_code);
    }

    /// Runs `setup` on every new session before it is handed out.
    pub fn on_open(&self, setup: impl Fn(&MockSession) + Send + Sync + 'static) {
        *self.setup.write() = Some(Arc::new(setup));
    }

    /// Sessions opened so far.
    pub fn sessions(&self) -> Vec<Arc<MockSession>> {
        self.opened.read().clone()
    }

    /// Number of sessions opened.
    pub fn open_count(&self) -> usize {
        self.opened.read().len()
    }

    /// Number of `GetEndpoints` calls.
    pub fn discovery_count(&self) -> u64 {
        self.discovery_count.load(Ordering::SeqCst)
    }

    /// Options of the most recent open.
    pub fn last_options(&self) -> Option<SessionOptions> {
        self.options.read().last().cloned()
    }

    /// Delivers a keep-alive status to a session's handler.
    ///
    /// Returns `false` if the session has no handler.
    pub fn keep_alive(&self, session_id: &str, status_code: u32) -> bool {
        let handler = self.keep_alive.read().get(session_id).cloned();
        match handler {
            Some(handler) => {
                handler(status_code);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl SessionFactory for MockSessionFactory {
    async fn ensure_application_certificate(&self) -> OpcUaResult<bool> {
        Ok(self.has_certificate.load(Ordering::SeqCst))
    }

    async fn get_endpoints(
        &self,
        _discovery_url: &str,
        _timeout: Duration,
    ) -> OpcUaResult<Vec<EndpointDescription>> {
        self.discovery_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.endpoints.read().clone())
    }

    async fn open_session(
        &self,
        options: SessionOptions,
        keep_alive: KeepAliveHandler,
    ) -> OpcUaResult<SessionHandle> {
        if let Some(code) = self.open_failures.lock().pop_front() {
            return Err(OpcUaError::status(code));
        }
        let session = MockSession::new(format!("session-{}", self.open_count() + 1));
        if let Some(setup) = self.setup.read().clone() {
            setup(&session);
        }
        self.keep_alive
            .write()
            .insert(session.id().to_string(), keep_alive);
        self.options.write().push(options);
        self.opened.write().push(Arc::clone(&session));
        Ok(session)
    }
}
