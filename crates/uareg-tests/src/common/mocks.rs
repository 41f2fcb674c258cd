// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! Mocks for testing registry components in isolation.
//!
//! - [`FlakyTwinStore`]: twin store that loses optimistic-concurrency races
//! - [`RecordingActivator`]: endpoint activator recording its calls
//! - [`RecordingEndpointListener`] / [`RecordingApplicationListener`]:
//!   event sinks recording `kind:id` lines
//! - [`MockDiscoveryClient`] / [`StaticDiscovererSource`]: orchestrator seams

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use uareg_core::models::{
    ApplicationInfoModel, DiscoveryRequestModel, EndpointInfoModel, EndpointRegistrationModel,
    RegistryOperationContext,
};
use uareg_core::twin::{DeviceTwin, MemoryTwinStore, TwinPage, TwinQuery, TwinStore};
use uareg_core::{RegistryError, RegistryResult};
use uareg_registry::{
    ApplicationRegistryListener, DiscovererSource, DiscoveryClient, EndpointActivator,
    EndpointRegistryListener,
};

// =============================================================================
// FlakyTwinStore
// =============================================================================

/// A [`MemoryTwinStore`] wrapper that fails the next N patches with
/// `ResourceOutOfDate`, as if another writer got there first.
pub struct FlakyTwinStore {
    inner: Arc<MemoryTwinStore>,
    stale_patches: AtomicUsize,
    patch_calls: AtomicUsize,
}

impl FlakyTwinStore {
    /// Wraps `inner`.
    pub fn new(inner: Arc<MemoryTwinStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            stale_patches: AtomicUsize::new(0),
            patch_calls: AtomicUsize::new(0),
        })
    }

    /// Makes the next `count` patches fail with `ResourceOutOfDate`.
    pub fn fail_next_patches(&self, count: usize) {
        self.stale_patches.store(count, Ordering::SeqCst);
    }

    /// Number of patch calls, failed ones included.
    pub fn patch_calls(&self) -> usize {
        self.patch_calls.load(Ordering::SeqCst)
    }

    /// The wrapped store.
    pub fn inner(&self) -> &Arc<MemoryTwinStore> {
        &self.inner
    }
}

#[async_trait]
impl TwinStore for FlakyTwinStore {
    async fn get(&self, id: &str, module_id: Option<&str>) -> RegistryResult<DeviceTwin> {
        self.inner.get(id, module_id).await
    }

    async fn create_or_update(&self, twin: DeviceTwin, force: bool) -> RegistryResult<DeviceTwin> {
        self.inner.create_or_update(twin, force).await
    }

    async fn patch(&self, twin: DeviceTwin, force: bool) -> RegistryResult<DeviceTwin> {
        self.patch_calls.fetch_add(1, Ordering::SeqCst);
        let stale = self
            .stale_patches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stale {
            return Err(RegistryError::out_of_date(twin.id));
        }
        self.inner.patch(twin, force).await
    }

    async fn delete(
        &self,
        id: &str,
        module_id: Option<&str>,
        etag: Option<&str>,
    ) -> RegistryResult<()> {
        self.inner.delete(id, module_id, etag).await
    }

    async fn query(
        &self,
        query: &TwinQuery,
        continuation: Option<&str>,
        page_size: Option<usize>,
    ) -> RegistryResult<TwinPage> {
        self.inner.query(query, continuation, page_size).await
    }

    async fn update_property(
        &self,
        device_id: &str,
        module_id: Option<&str>,
        property: &str,
        value: Value,
    ) -> RegistryResult<()> {
        self.inner
            .update_property(device_id, module_id, property, value)
            .await
    }

    async fn get_primary_key(
        &self,
        device_id: &str,
        module_id: Option<&str>,
    ) -> RegistryResult<String> {
        self.inner.get_primary_key(device_id, module_id).await
    }
}

// =============================================================================
// RecordingActivator
// =============================================================================

/// Activator that records `activate:<id>` / `deactivate:<id>` lines.
#[derive(Default)]
pub struct RecordingActivator {
    calls: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl RecordingActivator {
    /// Creates an activator that accepts every call.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes activations fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Recorded calls.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl EndpointActivator for RecordingActivator {
    async fn activate_endpoint(
        &self,
        registration: &EndpointRegistrationModel,
        _secret: &str,
    ) -> RegistryResult<()> {
        self.calls.lock().push(format!("activate:{}", registration.id));
        if self.fail.load(Ordering::SeqCst) {
            return Err(RegistryError::external("supervisor", "activation rejected"));
        }
        Ok(())
    }

    async fn deactivate_endpoint(
        &self,
        registration: &EndpointRegistrationModel,
    ) -> RegistryResult<()> {
        self.calls.lock().push(format!("deactivate:{}", registration.id));
        Ok(())
    }
}

// =============================================================================
// Recording Listeners
// =============================================================================

/// Endpoint listener recording `kind:endpoint_url` lines.
#[derive(Default)]
pub struct RecordingEndpointListener {
    events: Mutex<Vec<String>>,
}

impl RecordingEndpointListener {
    /// Creates an empty listener.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Drains the recorded events.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Returns the events of one kind, without draining.
    pub fn of_kind(&self, kind: &str) -> Vec<String> {
        let prefix = format!("{kind}:");
        self.events
            .lock()
            .iter()
            .filter(|e| e.starts_with(&prefix))
            .cloned()
            .collect()
    }

    fn push(&self, kind: &str, endpoint: &EndpointInfoModel) {
        let url = endpoint
            .registration
            .endpoint_url
            .clone()
            .unwrap_or_else(|| endpoint.registration.endpoint.url.clone());
        self.events.lock().push(format!("{kind}:{}", url.to_lowercase()));
    }
}

#[async_trait]
impl EndpointRegistryListener for RecordingEndpointListener {
    fn name(&self) -> &str {
        "recording"
    }

    async fn on_endpoint_new(
        &self,
        _context: &RegistryOperationContext,
        endpoint: &EndpointInfoModel,
    ) -> RegistryResult<()> {
        self.push("new", endpoint);
        Ok(())
    }

    async fn on_endpoint_updated(
        &self,
        _context: &RegistryOperationContext,
        endpoint: &EndpointInfoModel,
    ) -> RegistryResult<()> {
        self.push("updated", endpoint);
        Ok(())
    }

    async fn on_endpoint_enabled(
        &self,
        _context: &RegistryOperationContext,
        endpoint: &EndpointInfoModel,
    ) -> RegistryResult<()> {
        self.push("enabled", endpoint);
        Ok(())
    }

    async fn on_endpoint_disabled(
        &self,
        _context: &RegistryOperationContext,
        endpoint: &EndpointInfoModel,
    ) -> RegistryResult<()> {
        self.push("disabled", endpoint);
        Ok(())
    }

    async fn on_endpoint_activated(
        &self,
        _context: &RegistryOperationContext,
        endpoint: &EndpointInfoModel,
    ) -> RegistryResult<()> {
        self.push("activated", endpoint);
        Ok(())
    }

    async fn on_endpoint_deactivated(
        &self,
        _context: &RegistryOperationContext,
        endpoint: &EndpointInfoModel,
    ) -> RegistryResult<()> {
        self.push("deactivated", endpoint);
        Ok(())
    }

    async fn on_endpoint_deleted(
        &self,
        _context: &RegistryOperationContext,
        _endpoint_id: &str,
        endpoint: &EndpointInfoModel,
    ) -> RegistryResult<()> {
        self.push("deleted", endpoint);
        Ok(())
    }
}

/// Application listener recording `kind:application_uri` lines.
#[derive(Default)]
pub struct RecordingApplicationListener {
    events: Mutex<Vec<String>>,
}

impl RecordingApplicationListener {
    /// Creates an empty listener.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Drains the recorded events.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.events.lock())
    }

    fn push(&self, kind: &str, application: &ApplicationInfoModel) {
        self.events
            .lock()
            .push(format!("{kind}:{}", application.application_uri));
    }
}

#[async_trait]
impl ApplicationRegistryListener for RecordingApplicationListener {
    fn name(&self) -> &str {
        "recording"
    }

    async fn on_application_new(
        &self,
        _context: &RegistryOperationContext,
        application: &ApplicationInfoModel,
    ) -> RegistryResult<()> {
        self.push("new", application);
        Ok(())
    }

    async fn on_application_updated(
        &self,
        _context: &RegistryOperationContext,
        application: &ApplicationInfoModel,
    ) -> RegistryResult<()> {
        self.push("updated", application);
        Ok(())
    }

    async fn on_application_enabled(
        &self,
        _context: &RegistryOperationContext,
        application: &ApplicationInfoModel,
    ) -> RegistryResult<()> {
        self.push("enabled", application);
        Ok(())
    }

    async fn on_application_disabled(
        &self,
        _context: &RegistryOperationContext,
        application: &ApplicationInfoModel,
    ) -> RegistryResult<()> {
        self.push("disabled", application);
        Ok(())
    }

    async fn on_application_deleted(
        &self,
        _context: &RegistryOperationContext,
        _application_id: &str,
        application: &ApplicationInfoModel,
    ) -> RegistryResult<()> {
        self.push("deleted", application);
        Ok(())
    }
}

// =============================================================================
// Orchestrator Seams
// =============================================================================

/// Discoverer source returning a fixed, mutable list.
#[derive(Default)]
pub struct StaticDiscovererSource {
    discoverers: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl StaticDiscovererSource {
    /// Creates a source returning `discoverers`.
    pub fn new<I, S>(discoverers: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            discoverers: Mutex::new(discoverers.into_iter().map(Into::into).collect()),
            fail: AtomicBool::new(false),
        })
    }

    /// Replaces the list.
    pub fn set(&self, discoverers: Vec<String>) {
        *self.discoverers.lock() = discoverers;
    }

    /// Makes listing fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DiscovererSource for StaticDiscovererSource {
    async fn list_discoverers(&self) -> RegistryResult<Vec<String>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RegistryError::external("registry", "listing unavailable"));
        }
        Ok(self.discoverers.lock().clone())
    }
}

/// Discovery client recording requests and failing for chosen targets.
#[derive(Default)]
pub struct MockDiscoveryClient {
    requests: Mutex<Vec<(String, DiscoveryRequestModel)>>,
    failing: Mutex<HashSet<String>>,
}

impl MockDiscoveryClient {
    /// Creates a client that accepts every request.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes requests to `discoverer_id` fail.
    pub fn fail_for(&self, discoverer_id: &str) {
        self.failing.lock().insert(discoverer_id.to_string());
    }

    /// Recorded `(discoverer, request)` pairs.
    pub fn requests(&self) -> Vec<(String, DiscoveryRequestModel)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl DiscoveryClient for MockDiscoveryClient {
    async fn discover(
        &self,
        discoverer_id: &str,
        request: &DiscoveryRequestModel,
    ) -> RegistryResult<()> {
        self.requests
            .lock()
            .push((discoverer_id.to_string(), request.clone()));
        if self.failing.lock().contains(discoverer_id) {
            return Err(RegistryError::external(
                "discoverer",
                format!("{discoverer_id} unreachable"),
            ));
        }
        Ok(())
    }
}
