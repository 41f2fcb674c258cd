// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Registry events and listener brokers.
//!
//! Every state transition of an endpoint or application registration is
//! published to the listeners registered on a broker. Notification is
//! fire-and-collect:
//!
//! - all listeners are invoked concurrently and awaited together
//! - a failing listener is logged and never blocks the others
//! - there is no ordering guarantee between listeners
//!
//! ```text
//! EndpointRegistry ──notify(ctx, EndpointEvent)──► EventBroker<dyn EndpointRegistryListener>
//!                                                   ├── listener A
//!                                                   └── listener B
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::RwLock;
use tracing::{trace, warn};

use uareg_core::models::{ApplicationInfoModel, EndpointInfoModel, RegistryOperationContext};
use uareg_core::RegistryResult;

// =============================================================================
// Events
// =============================================================================

/// A state transition of an endpoint registration.
#[derive(Debug, Clone, PartialEq)]
pub enum EndpointEvent {
    /// Endpoint registered for the first time.
    New(EndpointInfoModel),
    /// Endpoint fields changed.
    Updated(EndpointInfoModel),
    /// Endpoint enabled.
    Enabled(EndpointInfoModel),
    /// Endpoint soft-deleted.
    Disabled(EndpointInfoModel),
    /// Endpoint activated on its supervisor.
    Activated(EndpointInfoModel),
    /// Endpoint deactivated on its supervisor.
    Deactivated(EndpointInfoModel),
    /// Endpoint twin removed.
    Deleted {
        /// Twin id of the removed endpoint.
        endpoint_id: String,
        /// Last known state.
        endpoint: EndpointInfoModel,
    },
}

impl EndpointEvent {
    /// Returns the event name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::New(_) => "new",
            Self::Updated(_) => "updated",
            Self::Enabled(_) => "enabled",
            Self::Disabled(_) => "disabled",
            Self::Activated(_) => "activated",
            Self::Deactivated(_) => "deactivated",
            Self::Deleted { .. } => "deleted",
        }
    }

    /// Returns the endpoint the event concerns.
    pub fn endpoint(&self) -> &EndpointInfoModel {
        match self {
            Self::New(e)
            | Self::Updated(e)
            | Self::Enabled(e)
            | Self::Disabled(e)
            | Self::Activated(e)
            | Self::Deactivated(e) => e,
            Self::Deleted { endpoint, .. } => endpoint,
        }
    }
}

impl fmt::Display for EndpointEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.endpoint().registration.id)
    }
}

/// A state transition of an application registration.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplicationEvent {
    /// Application registered.
    New(ApplicationInfoModel),
    /// Application fields changed.
    Updated(ApplicationInfoModel),
    /// Application enabled.
    Enabled(ApplicationInfoModel),
    /// Application soft-deleted.
    Disabled(ApplicationInfoModel),
    /// Application twin removed.
    Deleted {
        /// Twin id of the removed application.
        application_id: String,
        /// Last known state.
        application: ApplicationInfoModel,
    },
}

impl ApplicationEvent {
    /// Returns the event name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::New(_) => "new",
            Self::Updated(_) => "updated",
            Self::Enabled(_) => "enabled",
            Self::Disabled(_) => "disabled",
            Self::Deleted { .. } => "deleted",
        }
    }

    /// Returns the application the event concerns.
    pub fn application(&self) -> &ApplicationInfoModel {
        match self {
            Self::New(a) | Self::Updated(a) | Self::Enabled(a) | Self::Disabled(a) => a,
            Self::Deleted { application, .. } => application,
        }
    }
}

impl fmt::Display for ApplicationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.application().application_id)
    }
}

// =============================================================================
// Listener traits
// =============================================================================

/// Receives endpoint registry events.
///
/// Every method defaults to a no-op so listeners only implement what they
/// care about.
#[async_trait]
#[allow(unused_variables)]
pub trait EndpointRegistryListener: Send + Sync {
    /// Returns the listener name for logging.
    fn name(&self) -> &str {
        "anonymous"
    }

    /// Called when an endpoint is registered.
    async fn on_endpoint_new(
        &self,
        context: &RegistryOperationContext,
        endpoint: &EndpointInfoModel,
    ) -> RegistryResult<()> {
        Ok(())
    }

    /// Called when an endpoint changed.
    async fn on_endpoint_updated(
        &self,
        context: &RegistryOperationContext,
        endpoint: &EndpointInfoModel,
    ) -> RegistryResult<()> {
        Ok(())
    }

    /// Called when an endpoint is enabled.
    async fn on_endpoint_enabled(
        &self,
        context: &RegistryOperationContext,
        endpoint: &EndpointInfoModel,
    ) -> RegistryResult<()> {
        Ok(())
    }

    /// Called when an endpoint is disabled.
    async fn on_endpoint_disabled(
        &self,
        context: &RegistryOperationContext,
        endpoint: &EndpointInfoModel,
    ) -> RegistryResult<()> {
        Ok(())
    }

    /// Called when an endpoint is activated.
    async fn on_endpoint_activated(
        &self,
        context: &RegistryOperationContext,
        endpoint: &EndpointInfoModel,
    ) -> RegistryResult<()> {
        Ok(())
    }

    /// Called when an endpoint is deactivated.
    async fn on_endpoint_deactivated(
        &self,
        context: &RegistryOperationContext,
        endpoint: &EndpointInfoModel,
    ) -> RegistryResult<()> {
        Ok(())
    }

    /// Called when an endpoint twin is removed.
    async fn on_endpoint_deleted(
        &self,
        context: &RegistryOperationContext,
        endpoint_id: &str,
        endpoint: &EndpointInfoModel,
    ) -> RegistryResult<()> {
        Ok(())
    }
}

/// Receives application registry events.
#[async_trait]
#[allow(unused_variables)]
pub trait ApplicationRegistryListener: Send + Sync {
    /// Returns the listener name for logging.
    fn name(&self) -> &str {
        "anonymous"
    }

    /// Called when an application is registered.
    async fn on_application_new(
        &self,
        context: &RegistryOperationContext,
        application: &ApplicationInfoModel,
    ) -> RegistryResult<()> {
        Ok(())
    }

    /// Called when an application changed.
    async fn on_application_updated(
        &self,
        context: &RegistryOperationContext,
        application: &ApplicationInfoModel,
    ) -> RegistryResult<()> {
        Ok(())
    }

    /// Called when an application is enabled.
    async fn on_application_enabled(
        &self,
        context: &RegistryOperationContext,
        application: &ApplicationInfoModel,
    ) -> RegistryResult<()> {
        Ok(())
    }

    /// Called when an application is disabled.
    async fn on_application_disabled(
        &self,
        context: &RegistryOperationContext,
        application: &ApplicationInfoModel,
    ) -> RegistryResult<()> {
        Ok(())
    }

    /// Called when an application twin is removed.
    async fn on_application_deleted(
        &self,
        context: &RegistryOperationContext,
        application_id: &str,
        application: &ApplicationInfoModel,
    ) -> RegistryResult<()> {
        Ok(())
    }
}

// =============================================================================
// EventBroker
// =============================================================================

/// Handle returned by [`EventBroker::register`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A set of listeners notified together.
pub struct EventBroker<L: ?Sized> {
    listeners: RwLock<Vec<(ListenerId, Arc<L>)>>,
    next_id: AtomicU64,
}

/// Broker for endpoint events.
pub type EndpointEventBroker = EventBroker<dyn EndpointRegistryListener>;

/// Broker for application events.
pub type ApplicationEventBroker = EventBroker<dyn ApplicationRegistryListener>;

impl<L: ?Sized> EventBroker<L> {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a listener.
    pub fn register(&self, listener: Arc<L>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    fn snapshot(&self) -> Vec<Arc<L>> {
        self.listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }
}

impl<L: ?Sized> Default for EventBroker<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ?Sized> fmt::Debug for EventBroker<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBroker")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl EventBroker<dyn EndpointRegistryListener> {
    /// Notifies every listener of an endpoint event.
    pub async fn notify(&self, context: &RegistryOperationContext, event: &EndpointEvent) {
        let listeners = self.snapshot();
        trace!(event = %event, listeners = listeners.len(), "Notifying endpoint listeners");
        let results = join_all(listeners.iter().map(|listener| async move {
            let result = dispatch_endpoint(listener.as_ref(), context, event).await;
            (listener.name().to_string(), result)
        }))
        .await;
        for (listener, result) in results {
            if let Err(e) = result {
                warn!(
                    listener = %listener,
                    event = %event,
                    error = %e,
                    "Endpoint listener failed"
                );
            }
        }
    }
}

async fn dispatch_endpoint(
    listener: &dyn EndpointRegistryListener,
    context: &RegistryOperationContext,
    event: &EndpointEvent,
) -> RegistryResult<()> {
    match event {
        EndpointEvent::New(e) => listener.on_endpoint_new(context, e).await,
        EndpointEvent::Updated(e) => listener.on_endpoint_updated(context, e).await,
        EndpointEvent::Enabled(e) => listener.on_endpoint_enabled(context, e).await,
        EndpointEvent::Disabled(e) => listener.on_endpoint_disabled(context, e).await,
        EndpointEvent::Activated(e) => listener.on_endpoint_activated(context, e).await,
        EndpointEvent::Deactivated(e) => listener.on_endpoint_deactivated(context, e).await,
        EndpointEvent::Deleted {
            endpoint_id,
            endpoint,
        } => listener.on_endpoint_deleted(context, endpoint_id, endpoint).await,
    }
}

impl EventBroker<dyn ApplicationRegistryListener> {
    /// Notifies every listener of an application event.
    pub async fn notify(&self, context: &RegistryOperationContext, event: &ApplicationEvent) {
        let listeners = self.snapshot();
        trace!(event = %event, listeners = listeners.len(), "Notifying application listeners");
        let results = join_all(listeners.iter().map(|listener| async move {
            let result = dispatch_application(listener.as_ref(), context, event).await;
            (listener.name().to_string(), result)
        }))
        .await;
        for (listener, result) in results {
            if let Err(e) = result {
                warn!(
                    listener = %listener,
                    event = %event,
                    error = %e,
                    "Application listener failed"
                );
            }
        }
    }
}

async fn dispatch_application(
    listener: &dyn ApplicationRegistryListener,
    context: &RegistryOperationContext,
    event: &ApplicationEvent,
) -> RegistryResult<()> {
    match event {
        ApplicationEvent::New(a) => listener.on_application_new(context, a).await,
        ApplicationEvent::Updated(a) => listener.on_application_updated(context, a).await,
        ApplicationEvent::Enabled(a) => listener.on_application_enabled(context, a).await,
        ApplicationEvent::Disabled(a) => listener.on_application_disabled(context, a).await,
        ApplicationEvent::Deleted {
            application_id,
            application,
        } => {
            listener
                .on_application_deleted(context, application_id, application)
                .await
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use uareg_core::RegistryError;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl EndpointRegistryListener for Recorder {
        async fn on_endpoint_disabled(
            &self,
            _context: &RegistryOperationContext,
            endpoint: &EndpointInfoModel,
        ) -> RegistryResult<()> {
            self.seen.lock().push(endpoint.registration.id.clone());
            if self.fail {
                return Err(RegistryError::external("listener", "boom"));
            }
            Ok(())
        }
    }

    fn endpoint(id: &str) -> EndpointInfoModel {
        let mut model = EndpointInfoModel::default();
        model.registration.id = id.to_string();
        model
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_block_others() {
        let broker = EndpointEventBroker::new();
        let failing = Arc::new(Recorder {
            fail: true,
            ..Default::default()
        });
        let healthy = Arc::new(Recorder::default());
        broker.register(failing.clone());
        broker.register(healthy.clone());

        let context = RegistryOperationContext::now(None);
        broker
            .notify(&context, &EndpointEvent::Disabled(endpoint("uat1")))
            .await;

        assert_eq!(*failing.seen.lock(), vec!["uat1".to_string()]);
        assert_eq!(*healthy.seen.lock(), vec!["uat1".to_string()]);
    }

    #[tokio::test]
    async fn test_unregister() {
        let broker = EndpointEventBroker::new();
        let recorder = Arc::new(Recorder::default());
        let id = broker.register(recorder.clone());
        assert!(broker.unregister(id));
        assert!(!broker.unregister(id));
        assert_eq!(broker.listener_count(), 0);

        broker
            .notify(
                &RegistryOperationContext::now(None),
                &EndpointEvent::Disabled(endpoint("uat1")),
            )
            .await;
        assert!(recorder.seen.lock().is_empty());
    }

    #[test]
    fn test_event_display() {
        let event = EndpointEvent::Deleted {
            endpoint_id: "uat1".into(),
            endpoint: endpoint("uat1"),
        };
        assert_eq!(event.to_string(), "deleted(uat1)");
        assert_eq!(event.kind(), "deleted");
    }
}
