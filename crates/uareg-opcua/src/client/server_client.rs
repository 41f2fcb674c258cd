// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session pooling client facade.
//!
//! [`OpcUaServerClient::execute_service`] runs a unit of work against a live
//! session to a target endpoint:
//!
//! ```text
//!            ┌──────────────┐  idle   ┌──────────────┐
//!  execute ─▶│ pool.checkout│────────▶│  unit of work │──ok──▶ checkin ─▶ result
//!            └──────┬───────┘         └──────┬───────┘
//!                   │ none                   │ err
//!                   ▼                        ▼
//!            ┌──────────────┐        transport kind? ──yes, first──▶ close, loop
//!            │create_session│               │ yes, second ─▶ close, error
//!            └──────────────┘               │ no ─▶ checkin if connected, error
//! ```
//!
//! Session creation failures are returned immediately. Transport failures
//! of the unit of work get exactly one retry on a fresh session.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::cleanup::CleanupQueue;
use super::connect::{rewrite_localhost, select_endpoint};
use super::pool::SessionPool;
use super::session_key::SessionKey;
use super::transport::{KeepAliveHandler, SessionFactory, SessionHandle, SessionOptions};
use crate::error::{status, OpcUaError, OpcUaResult};
use crate::types::{ClientSettings, EndpointDescription, ServerEndpoint};

// =============================================================================
// ClientStats
// =============================================================================

#[derive(Debug, Default)]
struct ClientStats {
    sessions_created: AtomicU64,
    sessions_reused: AtomicU64,
    sessions_discarded: AtomicU64,
    sessions_evicted: AtomicU64,
    create_failures: AtomicU64,
    retries: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time client statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientStatsSnapshot {
    /// Sessions opened.
    pub sessions_created: u64,
    /// Calls served by a pooled session.
    pub sessions_reused: u64,
    /// Sessions closed after a transport failure.
    pub sessions_discarded: u64,
    /// Idle sessions evicted by a bad keep-alive.
    pub sessions_evicted: u64,
    /// Session creations that failed.
    pub create_failures: u64,
    /// Calls retried on a fresh session.
    pub retries: u64,
    /// Calls that returned an error.
    pub failures: u64,
    /// Idle sessions in the pool.
    pub idle_sessions: u64,
}

// =============================================================================
// OpcUaServerClient
// =============================================================================

/// Client facade pooling sessions to OPC UA servers.
pub struct OpcUaServerClient {
    factory: Arc<dyn SessionFactory>,
    settings: ClientSettings,
    pool: Arc<SessionPool>,
    cleanup: Arc<CleanupQueue>,
    stats: Arc<ClientStats>,
    uses_proxy: bool,
}

impl OpcUaServerClient {
    /// Creates the client. Must be called within a tokio runtime.
    pub fn new(factory: Arc<dyn SessionFactory>, settings: ClientSettings) -> Self {
        let cleanup = Arc::new(CleanupQueue::spawn_with_timeout(
            settings.cleanup_queue_capacity,
            settings.connect_timeout,
        ));
        let pool = Arc::new(SessionPool::new(Arc::clone(&cleanup)));

        let uses_proxy = if settings.use_reverse_proxy && !factory.supports_reverse_proxy() {
            warn!("Reverse proxy connection configured but the OPC stack only connects directly");
            false
        } else {
            settings.use_reverse_proxy
        };
        if uses_proxy {
            info!("OPC stack with reverse proxy connection to shop floor");
        } else {
            info!("OPC stack with direct connection to shop floor servers");
        }

        Self {
            factory,
            settings,
            pool,
            cleanup,
            stats: Arc::new(ClientStats::default()),
            uses_proxy,
        }
    }

    /// Returns `true` when connections go through the reverse proxy.
    #[inline]
    pub fn uses_proxy(&self) -> bool {
        self.uses_proxy
    }

    /// Returns the client settings.
    #[inline]
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Returns the session pool.
    #[inline]
    pub fn pool(&self) -> &SessionPool {
        &self.pool
    }

    /// Returns the cleanup queue.
    #[inline]
    pub fn cleanup(&self) -> &CleanupQueue {
        &self.cleanup
    }

    /// Returns a snapshot of the client statistics.
    pub fn stats(&self) -> ClientStatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        ClientStatsSnapshot {
            sessions_created: load(&self.stats.sessions_created),
            sessions_reused: load(&self.stats.sessions_reused),
            sessions_discarded: load(&self.stats.sessions_discarded),
            sessions_evicted: load(&self.stats.sessions_evicted),
            create_failures: load(&self.stats.create_failures),
            retries: load(&self.stats.retries),
            failures: load(&self.stats.failures),
            idle_sessions: self.pool.total_idle() as u64,
        }
    }

    /// Discovers the endpoints of a server without opening a session.
    pub async fn try_connect(
        &self,
        endpoint: &ServerEndpoint,
    ) -> OpcUaResult<Vec<EndpointDescription>> {
        validate(endpoint)?;
        let (endpoints, _) = self.discover(endpoint).await?;
        Ok(endpoints)
    }

    /// Runs `service` against a pooled or new session to `endpoint`.
    pub async fn execute_service<T, F, Fut>(
        &self,
        endpoint: &ServerEndpoint,
        service: F,
    ) -> OpcUaResult<T>
    where
        F: Fn(SessionHandle) -> Fut + Send + Sync,
        Fut: Future<Output = OpcUaResult<T>> + Send,
        T: Send,
    {
        validate(endpoint)?;
        let key = SessionKey::new(endpoint);
        let mut retry = true;

        loop {
            let session = match self.pool.checkout(&key) {
                Some(session) => {
                    self.stats.sessions_reused.fetch_add(1, Ordering::Relaxed);
                    session
                }
                None => match self.create_session(&key, endpoint).await {
                    Ok(session) => session,
                    Err(e) => {
                        self.stats.create_failures.fetch_add(1, Ordering::Relaxed);
                        self.stats.failures.fetch_add(1, Ordering::Relaxed);
                        debug!(endpoint = %key, error = %e, "Failed to create session");
                        return Err(e);
                    }
                },
            };

            match service(Arc::clone(&session)).await {
                Ok(result) => {
                    self.pool.checkin(&key, session);
                    return Ok(result);
                }
                Err(e) if e.is_retryable() => {
                    self.stats.sessions_discarded.fetch_add(1, Ordering::Relaxed);
                    self.cleanup.close(session);
                    if !retry {
                        self.stats.failures.fetch_add(1, Ordering::Relaxed);
                        error!(endpoint = %key, kind = %e.kind(), error = %e, "Communication error during service call");
                        return Err(e);
                    }
                    retry = false;
                    self.stats.retries.fetch_add(1, Ordering::Relaxed);
                    warn!(endpoint = %key, kind = %e.kind(), error = %e, "Retrying service call with a new session");
                }
                Err(e) => {
                    if session.is_connected() {
                        self.pool.checkin(&key, session);
                    } else {
                        self.cleanup.close(session);
                    }
                    self.stats.failures.fetch_add(1, Ordering::Relaxed);
                    error!(endpoint = %key, kind = %e.kind(), error = %e, "Application error during service call");
                    return Err(e);
                }
            }
        }
    }

    /// Closes all idle sessions and waits for pending closes.
    pub async fn shutdown(&self, grace: Duration) {
        let drained = self.pool.drain();
        info!(sessions = drained, "Closing pooled sessions");
        self.cleanup.shutdown(grace).await;
    }

    // =========================================================================
    // Session Creation
    // =========================================================================

    async fn discover(
        &self,
        endpoint: &ServerEndpoint,
    ) -> OpcUaResult<(Vec<EndpointDescription>, bool)> {
        let have_certificate = self.factory.ensure_application_certificate().await?;
        if !have_certificate {
            warn!(endpoint = %endpoint.url, "Missing application certificate, using unsecured connection");
        }
        let mut endpoints = self
            .factory
            .get_endpoints(&endpoint.url, self.settings.connect_timeout)
            .await?;
        rewrite_localhost(&mut endpoints, &endpoint.url);
        Ok((endpoints, have_certificate))
    }

    async fn create_session(
        &self,
        key: &SessionKey,
        endpoint: &ServerEndpoint,
    ) -> OpcUaResult<SessionHandle> {
        let (endpoints, have_certificate) = self.discover(endpoint).await?;
        let selected = select_endpoint(&endpoints, have_certificate)
            .cloned()
            .ok_or_else(|| OpcUaError::connection("Unable to select secure endpoint"))?;

        let session_id = Arc::new(OnceLock::new());
        let keep_alive = self.keep_alive_handler(key.clone(), Arc::clone(&session_id));
        let options = SessionOptions {
            endpoint: selected,
            identity: endpoint.identity.clone(),
            session_name: Uuid::new_v4().to_string(),
            timeout: self.settings.connect_timeout,
            keep_alive_interval: self.settings.keep_alive_interval,
            accept_untrusted: endpoint.accepts_untrusted(),
        };
        let security_mode = options.endpoint.security_mode;
        let security_policy = options.endpoint.security_policy_uri.clone();

        let session = self.factory.open_session(options, keep_alive).await?;
        let _ = session_id.set(session.id().to_string());
        self.stats.sessions_created.fetch_add(1, Ordering::Relaxed);
        info!(
            endpoint = %key,
            session_id = %session.id(),
            security_mode = %security_mode,
            security_policy = %security_policy,
            "Session created"
        );
        Ok(session)
    }

    /// Evicts the session from the pool and closes it on a bad keep-alive.
    ///
    /// A session that is checked out is left to fail its unit of work.
    fn keep_alive_handler(
        &self,
        key: SessionKey,
        session_id: Arc<OnceLock<String>>,
    ) -> KeepAliveHandler {
        let pool: Weak<SessionPool> = Arc::downgrade(&self.pool);
        let cleanup = Arc::clone(&self.cleanup);
        let stats = Arc::clone(&self.stats);
        Arc::new(move |status_code| {
            if !status::is_bad(status_code) {
                return;
            }
            let (Some(pool), Some(id)) = (pool.upgrade(), session_id.get()) else {
                return;
            };
            if let Some(session) = pool.evict(&key, id) {
                warn!(
                    endpoint = %key,
                    session_id = %id,
                    status = %format!("0x{:08X}", status_code),
                    "Keep-alive failed, evicting session"
                );
                stats.sessions_evicted.fetch_add(1, Ordering::Relaxed);
                cleanup.close(session);
            }
        })
    }
}

fn validate(endpoint: &ServerEndpoint) -> OpcUaResult<()> {
    if endpoint.url.trim().is_empty() {
        return Err(OpcUaError::argument("endpoint.url", "must not be empty"));
    }
    Ok(())
}
