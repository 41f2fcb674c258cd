// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Keyed pool of idle sessions.
//!
//! The pool is a cache, not a gate: `checkout` never blocks and never
//! creates. An empty slot, or a dead session at the head of the slot, both
//! mean "no session available" and the caller creates a new one.
//!
//! ```text
//! SessionKey ──▶ [ idle, idle, idle ]   FIFO
//!                  ▲ checkout     ▲ checkin
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::cleanup::CleanupQueue;
use super::session_key::SessionKey;
use super::transport::SessionHandle;

/// Pool of idle sessions keyed by [`SessionKey`].
pub struct SessionPool {
    slots: DashMap<SessionKey, VecDeque<SessionHandle>>,
    cleanup: Arc<CleanupQueue>,
}

impl SessionPool {
    /// Creates an empty pool closing discarded sessions through `cleanup`.
    pub fn new(cleanup: Arc<CleanupQueue>) -> Self {
        Self {
            slots: DashMap::new(),
            cleanup,
        }
    }

    /// Takes the oldest idle session for `key`.
    ///
    /// A dequeued session that is no longer connected is handed to the
    /// cleanup queue and `None` is returned without looking further.
    pub fn checkout(&self, key: &SessionKey) -> Option<SessionHandle> {
        let session = self.slots.get_mut(key)?.pop_front()?;
        if session.is_connected() {
            return Some(session);
        }
        debug!(session_id = %session.id(), endpoint = %key, "Discarding disconnected pooled session");
        self.cleanup.close(session);
        None
    }

    /// Returns a session to the pool.
    pub fn checkin(&self, key: &SessionKey, session: SessionHandle) {
        self.slots.entry(key.clone()).or_default().push_back(session);
    }

    /// Removes a specific session from the pool.
    ///
    /// Returns the session if it was idle in the pool.
    pub fn evict(&self, key: &SessionKey, session_id: &str) -> Option<SessionHandle> {
        let mut slot = self.slots.get_mut(key)?;
        let position = slot.iter().position(|session| session.id() == session_id)?;
        slot.remove(position)
    }

    /// Number of idle sessions for `key`.
    pub fn idle(&self, key: &SessionKey) -> usize {
        self.slots.get(key).map(|slot| slot.len()).unwrap_or(0)
    }

    /// Number of idle sessions across all keys.
    pub fn total_idle(&self) -> usize {
        self.slots.iter().map(|slot| slot.len()).sum()
    }

    /// Removes every idle session and schedules it for closing.
    ///
    /// Returns the number of sessions drained.
    pub fn drain(&self) -> usize {
        let mut drained = 0;
        for mut slot in self.slots.iter_mut() {
            for session in slot.drain(..) {
                self.cleanup.close(session);
                drained += 1;
            }
        }
        self.slots.clear();
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockSession;
    use crate::types::ServerEndpoint;

    fn key(url: &str) -> SessionKey {
        SessionKey::new(&ServerEndpoint::new(url))
    }

    #[tokio::test]
    async fn test_checkout_empty_returns_none() {
        let pool = SessionPool::new(Arc::new(CleanupQueue::spawn(4)));
        assert!(pool.checkout(&key("opc.tcp://a:4840")).is_none());
    }

    #[tokio::test]
    async fn test_checkin_then_checkout_is_fifo() {
        let pool = SessionPool::new(Arc::new(CleanupQueue::spawn(4)));
        let k = key("opc.tcp://a:4840");
        pool.checkin(&k, MockSession::new("s1"));
        pool.checkin(&k, MockSession::new("s2"));

        assert_eq!(pool.idle(&k), 2);
        assert_eq!(pool.checkout(&k).unwrap().id(), "s1");
        assert_eq!(pool.checkout(&k).unwrap().id(), "s2");
        assert!(pool.checkout(&k).is_none());
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let pool = SessionPool::new(Arc::new(CleanupQueue::spawn(4)));
        pool.checkin(&key("opc.tcp://a:4840"), MockSession::new("s1"));
        assert!(pool.checkout(&key("opc.tcp://b:4840")).is_none());
        assert_eq!(pool.total_idle(), 1);
    }

    #[tokio::test]
    async fn test_disconnected_session_is_discarded_not_skipped() {
        let cleanup = Arc::new(CleanupQueue::spawn(4));
        let pool = SessionPool::new(Arc::clone(&cleanup));
        let k = key("opc.tcp://a:4840");
        let dead = MockSession::new("dead");
        dead.disconnect();
        pool.checkin(&k, dead.clone());
        pool.checkin(&k, MockSession::new("alive"));

        assert!(pool.checkout(&k).is_none());
        assert_eq!(cleanup.stats().queued(), 1);
        assert_eq!(pool.checkout(&k).unwrap().id(), "alive");
    }

    #[tokio::test]
    async fn test_evict_by_id() {
        let pool = SessionPool::new(Arc::new(CleanupQueue::spawn(4)));
        let k = key("opc.tcp://a:4840");
        pool.checkin(&k, MockSession::new("s1"));
        pool.checkin(&k, MockSession::new("s2"));

        assert_eq!(pool.evict(&k, "s2").unwrap().id(), "s2");
        assert!(pool.evict(&k, "s2").is_none());
        assert_eq!(pool.idle(&k), 1);
    }

    #[tokio::test]
    async fn test_drain_schedules_close() {
        let cleanup = Arc::new(CleanupQueue::spawn(8));
        let pool = SessionPool::new(Arc::clone(&cleanup));
        pool.checkin(&key("opc.tcp://a:4840"), MockSession::new("s1"));
        pool.checkin(&key("opc.tcp://b:4840"), MockSession::new("s2"));

        assert_eq!(pool.drain(), 2);
        assert_eq!(pool.total_idle(), 0);
        assert_eq!(cleanup.stats().queued(), 2);
    }
}
