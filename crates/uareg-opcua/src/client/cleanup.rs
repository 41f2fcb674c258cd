// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Background session close queue.
//!
//! Sessions that are discarded (dead on checkout, failed with a transport
//! error, evicted by keep-alive) are closed off the caller's path. The queue
//! is bounded: when it is full the close is dropped and counted, and the
//! server reclaims the session on timeout. Each close is bounded by a
//! timeout so one unresponsive server cannot stall the queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::transport::SessionHandle;

/// Default bound on a single session close.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Counters of the cleanup queue.
#[derive(Debug, Default)]
pub struct CleanupStats {
    queued: AtomicU64,
    closed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

impl CleanupStats {
    /// Sessions accepted into the queue.
    pub fn queued(&self) -> u64 {
        self.queued.load(Ordering::Relaxed)
    }

    /// Sessions closed successfully.
    pub fn closed(&self) -> u64 {
        self.closed.load(Ordering::Relaxed)
    }

    /// Sessions whose close failed or timed out.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Sessions dropped because the queue was full or stopped.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Sessions processed by the worker.
    pub fn completed(&self) -> u64 {
        self.closed() + self.failed()
    }
}

/// Bounded queue of sessions to close.
pub struct CleanupQueue {
    sender: mpsc::Sender<SessionHandle>,
    stats: Arc<CleanupStats>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CleanupQueue {
    /// Creates the queue and spawns its worker on the current runtime.
    pub fn spawn(capacity: usize) -> Self {
        Self::spawn_with_timeout(capacity, DEFAULT_CLOSE_TIMEOUT)
    }

    /// Creates the queue with a custom bound on each close.
    pub fn spawn_with_timeout(capacity: usize, close_timeout: Duration) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let stats = Arc::new(CleanupStats::default());
        let worker = tokio::spawn(run_worker(receiver, Arc::clone(&stats), close_timeout));
        Self {
            sender,
            stats,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Schedules a session for closing without waiting.
    ///
    /// Returns `false` when the close was dropped.
    pub fn close(&self, session: SessionHandle) -> bool {
        let session_id = session.id().to_string();
        match self.sender.try_send(session) {
            Ok(()) => {
                self.stats.queued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(session_id = %session_id, error = %e, "Dropping session close request");
                false
            }
        }
    }

    /// Returns the queue counters.
    pub fn stats(&self) -> &CleanupStats {
        &self.stats
    }

    /// Waits up to `grace` for pending closes, then stops the worker.
    pub async fn shutdown(&self, grace: Duration) {
        let drained = tokio::time::timeout(grace, async {
            while self.stats.completed() < self.stats.queued() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        if drained.is_err() {
            warn!(
                pending = self.stats.queued() - self.stats.completed(),
                "Session cleanup did not drain before shutdown"
            );
        }
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }
    }
}

impl Drop for CleanupQueue {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<SessionHandle>,
    stats: Arc<CleanupStats>,
    close_timeout: Duration,
) {
    while let Some(session) = receiver.recv().await {
        match tokio::time::timeout(close_timeout, session.close()).await {
            Ok(Ok(())) => {
                stats.closed.fetch_add(1, Ordering::Relaxed);
                debug!(session_id = %session.id(), "Session closed");
            }
            Ok(Err(e)) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(session_id = %session.id(), error = %e, "Failed to close session");
            }
            Err(_) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    session_id = %session.id(),
                    timeout_ms = close_timeout.as_millis() as u64,
                    "Session close timed out"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockSession;

    async fn wait_completed(queue: &CleanupQueue, count: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while queue.stats().completed() < count {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("cleanup did not complete");
    }

    #[tokio::test]
    async fn test_closes_sessions_in_background() {
        let queue = CleanupQueue::spawn(4);
        let session = MockSession::new("s1");

        assert!(queue.close(session.clone()));
        wait_completed(&queue, 1).await;

        assert_eq!(session.close_count(), 1);
        assert_eq!(queue.stats().closed(), 1);
    }

    #[tokio::test]
    async fn test_close_failure_is_counted() {
        let queue = CleanupQueue::spawn(4);
        let session = MockSession::new("s1");
        session.fail_close();

        queue.close(session.clone());
        wait_completed(&queue, 1).await;

        assert_eq!(queue.stats().failed(), 1);
        assert_eq!(queue.stats().closed(), 0);
    }

    #[tokio::test]
    async fn test_hung_close_does_not_stall_queue() {
        let queue = CleanupQueue::spawn_with_timeout(4, Duration::from_millis(50));
        let hung = MockSession::new("s1");
        hung.hang_close();
        let next = MockSession::new("s2");

        assert!(queue.close(hung.clone()));
        assert!(queue.close(next.clone()));
        wait_completed(&queue, 2).await;

        assert_eq!(queue.stats().failed(), 1);
        assert_eq!(queue.stats().closed(), 1);
        assert_eq!(next.close_count(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_full_queue_rejects() {
        let queue = CleanupQueue::spawn(1);

        // The worker cannot run before the next await point.
        assert!(queue.close(MockSession::new("s1")));
        assert!(!queue.close(MockSession::new("s2")));
        assert_eq!(queue.stats().rejected(), 1);

        wait_completed(&queue, 1).await;
    }
}
