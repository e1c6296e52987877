//! Connection identity and lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count live connections so shutdown can wait for them to drain

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;

use crate::observability::metrics;

/// Relaxed ordering is enough: only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Tracks live connections for graceful shutdown.
///
/// The live count is published through a watch channel, so waiting for it
/// to reach zero needs no polling.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    count_tx: watch::Sender<u64>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        let (count_tx, _) = watch::channel(0);
        Self { count_tx }
    }

    /// Record a new live connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.count_tx.send_modify(|count| *count += 1);
        metrics::connection_opened();
        ConnectionGuard {
            count_tx: self.count_tx.clone(),
            id: ConnectionId::new(),
        }
    }

    /// Get current live connection count.
    pub fn active_count(&self) -> u64 {
        *self.count_tx.borrow()
    }

    /// Wait until every tracked connection has closed, or `grace` elapses.
    ///
    /// Returns the number of connections still open when the wait ended.
    pub async fn wait_for_drain(&self, grace: Duration) -> u64 {
        let mut rx = self.count_tx.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = tokio::time::timeout(grace, rx.wait_for(|count| *count == 0)).await;
        self.active_count()
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks a connection's lifetime.
#[derive(Debug)]
pub struct ConnectionGuard {
    count_tx: watch::Sender<u64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count_tx.send_modify(|count| *count = count.saturating_sub(1));
        metrics::connection_closed();
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}
