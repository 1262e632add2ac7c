//! Connection identity and session accounting.
//!
//! # Responsibilities
//! - Number accepted connections per server for log correlation
//! - Count running and total sessions (observability only, never admission control)
//! - Time each session from its first poll until its guard drops

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::observability::metrics;

/// Per-server identifier of an accepted connection, rendered as `conn-N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Counters {
    active: AtomicU64,
    total: AtomicU64,
}

/// Shared session counters. Clones observe the same counts.
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    counters: Arc<Counters>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the ID for a newly accepted connection.
    ///
    /// IDs start at 1 and follow accept order.
    pub fn next_id(&self) -> ConnectionId {
        // Relaxed is enough for `total`: it only has to hand out unique values.
        ConnectionId(self.counters.total.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Open a session slot for `id`. Dropping the guard closes it.
    pub fn track(&self, id: ConnectionId) -> SessionGuard {
        self.counters.active.fetch_add(1, Ordering::SeqCst);
        metrics::session_started();

        SessionGuard {
            counters: Arc::clone(&self.counters),
            id,
            started: Instant::now(),
        }
    }

    /// Sessions whose guard is still alive.
    pub fn active_count(&self) -> u64 {
        self.counters.active.load(Ordering::SeqCst)
    }

    /// Connections ever accepted, including refused and finished ones.
    pub fn total_count(&self) -> u64 {
        self.counters.total.load(Ordering::Relaxed)
    }
}

/// Held by a session task for its whole lifetime.
#[derive(Debug)]
pub struct SessionGuard {
    counters: Arc<Counters>,
    id: ConnectionId,
    started: Instant,
}

impl SessionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn started(&self) -> Instant {
        self.started
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.counters.active.fetch_sub(1, Ordering::SeqCst);
        metrics::session_finished();
        metrics::record_session_duration(self.started);
        tracing::trace!(
            connection_id = %self.id,
            elapsed = ?self.started.elapsed(),
            "Session released"
        );
    }
}
