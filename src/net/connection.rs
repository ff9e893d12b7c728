//! Connection ids and live-session accounting.
//!
//! # Responsibilities
//! - Hand out `conn-N` ids for the `connection` log span
//! - Count live sessions and sessions accepted since start
//! - Give the slot back when a session task ends, on any path

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique id of one client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Counters {
    live: AtomicU64,
    accepted: AtomicU64,
}

/// Shared session counters. Clones observe the same numbers.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    counters: Arc<Counters>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session for `peer`. The slot is held until the guard drops.
    pub fn track(&self, peer: SocketAddr) -> ConnectionGuard {
        self.counters.live.fetch_add(1, Ordering::SeqCst);
        self.counters.accepted.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard {
            counters: Arc::clone(&self.counters),
            id: ConnectionId::new(),
            peer,
            opened: Instant::now(),
        }
    }

    /// Sessions currently running.
    pub fn active_count(&self) -> u64 {
        self.counters.live.load(Ordering::SeqCst)
    }

    /// Sessions accepted since the tracker was created.
    pub fn total_accepted(&self) -> u64 {
        self.counters.accepted.load(Ordering::Relaxed)
    }
}

/// A live session's claim on the tracker.
#[derive(Debug)]
pub struct ConnectionGuard {
    counters: Arc<Counters>,
    id: ConnectionId,
    peer: SocketAddr,
    opened: Instant,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let live = self.counters.live.fetch_sub(1, Ordering::SeqCst) - 1;
        tracing::debug!(
            connection_id = %self.id,
            peer_addr = %self.peer,
            duration_ms = self.opened.elapsed().as_millis() as u64,
            live,
            "Connection released"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test]
    fn ids_increase_and_format() {
        let first = ConnectionId::new();
        let second = ConnectionId::default();
        assert!(second > first);
        assert_eq!(first.to_string(), format!("conn-{}", first.0));
    }

    #[test]
    fn guards_release_their_slot() {
        let tracker = ConnectionTracker::new();
        let a = tracker.track(peer());
        let b = tracker.clone().track(peer());
        assert_eq!(tracker.active_count(), 2);
        assert_ne!(a.id(), b.id());

        drop(a);
        assert_eq!(tracker.active_count(), 1);
        drop(b);
        assert_eq!(tracker.active_count(), 0);
        assert_eq!(tracker.total_accepted(), 2);
    }
}
