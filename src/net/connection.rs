//! Upgrade session tracking.
//!
//! # Responsibilities
//! - Generate unique session IDs for tracing
//! - Count live relays
//! - Log each session's lifetime when it ends

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::observability::metrics;
use crate::proxy::Target;

/// Unique identifier for one upgraded client ↔ backend pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "relay-{}", self.0)
    }
}

/// Counts live relays across the gateway.
#[derive(Debug, Clone, Default)]
pub struct RelayTracker {
    active: Arc<AtomicU64>,
}

impl RelayTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session. The returned guard closes it on drop.
    pub fn open(&self, target: Target, path: impl Into<String>) -> SessionGuard {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_active_relays(active);

        let guard = SessionGuard {
            active: Arc::clone(&self.active),
            id: SessionId::new(),
            target,
            path: path.into(),
            opened: Instant::now(),
        };
        tracing::debug!(session = %guard.id, backend = %target, path = %guard.path, "Relay opened");
        guard
    }

    pub fn active_count(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }
}

/// One live upgrade session. Dropping it marks the session closed.
#[derive(Debug)]
pub struct SessionGuard {
    active: Arc<AtomicU64>,
    id: SessionId,
    target: Target,
    path: String,
    opened: Instant,
}

impl SessionGuard {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn target(&self) -> Target {
        self.target
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let remaining = self.active.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::set_active_relays(remaining);
        tracing::debug!(
            session = %self.id,
            backend = %self.target,
            path = %self.path,
            duration_ms = self.opened.elapsed().as_millis() as u64,
            "Relay closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn tracker_counts_sessions() {
        let tracker = RelayTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let first = tracker.open(Target::LocalDesktop, "/x");
        let second = tracker.open(Target::TaskApi, "/socket.io/");
        assert_eq!(tracker.active_count(), 2);
        assert_eq!(second.target(), Target::TaskApi);

        drop(first);
        assert_eq!(tracker.active_count(), 1);
        drop(second);
        assert_eq!(tracker.active_count(), 0);
    }
}
