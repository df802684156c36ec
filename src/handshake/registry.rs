//! In-flight handshake bookkeeping
//!
//! Correlation itself is structural (the waiter reads its own channel), so
//! this registry never routes messages. It enforces one outstanding
//! handshake per connection and counts live sessions. Entries are keyed by
//! [`ConnectionId`] and removed by guards on every exit path, including task
//! cancellation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use crate::channel::ConnectionId;
use crate::identity::PublicIdentifier;
use crate::types::{KeyholeError, Result};

/// A handshake waiting for its challenge response
#[derive(Debug, Clone)]
pub struct PendingHandshake {
    pub public_identifier: PublicIdentifier,
    pub started_at: Instant,
}

/// Registry of pending handshakes and live sessions
#[derive(Debug, Default)]
pub struct HandshakeRegistry {
    pending: DashMap<ConnectionId, PendingHandshake>,
    sessions: AtomicUsize,
}

impl HandshakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a handshake as in flight on `id`.
    ///
    /// Fails if one is already pending there; the existing entry is kept.
    pub fn begin(
        self: &Arc<Self>,
        id: ConnectionId,
        public_identifier: PublicIdentifier,
    ) -> Result<PendingGuard> {
        match self.pending.entry(id) {
            Entry::Occupied(_) => Err(KeyholeError::ProtocolViolation(
                "handshake already in progress on this connection".to_string(),
            )),
            Entry::Vacant(slot) => {
                slot.insert(PendingHandshake {
                    public_identifier,
                    started_at: Instant::now(),
                });
                debug!(connection = %id, "Handshake registered");
                Ok(PendingGuard {
                    registry: Arc::clone(self),
                    id,
                })
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self, id: &ConnectionId) -> bool {
        self.pending.contains_key(id)
    }

    #[cfg(test)]
    pub(crate) fn get(&self, id: &ConnectionId) -> Option<PendingHandshake> {
        self.pending.get(id).map(|entry| entry.clone())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// How long the longest-waiting handshake has been pending
    pub fn oldest_pending_age(&self) -> Option<Duration> {
        self.pending
            .iter()
            .map(|entry| entry.started_at.elapsed())
            .max()
    }

    /// Count a live session until the guard drops
    pub fn open_session(self: &Arc<Self>) -> SessionGuard {
        self.sessions.fetch_add(1, Ordering::Relaxed);
        SessionGuard {
            registry: Arc::clone(self),
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.load(Ordering::Relaxed)
    }
}

/// Removes its pending entry on drop
#[derive(Debug)]
pub struct PendingGuard {
    registry: Arc<HandshakeRegistry>,
    id: ConnectionId,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if let Some((_, pending)) = self.registry.pending.remove(&self.id) {
            debug!(
                connection = %self.id,
                identifier = %pending.public_identifier,
                held_ms = pending.started_at.elapsed().as_millis() as u64,
                "Handshake released"
            );
        }
    }
}

/// Decrements the live session count on drop
#[derive(Debug)]
pub struct SessionGuard {
    registry: Arc<HandshakeRegistry>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.sessions.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pk(s: &str) -> PublicIdentifier {
        PublicIdentifier::new(s)
    }

    #[test]
    fn test_guard_releases_entry() {
        let registry = Arc::new(HandshakeRegistry::new());
        let id = ConnectionId::new();

        let guard = registry.begin(id, pk("alice")).unwrap();
        assert!(registry.is_pending(&id));
        assert_eq!(registry.get(&id).unwrap().public_identifier, pk("alice"));

        drop(guard);
        assert!(!registry.is_pending(&id));
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn test_second_begin_rejected_and_first_kept() {
        let registry = Arc::new(HandshakeRegistry::new());
        let id = ConnectionId::new();

        let _first = registry.begin(id, pk("alice")).unwrap();
        let second = registry.begin(id, pk("mallory"));
        assert!(matches!(second, Err(KeyholeError::ProtocolViolation(_))));

        // The pending handshake was not overwritten
        assert_eq!(registry.get(&id).unwrap().public_identifier, pk("alice"));
    }

    #[test]
    fn test_connections_are_independent() {
        let registry = Arc::new(HandshakeRegistry::new());
        let a = ConnectionId::new();
        let b = ConnectionId::new();

        let _ga = registry.begin(a, pk("alice")).unwrap();
        let gb = registry.begin(b, pk("bob")).unwrap();
        assert_eq!(registry.pending_count(), 2);

        drop(gb);
        assert!(registry.is_pending(&a));
        assert!(!registry.is_pending(&b));
    }

    #[tokio::test(start_paused = true)]
    async fn test_oldest_pending_age() {
        let registry = Arc::new(HandshakeRegistry::new());
        assert_eq!(registry.oldest_pending_age(), None);

        let first = registry.begin(ConnectionId::new(), pk("alice")).unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        let _second = registry.begin(ConnectionId::new(), pk("bob")).unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(registry.oldest_pending_age(), Some(Duration::from_secs(15)));

        drop(first);
        assert_eq!(registry.oldest_pending_age(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_session_count() {
        let registry = Arc::new(HandshakeRegistry::new());
        let s1 = registry.open_session();
        let s2 = registry.open_session();
        assert_eq!(registry.active_sessions(), 2);
        drop(s1);
        drop(s2);
        assert_eq!(registry.active_sessions(), 0);
    }
}
