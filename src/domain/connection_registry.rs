//! Session membership registry.
//!
//! [`ConnectionRegistry`] is the single source of truth for which live
//! connections are joined to which session. It keeps two indexes under one
//! process-wide [`tokio::sync::RwLock`]:
//!
//! - `SessionId -> HashSet<ConnectionId>` for membership, and
//! - `ConnectionId -> ConnectionEntry` holding the outbound handle and the
//!   attached identity.
//!
//! Both indexes are only ever mutated together inside one write guard, so a
//! session entry exists iff its connection set is non-empty and a
//! connection id is never present under two sessions.
//!
//! Removing a connection, for whatever reason, cancels its eviction token so
//! the task driving that connection stops at once.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use super::{ConnectionId, Identity, SessionId};
use crate::error::GatewayError;

/// An already-serialized outbound text frame, shared between all
/// recipients of one broadcast.
pub type Frame = Arc<str>;

/// Reason a frame could not be handed to a connection's outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// The connection's writer is gone.
    Closed,
    /// The outbox is full; the peer is not draining its socket.
    Overflow,
}

/// Sending half of a connection's outbound queue.
///
/// The matching [`mpsc::Receiver`] is drained by the connection's socket
/// writer. Dropping every clone of the handle ends that writer.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbox: mpsc::Sender<Frame>,
    evicted: CancellationToken,
}

impl ConnectionHandle {
    /// Creates a handle with a fresh [`ConnectionId`] and a bounded outbox
    /// of `capacity` frames (at least one).
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (outbox, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id: ConnectionId::new(),
            outbox,
            evicted: CancellationToken::new(),
        };
        (handle, rx)
    }

    /// Returns the connection id.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the token cancelled when the connection leaves the registry.
    #[must_use]
    pub fn eviction(&self) -> CancellationToken {
        self.evicted.clone()
    }

    /// Enqueues a frame without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryFailure`] when the writer is gone or the outbox is
    /// full.
    pub fn try_deliver(&self, frame: &Frame) -> Result<(), DeliveryFailure> {
        self.outbox
            .try_send(Arc::clone(frame))
            .map_err(|err| match err {
                mpsc::error::TrySendError::Closed(_) => DeliveryFailure::Closed,
                mpsc::error::TrySendError::Full(_) => DeliveryFailure::Overflow,
            })
    }
}

/// Live connection count for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SessionSummary {
    /// Session identifier.
    #[schema(value_type = i64)]
    pub session_id: SessionId,
    /// Number of live connections joined to the session.
    pub connections: usize,
}

/// One live connection of a session, as exposed to administrators.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ParticipantSummary {
    /// Connection identifier.
    #[schema(value_type = String, format = Uuid)]
    pub connection_id: ConnectionId,
    /// Display name, `"Unknown"` until announced.
    pub name: String,
    /// Role label, `"student"` until announced.
    pub role: String,
    /// Authenticated user id, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    /// When the connection was registered.
    pub connected_at: DateTime<Utc>,
}

#[derive(Debug)]
struct ConnectionEntry {
    session_id: SessionId,
    handle: ConnectionHandle,
    identity: Option<Identity>,
    connected_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct RegistryState {
    sessions: HashMap<SessionId, HashSet<ConnectionId>>,
    connections: HashMap<ConnectionId, ConnectionEntry>,
}

impl RegistryState {
    /// Removes one connection from both indexes and cancels its eviction
    /// token. Returns `false` if the connection is not registered under
    /// `session_id`.
    fn remove(&mut self, session_id: SessionId, connection_id: ConnectionId) -> bool {
        match self.connections.get(&connection_id) {
            Some(entry) if entry.session_id == session_id => {}
            _ => return false,
        }
        if let Some(entry) = self.connections.remove(&connection_id) {
            entry.handle.evicted.cancel();
        }
        if let Entry::Occupied(mut members) = self.sessions.entry(session_id) {
            members.get_mut().remove(&connection_id);
            if members.get().is_empty() {
                members.remove();
            }
        }
        true
    }
}

/// Registry of live connections grouped by session.
///
/// # Concurrency
///
/// Every operation takes the single registry lock for the duration of its
/// bookkeeping only. No method awaits anything but the lock itself, and no
/// frame is ever sent while the lock is held.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    state: RwLock<RegistryState>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `handle` to `session_id`, creating the session entry if absent.
    ///
    /// Registering the same connection twice under the same session is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ConnectionConflict`] if the connection is
    /// already registered under a different session.
    pub async fn register(
        &self,
        session_id: SessionId,
        handle: ConnectionHandle,
    ) -> Result<(), GatewayError> {
        let connection_id = handle.id();
        let mut state = self.state.write().await;

        if let Some(existing) = state.connections.get(&connection_id) {
            if existing.session_id == session_id {
                return Ok(());
            }
            return Err(GatewayError::ConnectionConflict {
                connection_id,
                session_id: existing.session_id,
            });
        }

        state.connections.insert(
            connection_id,
            ConnectionEntry {
                session_id,
                handle,
                identity: None,
                connected_at: Utc::now(),
            },
        );
        let members = state.sessions.entry(session_id).or_default();
        members.insert(connection_id);

        tracing::debug!(
            session_id = %session_id,
            connection_id = %connection_id,
            listeners = members.len(),
            "connection registered"
        );
        Ok(())
    }

    /// Removes a connection and its identity from `session_id`, dropping the
    /// session entry when it becomes empty.
    ///
    /// Returns `false` (and changes nothing) if the connection is not
    /// registered under that session.
    pub async fn unregister(&self, session_id: SessionId, connection_id: ConnectionId) -> bool {
        let mut state = self.state.write().await;
        let removed = state.remove(session_id, connection_id);
        if removed {
            tracing::debug!(
                session_id = %session_id,
                connection_id = %connection_id,
                session_open = state.sessions.contains_key(&session_id),
                "connection unregistered"
            );
        }
        removed
    }

    /// Removes every listed connection of `session_id` under one write
    /// guard. Returns how many were actually removed.
    pub async fn unregister_many(
        &self,
        session_id: SessionId,
        connection_ids: &[ConnectionId],
    ) -> usize {
        if connection_ids.is_empty() {
            return 0;
        }
        let mut state = self.state.write().await;
        connection_ids
            .iter()
            .filter(|id| state.remove(session_id, **id))
            .count()
    }

    /// Returns a snapshot of the live connections of `session_id`, or an
    /// empty list if the session has no entry.
    pub async fn listeners(&self, session_id: SessionId) -> Vec<ConnectionHandle> {
        let state = self.state.read().await;
        state
            .sessions
            .get(&session_id)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|id| state.connections.get(id))
                    .map(|entry| entry.handle.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the handle of a single registered connection.
    pub async fn handle(
        &self,
        connection_id: ConnectionId,
    ) -> Option<(SessionId, ConnectionHandle)> {
        let state = self.state.read().await;
        state
            .connections
            .get(&connection_id)
            .map(|entry| (entry.session_id, entry.handle.clone()))
    }

    /// Stores `identity` for a connection, replacing any previous one.
    ///
    /// Returns `false` if the connection is not registered.
    pub async fn attach_identity(&self, connection_id: ConnectionId, identity: Identity) -> bool {
        let mut state = self.state.write().await;
        match state.connections.get_mut(&connection_id) {
            Some(entry) => {
                entry.identity = Some(identity);
                true
            }
            None => false,
        }
    }

    /// Returns the identity attached to a connection, or the default
    /// `Unknown`/`student` identity if none is attached.
    pub async fn identity(&self, connection_id: ConnectionId) -> Identity {
        let state = self.state.read().await;
        state
            .connections
            .get(&connection_id)
            .and_then(|entry| entry.identity.clone())
            .unwrap_or_default()
    }

    /// Removes the identity attached to a connection, if any.
    pub async fn detach_identity(&self, connection_id: ConnectionId) {
        let mut state = self.state.write().await;
        if let Some(entry) = state.connections.get_mut(&connection_id) {
            entry.identity = None;
        }
    }

    /// Unregisters every connection of `session_id` whose identity carries
    /// `user_id`. Returns the number of connections removed.
    pub async fn remove_user(&self, session_id: SessionId, user_id: i64) -> usize {
        let mut state = self.state.write().await;
        let targets: Vec<ConnectionId> = state
            .sessions
            .get(&session_id)
            .into_iter()
            .flatten()
            .filter(|id| {
                state
                    .connections
                    .get(*id)
                    .and_then(|entry| entry.identity.as_ref())
                    .is_some_and(|identity| identity.user_id == Some(user_id))
            })
            .copied()
            .collect();
        targets
            .iter()
            .filter(|id| state.remove(session_id, **id))
            .count()
    }

    /// Returns `true` if `session_id` has at least one live connection.
    pub async fn contains_session(&self, session_id: SessionId) -> bool {
        self.state.read().await.sessions.contains_key(&session_id)
    }

    /// Returns the number of sessions with live connections.
    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    /// Returns the total number of live connections across all sessions.
    pub async fn total_connections(&self) -> usize {
        self.state.read().await.connections.len()
    }

    /// Returns the number of live connections in `session_id`.
    pub async fn connection_count(&self, session_id: SessionId) -> usize {
        self.state
            .read()
            .await
            .sessions
            .get(&session_id)
            .map_or(0, HashSet::len)
    }

    /// Returns a summary of every live session, ordered by session id.
    pub async fn sessions(&self) -> Vec<SessionSummary> {
        let state = self.state.read().await;
        let mut summaries: Vec<SessionSummary> = state
            .sessions
            .iter()
            .map(|(session_id, members)| SessionSummary {
                session_id: *session_id,
                connections: members.len(),
            })
            .collect();
        summaries.sort_by_key(|summary| summary.session_id);
        summaries
    }

    /// Returns the live connections of `session_id`, oldest first.
    pub async fn participants(&self, session_id: SessionId) -> Vec<ParticipantSummary> {
        let state = self.state.read().await;
        let mut participants: Vec<ParticipantSummary> = state
            .sessions
            .get(&session_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.connections.get(id).map(|entry| (id, entry)))
            .map(|(id, entry)| {
                let identity = entry.identity.clone().unwrap_or_default();
                ParticipantSummary {
                    connection_id: *id,
                    name: identity.name,
                    role: identity.role,
                    user_id: identity.user_id,
                    connected_at: entry.connected_at,
                }
            })
            .collect();
        participants.sort_by_key(|p| p.connected_at);
        participants
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    async fn join(
        registry: &ConnectionRegistry,
        session: i64,
    ) -> (ConnectionHandle, mpsc::Receiver<Frame>) {
        let (handle, rx) = ConnectionHandle::channel(8);
        let registered = registry.register(SessionId::new(session), handle.clone());
        let Ok(()) = registered.await else {
            panic!("registration failed");
        };
        (handle, rx)
    }

    #[tokio::test]
    async fn register_creates_session_entry() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.contains_session(SessionId::new(1)).await);

        let (handle, _rx) = join(&registry, 1).await;

        assert!(registry.contains_session(SessionId::new(1)).await);
        let listeners = registry.listeners(SessionId::new(1)).await;
        assert_eq!(listeners.len(), 1);
        assert_eq!(
            listeners.first().map(ConnectionHandle::id),
            Some(handle.id())
        );
    }

    #[tokio::test]
    async fn register_same_connection_twice_is_noop() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = join(&registry, 1).await;

        let again = registry.register(SessionId::new(1), handle).await;
        assert!(again.is_ok());
        assert_eq!(registry.connection_count(SessionId::new(1)).await, 1);
    }

    #[tokio::test]
    async fn register_under_second_session_is_rejected() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = join(&registry, 1).await;

        let result = registry.register(SessionId::new(2), handle).await;
        assert!(matches!(
            result,
            Err(GatewayError::ConnectionConflict { session_id, .. })
                if session_id == SessionId::new(1)
        ));
        assert!(!registry.contains_session(SessionId::new(2)).await);
    }

    #[tokio::test]
    async fn last_unregister_drops_session_entry() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = join(&registry, 9).await;
        let (b, _rx_b) = join(&registry, 9).await;

        assert!(registry.unregister(SessionId::new(9), a.id()).await);
        assert!(registry.contains_session(SessionId::new(9)).await);

        assert!(registry.unregister(SessionId::new(9), b.id()).await);
        assert!(!registry.contains_session(SessionId::new(9)).await);
        assert!(registry.listeners(SessionId::new(9)).await.is_empty());
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test]
    async fn unregister_absent_connection_is_noop() {
        let registry = ConnectionRegistry::new();
        let (a, _rx) = join(&registry, 3).await;
        let stranger = ConnectionId::new();

        assert!(!registry.unregister(SessionId::new(3), stranger).await);
        assert!(!registry.unregister(SessionId::new(4), a.id()).await);
        assert!(registry.unregister(SessionId::new(3), a.id()).await);
        assert!(!registry.unregister(SessionId::new(3), a.id()).await);
    }

    #[tokio::test]
    async fn identity_defaults_until_attached() {
        let registry = ConnectionRegistry::new();
        let (a, _rx) = join(&registry, 1).await;

        assert_eq!(registry.identity(a.id()).await, Identity::default());

        let alice = Identity::new("Alice", "teacher");
        assert!(registry.attach_identity(a.id(), alice).await);
        assert_eq!(registry.identity(a.id()).await.name, "Alice");

        let alicia = Identity::new("Alicia", "student");
        assert!(registry.attach_identity(a.id(), alicia).await);
        assert_eq!(registry.identity(a.id()).await.name, "Alicia");

        registry.detach_identity(a.id()).await;
        assert_eq!(registry.identity(a.id()).await, Identity::default());
    }

    #[tokio::test]
    async fn unregister_detaches_identity() {
        let registry = ConnectionRegistry::new();
        let (a, _rx) = join(&registry, 1).await;
        let alice = Identity::new("Alice", "teacher");
        registry.attach_identity(a.id(), alice.clone()).await;

        registry.unregister(SessionId::new(1), a.id()).await;

        assert_eq!(registry.identity(a.id()).await, Identity::default());
        assert!(!registry.attach_identity(a.id(), alice).await);
    }

    #[tokio::test]
    async fn remove_user_only_touches_matching_identities() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = join(&registry, 5).await;
        let (b, _rx_b) = join(&registry, 5).await;
        let (c, _rx_c) = join(&registry, 6).await;
        let student = |user_id| Identity::authenticated(user_id, "student");
        registry.attach_identity(a.id(), student(11)).await;
        registry.attach_identity(b.id(), student(12)).await;
        registry.attach_identity(c.id(), student(11)).await;

        assert_eq!(registry.remove_user(SessionId::new(5), 11).await, 1);
        assert_eq!(registry.connection_count(SessionId::new(5)).await, 1);
        assert_eq!(registry.connection_count(SessionId::new(6)).await, 1);
        assert_eq!(registry.remove_user(SessionId::new(5), 99).await, 0);
    }

    #[tokio::test]
    async fn dropping_registry_entry_closes_outbox() {
        let registry = ConnectionRegistry::new();
        let (handle, mut rx) = ConnectionHandle::channel(4);
        let id = handle.id();
        let _ = registry.register(SessionId::new(1), handle).await;

        registry.unregister(SessionId::new(1), id).await;

        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn removal_cancels_eviction_token() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = join(&registry, 1).await;
        let (b, _rx_b) = join(&registry, 1).await;
        let student = Identity::authenticated(7, "student");
        registry.attach_identity(b.id(), student).await;

        assert!(!a.eviction().is_cancelled());
        assert!(!registry.unregister(SessionId::new(2), a.id()).await);
        assert!(!a.eviction().is_cancelled());

        registry.unregister(SessionId::new(1), a.id()).await;
        assert!(a.eviction().is_cancelled());

        registry.remove_user(SessionId::new(1), 7).await;
        assert!(b.eviction().is_cancelled());
    }

    #[tokio::test]
    async fn sessions_are_listed_in_order() {
        let registry = ConnectionRegistry::new();
        let _a = join(&registry, 8).await;
        let _b = join(&registry, 2).await;
        let _c = join(&registry, 8).await;

        let sessions = registry.sessions().await;
        assert_eq!(
            sessions,
            vec![
                SessionSummary {
                    session_id: SessionId::new(2),
                    connections: 1
                },
                SessionSummary {
                    session_id: SessionId::new(8),
                    connections: 2
                },
            ]
        );
        assert_eq!(registry.total_connections().await, 3);
    }

    #[tokio::test]
    async fn participants_report_attached_identity() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = join(&registry, 1).await;
        let (_b, _rx_b) = join(&registry, 1).await;
        let alice = Identity::new("Alice", "teacher");
        registry.attach_identity(a.id(), alice).await;

        let participants = registry.participants(SessionId::new(1)).await;
        let listed = |name: &str, role: &str| {
            participants
                .iter()
                .any(|p| p.name == name && p.role == role)
        };
        assert_eq!(participants.len(), 2);
        assert!(listed("Alice", "teacher"));
        assert!(listed("Unknown", "student"));
    }

    #[tokio::test]
    async fn concurrent_churn_leaves_no_empty_sessions() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut tasks = Vec::new();
        for i in 0..32_i64 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                let session = SessionId::new(i % 4);
                let (handle, _rx) = ConnectionHandle::channel(1);
                let id = handle.id();
                let _ = registry.register(session, handle).await;
                let _ = registry.listeners(session).await;
                registry.unregister(session, id).await
            }));
        }
        for task in tasks {
            let Ok(removed) = task.await else {
                panic!("task panicked");
            };
            assert!(removed);
        }
        assert_eq!(registry.session_count().await, 0);
        assert_eq!(registry.total_connections().await, 0);
    }

    #[test]
    fn try_deliver_reports_overflow_and_closed() {
        let (handle, rx) = ConnectionHandle::channel(1);
        let frame: Frame = Arc::from("{}");
        assert_eq!(handle.try_deliver(&frame), Ok(()));
        assert_eq!(handle.try_deliver(&frame), Err(DeliveryFailure::Overflow));
        drop(rx);
        assert_eq!(handle.try_deliver(&frame), Err(DeliveryFailure::Closed));
    }
}
