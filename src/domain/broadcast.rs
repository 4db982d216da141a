//! Session fan-out with self-healing cleanup.
//!
//! [`BroadcastEngine`] serializes an event once, takes a listener snapshot
//! from the [`ConnectionRegistry`], releases the registry lock and only then
//! enqueues the frame on each connection's outbox. Connections whose outbox
//! rejects the frame are unregistered after the sweep.

use std::sync::Arc;

use super::connection_registry::{DeliveryFailure, Frame};
use super::{ConnectionId, ConnectionRegistry, ServerEvent, SessionId};
use crate::error::GatewayError;

/// Outcome of one broadcast sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections the frame was enqueued for.
    pub delivered: usize,
    /// Connections removed because delivery failed.
    pub pruned: usize,
}

/// Delivers [`ServerEvent`]s to the connections of a session.
///
/// Cheap to clone; all clones share the same registry.
#[derive(Debug, Clone)]
pub struct BroadcastEngine {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastEngine {
    /// Creates an engine over `registry`.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Returns the underlying registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Sends `event` to every live connection of `session_id` except
    /// `exclude`.
    ///
    /// A failed delivery never interrupts the sweep; every failed connection
    /// is unregistered once the sweep completes. A session without
    /// listeners yields an empty report.
    pub async fn broadcast(
        &self,
        session_id: SessionId,
        event: &ServerEvent,
        exclude: Option<ConnectionId>,
    ) -> BroadcastReport {
        let frame = match encode(event) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::error!(session_id = %session_id, error = %err, "failed to encode event");
                return BroadcastReport::default();
            }
        };

        let listeners = self.registry.listeners(session_id).await;
        let mut report = BroadcastReport::default();
        let mut dead = Vec::new();

        for handle in listeners.iter().filter(|h| Some(h.id()) != exclude) {
            match handle.try_deliver(&frame) {
                Ok(()) => report.delivered += 1,
                Err(failure) => {
                    tracing::debug!(
                        session_id = %session_id,
                        connection_id = %handle.id(),
                        failure = ?failure,
                        "delivery failed, pruning connection"
                    );
                    dead.push(handle.id());
                }
            }
        }

        report.pruned = self.registry.unregister_many(session_id, &dead).await;

        tracing::trace!(
            session_id = %session_id,
            event = event.type_tag(),
            delivered = report.delivered,
            pruned = report.pruned,
            "broadcast complete"
        );
        report
    }

    /// Sends `event` to a single connection through its outbox, so the
    /// reply stays ordered with broadcasts to the same connection.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ConnectionClosed`] if the connection is not
    /// registered or its outbox rejects the frame; in the latter case the
    /// connection is unregistered. Returns [`GatewayError::Internal`] if the
    /// event cannot be serialized.
    pub async fn send_to(
        &self,
        connection_id: ConnectionId,
        event: &ServerEvent,
    ) -> Result<(), GatewayError> {
        let frame = encode(event)?;
        let Some((session_id, handle)) = self.registry.handle(connection_id).await else {
            return Err(GatewayError::ConnectionClosed(connection_id));
        };

        if let Err(failure) = handle.try_deliver(&frame) {
            if failure == DeliveryFailure::Overflow {
                tracing::warn!(connection_id = %connection_id, "outbox full on direct reply");
            }
            self.registry.unregister(session_id, connection_id).await;
            return Err(GatewayError::ConnectionClosed(connection_id));
        }
        Ok(())
    }
}

/// Serializes an event into a shareable text frame.
fn encode(event: &ServerEvent) -> Result<Frame, GatewayError> {
    serde_json::to_string(event)
        .map(Frame::from)
        .map_err(|err| GatewayError::Internal(format!("event serialization: {err}")))
}
