//! Session service: administrative actions on live sessions.
//!
//! Ending a session, muting and removing participants are pushed to the
//! session's connections as server-initiated events. Nothing is persisted;
//! every action works on the live registry only.

use crate::domain::connection_registry::{ParticipantSummary, SessionSummary};
use crate::domain::{BroadcastEngine, BroadcastReport, ServerEvent, SessionId};
use crate::error::GatewayError;

/// Result of removing a participant from a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovalOutcome {
    /// Connections that received the removal notice.
    pub notified: usize,
    /// Connections of the removed user that were disconnected.
    pub disconnected: usize,
}

/// Orchestration layer for session administration.
///
/// Stateless coordinator over the [`BroadcastEngine`]. Every action first
/// checks that the session has live connections, then emits its event.
#[derive(Debug, Clone)]
pub struct SessionService {
    engine: BroadcastEngine,
}

impl SessionService {
    /// Creates a new `SessionService`.
    #[must_use]
    pub fn new(engine: BroadcastEngine) -> Self {
        Self { engine }
    }

    /// Returns a reference to the inner [`BroadcastEngine`].
    #[must_use]
    pub fn engine(&self) -> &BroadcastEngine {
        &self.engine
    }

    /// Lists every session with live connections.
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        self.engine.registry().sessions().await
    }

    /// Lists the live connections of a session.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SessionNotFound`] if the session has no live
    /// connections.
    pub async fn participants(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<ParticipantSummary>, GatewayError> {
        let participants = self.engine.registry().participants(session_id).await;
        if participants.is_empty() {
            return Err(GatewayError::SessionNotFound(session_id));
        }
        Ok(participants)
    }

    /// Announces the end of a session to all of its connections.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SessionNotFound`] if the session has no live
    /// connections.
    pub async fn end_session(
        &self,
        session_id: SessionId,
    ) -> Result<BroadcastReport, GatewayError> {
        self.ensure_live(session_id).await?;
        let report = self
            .engine
            .broadcast(session_id, &ServerEvent::SessionEnded, None)
            .await;
        tracing::info!(session_id = %session_id, delivered = report.delivered, "session ended");
        Ok(report)
    }

    /// Announces that `user_id` was muted or unmuted.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SessionNotFound`] if the session has no live
    /// connections.
    pub async fn set_muted(
        &self,
        session_id: SessionId,
        user_id: i64,
        muted: bool,
    ) -> Result<BroadcastReport, GatewayError> {
        self.ensure_live(session_id).await?;
        let event = ServerEvent::ParticipantMuted { user_id, muted };
        let report = self.engine.broadcast(session_id, &event, None).await;
        tracing::info!(session_id = %session_id, user_id, muted, "participant mute changed");
        Ok(report)
    }

    /// Announces the removal of `user_id` to the whole session, then
    /// disconnects that user's connections in the session.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SessionNotFound`] if the session has no live
    /// connections.
    pub async fn remove_participant(
        &self,
        session_id: SessionId,
        user_id: i64,
    ) -> Result<RemovalOutcome, GatewayError> {
        self.ensure_live(session_id).await?;
        let event = ServerEvent::ParticipantRemoved { user_id };
        let report = self.engine.broadcast(session_id, &event, None).await;
        let disconnected = self.engine.registry().remove_user(session_id, user_id).await;
        tracing::info!(session_id = %session_id, user_id, disconnected, "participant removed");
        Ok(RemovalOutcome {
            notified: report.delivered,
            disconnected,
        })
    }

    async fn ensure_live(&self, session_id: SessionId) -> Result<(), GatewayError> {
        if self.engine.registry().contains_session(session_id).await {
            Ok(())
        } else {
            Err(GatewayError::SessionNotFound(session_id))
        }
    }
}
