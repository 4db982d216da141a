//! Session administration DTOs.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::connection_registry::{ParticipantSummary, SessionSummary};

/// Response body of `GET /api/v1/sessions`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionListResponse {
    /// Sessions with at least one live connection.
    pub sessions: Vec<SessionSummary>,
    /// Number of sessions listed.
    pub total: usize,
}

/// Response body of `GET /api/v1/sessions/{session_id}/participants`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ParticipantListResponse {
    /// Session identifier.
    pub session_id: i64,
    /// Live connections, oldest first.
    pub participants: Vec<ParticipantSummary>,
}

/// Response body of the administrative session actions.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionActionResponse {
    /// Always `true` on success.
    pub ok: bool,
    /// Connections the resulting event was delivered to.
    pub delivered: usize,
    /// Connections closed by the action, for removals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disconnected: Option<usize>,
}

/// Query parameters of the mute endpoint.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MuteParams {
    /// `true` to mute, `false` to unmute. Defaults to `true`.
    #[serde(default = "default_mute")]
    pub mute: bool,
}

fn default_mute() -> bool {
    true
}
