//! Session administration handlers: list, participants, end, mute, remove.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use crate::api::dto::{
    MuteParams, ParticipantListResponse, SessionActionResponse, SessionListResponse,
};
use crate::app_state::AppState;
use crate::auth::{ResolvedIdentity, bearer_token};
use crate::domain::SessionId;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /sessions` — List sessions with live connections.
#[utoipa::path(
    get,
    path = "/api/v1/sessions",
    tag = "Sessions",
    summary = "List live sessions",
    description = "Returns every live session with its connection count.",
    responses(
        (status = 200, description = "Live sessions", body = SessionListResponse),
    )
)]
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.session_service.list_sessions().await;
    let total = sessions.len();
    (
        StatusCode::OK,
        Json(SessionListResponse { sessions, total }),
    )
}

/// `GET /sessions/{session_id}/participants` — List live connections.
///
/// # Errors
///
/// Returns [`GatewayError::SessionNotFound`] if the session has no live
/// connections.
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{session_id}/participants",
    tag = "Sessions",
    summary = "List participants",
    description = "Returns the live connections of a session with their advisory identity.",
    params(("session_id" = i64, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Participants", body = ParticipantListResponse),
        (status = 404, description = "No live connections", body = ErrorResponse),
    )
)]
pub async fn list_participants(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, GatewayError> {
    let participants = state
        .session_service
        .participants(SessionId::new(session_id))
        .await?;
    Ok((
        StatusCode::OK,
        Json(ParticipantListResponse {
            session_id,
            participants,
        }),
    ))
}

/// `POST /sessions/{session_id}/end` — Announce the end of a session.
///
/// # Errors
///
/// Returns [`GatewayError`] if the caller is not a teacher or the session
/// has no live connections.
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{session_id}/end",
    tag = "Sessions",
    summary = "End a session",
    description = "Broadcasts `session-ended` to every connection of the session. Teacher only.",
    params(("session_id" = i64, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Event delivered", body = SessionActionResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller is not a teacher", body = ErrorResponse),
        (status = 404, description = "No live connections", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, GatewayError> {
    require_teacher(&state, &headers)?;
    let report = state
        .session_service
        .end_session(SessionId::new(session_id))
        .await?;
    Ok(Json(SessionActionResponse {
        ok: true,
        delivered: report.delivered,
        disconnected: None,
    }))
}

/// `POST /sessions/{session_id}/participants/{user_id}/mute` — Mute or
/// unmute a participant.
///
/// # Errors
///
/// Returns [`GatewayError`] if the caller is not a teacher or the session
/// has no live connections.
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{session_id}/participants/{user_id}/mute",
    tag = "Sessions",
    summary = "Mute a participant",
    description = "Broadcasts `participant-muted` with the new mute state. Teacher only.",
    params(
        ("session_id" = i64, Path, description = "Session identifier"),
        ("user_id" = i64, Path, description = "User to mute"),
        MuteParams,
    ),
    responses(
        (status = 200, description = "Event delivered", body = SessionActionResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller is not a teacher", body = ErrorResponse),
        (status = 404, description = "No live connections", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn mute_participant(
    State(state): State<AppState>,
    Path((session_id, user_id)): Path<(i64, i64)>,
    Query(params): Query<MuteParams>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, GatewayError> {
    require_teacher(&state, &headers)?;
    let report = state
        .session_service
        .set_muted(SessionId::new(session_id), user_id, params.mute)
        .await?;
    Ok(Json(SessionActionResponse {
        ok: true,
        delivered: report.delivered,
        disconnected: None,
    }))
}

/// `DELETE /sessions/{session_id}/participants/{user_id}` — Remove a
/// participant from a session.
///
/// # Errors
///
/// Returns [`GatewayError`] if the caller is not a teacher or the session
/// has no live connections.
#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{session_id}/participants/{user_id}",
    tag = "Sessions",
    summary = "Remove a participant",
    description = "Broadcasts `participant-removed`, then closes the user's connections.",
    params(
        ("session_id" = i64, Path, description = "Session identifier"),
        ("user_id" = i64, Path, description = "User to remove"),
    ),
    responses(
        (status = 200, description = "Participant removed", body = SessionActionResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller is not a teacher", body = ErrorResponse),
        (status = 404, description = "No live connections", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn remove_participant(
    State(state): State<AppState>,
    Path((session_id, user_id)): Path<(i64, i64)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, GatewayError> {
    require_teacher(&state, &headers)?;
    let outcome = state
        .session_service
        .remove_participant(SessionId::new(session_id), user_id)
        .await?;
    Ok(Json(SessionActionResponse {
        ok: true,
        delivered: outcome.notified,
        disconnected: Some(outcome.disconnected),
    }))
}

/// Resolves the bearer token and checks for the teacher role.
fn require_teacher(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<ResolvedIdentity, GatewayError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| GatewayError::Unauthorized("missing bearer token".to_string()))?;
    let resolved = state.identity_resolver.resolve(token)?;
    if !resolved.is_teacher() {
        return Err(GatewayError::Forbidden(
            "only teachers can administer sessions".to_string(),
        ));
    }
    Ok(resolved)
}

/// Session routes, nested under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions))
        .route(
            "/sessions/{session_id}/participants",
            get(list_participants),
        )
        .route("/sessions/{session_id}/end", post(end_session))
        .route(
            "/sessions/{session_id}/participants/{user_id}/mute",
            post(mute_participant),
        )
        .route(
            "/sessions/{session_id}/participants/{user_id}",
            delete(remove_participant),
        )
}
