//! Axum WebSocket upgrade handlers.

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use super::connection::{Channel, run_connection};
use crate::app_state::AppState;
use crate::domain::{Identity, SessionId};
use crate::error::GatewayError;

/// Query string of the control channel.
#[derive(Debug, Deserialize)]
pub struct ControlQuery {
    /// Credential token resolved by the identity resolver.
    pub token: Option<String>,
}

/// `GET /ws/{session_id}` — Join the classroom channel of a session.
pub async fn classroom_ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<i64>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let engine = state.engine.clone();
    let settings = state.connection_settings;

    ws.on_upgrade(move |socket| {
        run_connection(
            socket,
            SessionId::new(session_id),
            Channel::Classroom,
            None,
            engine,
            settings,
        )
    })
}

/// `GET /ws/{session_id}/control?token=...` — Join the authenticated
/// control channel of a session.
///
/// The token is resolved before the connection is registered. A missing or
/// rejected token closes the socket with code 1008 (policy violation).
pub async fn control_ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<i64>,
    Query(query): Query<ControlQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let session_id = SessionId::new(session_id);
    let admission = match query.token.as_deref() {
        Some(token) => state.identity_resolver.resolve(token),
        None => Err(GatewayError::Unauthorized("missing token".to_string())),
    };
    let engine = state.engine.clone();
    let settings = state.connection_settings;

    ws.on_upgrade(move |socket| async move {
        match admission {
            Ok(resolved) => {
                let user_id = resolved.user_id;
                run_connection(
                    socket,
                    session_id,
                    Channel::Control { user_id },
                    Some(Identity::from(resolved)),
                    engine,
                    settings,
                )
                .await;
            }
            Err(err) => {
                tracing::warn!(
                    session_id = %session_id,
                    error = %err,
                    "control channel admission refused"
                );
                reject(socket, &err).await;
            }
        }
    })
}

/// Closes an unadmitted socket with a policy-violation close frame.
async fn reject(mut socket: WebSocket, err: &GatewayError) {
    let frame = CloseFrame {
        code: close_code::POLICY,
        reason: err.to_string().into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}
