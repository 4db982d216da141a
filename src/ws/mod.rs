//! WebSocket layer: admission, per-connection driver, message routing.
//!
//! Two endpoints share one connection registry:
//!
//! - `/ws/{session_id}` — the classroom channel, identity self-declared
//!   through `user_info`.
//! - `/ws/{session_id}/control?token=...` — the authenticated control
//!   channel supporting `chat` and `ping`.

pub mod connection;
pub mod control;
pub mod dispatcher;
pub mod handler;
pub mod messages;

use axum::Router;
use axum::routing::get;

use crate::app_state::AppState;

/// Builds the WebSocket routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ws/{session_id}", get(handler::classroom_ws_handler))
        .route("/ws/{session_id}/control", get(handler::control_ws_handler))
}
