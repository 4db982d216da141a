//! # classroom-gateway
//!
//! WebSocket fan-out gateway for live classroom sessions.
//!
//! One presenter and many listeners join a session over persistent
//! WebSocket connections and exchange audio fragments, chat, hand-raise
//! signals, questions and control commands. The gateway tracks which
//! connections belong to which session, routes every inbound message by
//! its `type` tag and broadcasts it to the right connections, pruning any
//! connection whose delivery fails.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket, HTTP)
//!     │
//!     ├── WS Handlers + Dispatcher (ws/)
//!     ├── REST Handlers (api/)
//!     │
//!     ├── SessionService (service/)
//!     │
//!     ├── BroadcastEngine (domain/)
//!     └── ConnectionRegistry (domain/)
//! ```

use axum::Router;
use axum::http::StatusCode;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod ws;

use app_state::AppState;
use config::GatewayConfig;

/// Builds the full application router: REST, WebSocket and middleware.
pub fn build_app(state: AppState, config: &GatewayConfig) -> Router {
    Router::new()
        .merge(api::build_router())
        .merge(ws::routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    config.request_timeout,
                )),
        )
        .with_state(state)
}
