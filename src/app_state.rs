//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::{IdentityResolver, StaticTokenResolver};
use crate::config::GatewayConfig;
use crate::domain::{BroadcastEngine, ConnectionRegistry};
use crate::service::SessionService;
use crate::ws::connection::ConnectionSettings;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Fan-out engine and, through it, the connection registry.
    pub engine: BroadcastEngine,
    /// Session administration.
    pub session_service: Arc<SessionService>,
    /// Resolves credential tokens for the control channel and admin routes.
    pub identity_resolver: Arc<dyn IdentityResolver>,
    /// Per-connection tuning.
    pub connection_settings: ConnectionSettings,
}

impl AppState {
    /// Wires a fresh registry, engine and service around `resolver`.
    #[must_use]
    pub fn new(
        resolver: Arc<dyn IdentityResolver>,
        connection_settings: ConnectionSettings,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = BroadcastEngine::new(registry);
        let session_service = Arc::new(SessionService::new(engine.clone()));
        Self {
            engine,
            session_service,
            identity_resolver: resolver,
            connection_settings,
        }
    }

    /// Builds the state described by `config`, using the static token
    /// table as identity resolver.
    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Self {
        let resolver = StaticTokenResolver::new(config.auth_tokens.clone());
        Self::new(
            Arc::new(resolver),
            ConnectionSettings {
                outbox_capacity: config.outbox_capacity,
                idle_timeout: config.idle_timeout,
            },
        )
    }
}
