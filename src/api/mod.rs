//! REST API layer: route handlers, DTOs, OpenAPI document and router
//! composition.
//!
//! Resource endpoints are mounted under `/api/v1`; system endpoints at the
//! root.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::app_state::AppState;
use crate::domain::Identity;
use crate::domain::connection_registry::{ParticipantSummary, SessionSummary};
use crate::error::{ErrorBody, ErrorResponse};

/// OpenAPI document for the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "classroom-gateway",
        description = "WebSocket fan-out gateway for live classroom sessions"
    ),
    paths(
        handlers::system::health_handler,
        handlers::session::list_sessions,
        handlers::session::list_participants,
        handlers::session::end_session,
        handlers::session::mute_participant,
        handlers::session::remove_participant,
    ),
    components(schemas(
        handlers::system::HealthResponse,
        dto::SessionListResponse,
        dto::ParticipantListResponse,
        dto::SessionActionResponse,
        SessionSummary,
        ParticipantSummary,
        Identity,
        ErrorResponse,
        ErrorBody,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "System", description = "Health and service metadata"),
        (name = "Sessions", description = "Live session administration"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` security scheme used by the admin endpoints.
#[derive(Debug)]
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}
