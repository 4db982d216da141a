//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//! On the WebSocket side the same variants classify connection-level
//! failures; they are never surfaced to other participants.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{ConnectionId, SessionId};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "session not found: 7",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see ranges on [`GatewayError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request              |
/// | 2000–2999 | State/Not Found | 404 / 409 / 410              |
/// | 3000–3999 | Server          | 500 Internal Server Error    |
/// | 4000–4999 | Access          | 401 Unauthorized / 403       |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Inbound WebSocket frame is not a well-formed message.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Credential missing or not recognised.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Credential valid but the role does not permit the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// No live connections exist for the session.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// The connection is already registered under another session.
    #[error("connection {connection_id} already belongs to session {session_id}")]
    ConnectionConflict {
        /// Connection that was registered twice.
        connection_id: ConnectionId,
        /// Session the connection already belongs to.
        session_id: SessionId,
    },

    /// The target connection is gone.
    #[error("connection closed: {0}")]
    ConnectionClosed(ConnectionId),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::MalformedMessage(_) => 1002,
            Self::SessionNotFound(_) => 2001,
            Self::ConnectionConflict { .. } => 2002,
            Self::ConnectionClosed(_) => 2003,
            Self::Internal(_) => 3000,
            Self::Unauthorized(_) => 4001,
            Self::Forbidden(_) => 4003,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::MalformedMessage(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::ConnectionConflict { .. } => StatusCode::CONFLICT,
            Self::ConnectionClosed(_) => StatusCode::GONE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_category() {
        let malformed = GatewayError::MalformedMessage("x".into());
        assert_eq!(malformed.status_code(), StatusCode::BAD_REQUEST);

        let missing = GatewayError::SessionNotFound(SessionId::new(1));
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let forbidden = GatewayError::Forbidden("students cannot end sessions".into());
        assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn into_response_carries_status() {
        let err = GatewayError::Unauthorized("missing token".into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn malformed_message_text_is_client_facing() {
        let err = GatewayError::MalformedMessage("expected a JSON object".into());
        assert_eq!(err.to_string(), "Malformed message: expected a JSON object");
    }
}
