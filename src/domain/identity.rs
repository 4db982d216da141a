//! Advisory identity attached to a connection.
//!
//! On the classroom channel the identity is self-declared through a
//! `user_info` message and carries no trust guarantee. On the control
//! channel it comes from the identity resolver and includes a user id.

use serde::Serialize;
use utoipa::ToSchema;

/// Display name used when a connection never announced itself.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Role assumed when a connection never announced one.
pub const DEFAULT_ROLE: &str = "student";

/// Display name, role and optional user id of a connection.
///
/// The role is free-form: any string is accepted and stored as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Identity {
    /// Display name shown to other participants.
    pub name: String,
    /// Role label, conventionally `"teacher"` or `"student"`.
    pub role: String,
    /// Authenticated user id, present only for resolver-admitted connections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

impl Identity {
    /// Creates a self-declared identity without a user id.
    #[must_use]
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            user_id: None,
        }
    }

    /// Creates an identity for an authenticated user. The user id doubles
    /// as the display name.
    #[must_use]
    pub fn authenticated(user_id: i64, role: impl Into<String>) -> Self {
        Self {
            name: user_id.to_string(),
            role: role.into(),
            user_id: Some(user_id),
        }
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::new(UNKNOWN_NAME, DEFAULT_ROLE)
    }
}
