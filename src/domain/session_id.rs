//! Type-safe classroom session identifier.
//!
//! [`SessionId`] wraps the integer id that appears in the WebSocket path
//! (`/ws/{session_id}`) so it cannot be confused with user ids, which are
//! also plain integers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a classroom session.
///
/// Sessions have no lifecycle object in the gateway: a session exists in
/// the [`super::ConnectionRegistry`] exactly while at least one connection
/// is joined to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(i64);

impl SessionId {
    /// Creates a `SessionId` from its raw integer value.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SessionId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl From<SessionId> for i64 {
    fn from(id: SessionId) -> Self {
        id.0
    }
}
