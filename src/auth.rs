//! Identity resolution for authenticated connections and admin routes.
//!
//! The gateway does not issue or verify credentials itself. It hands the
//! token it received to an [`IdentityResolver`] and trusts the answer. The
//! bundled [`StaticTokenResolver`] serves a fixed token table loaded from
//! configuration; deployments with a real identity provider plug in their
//! own implementation.

use std::collections::HashMap;
use std::fmt;

use crate::domain::Identity;
use crate::error::GatewayError;

/// Identity returned by a successful credential check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    /// Authenticated user id.
    pub user_id: i64,
    /// Role of the user, conventionally `"teacher"` or `"student"`.
    pub role: String,
}

impl ResolvedIdentity {
    /// Returns `true` if the role is `teacher` (case-insensitive).
    #[must_use]
    pub fn is_teacher(&self) -> bool {
        self.role.eq_ignore_ascii_case("teacher")
    }
}

impl From<ResolvedIdentity> for Identity {
    fn from(resolved: ResolvedIdentity) -> Self {
        Self::authenticated(resolved.user_id, resolved.role)
    }
}

/// Resolves an opaque credential token into a user identity.
pub trait IdentityResolver: Send + Sync + fmt::Debug {
    /// Resolves `token`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthorized`] if the token is not valid.
    fn resolve(&self, token: &str) -> Result<ResolvedIdentity, GatewayError>;
}

/// Resolver backed by a fixed `token -> identity` table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenResolver {
    tokens: HashMap<String, ResolvedIdentity>,
}

impl StaticTokenResolver {
    /// Creates a resolver over the given table.
    #[must_use]
    pub fn new(tokens: HashMap<String, ResolvedIdentity>) -> Self {
        Self { tokens }
    }

    /// Returns the number of known tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if no token is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl IdentityResolver for StaticTokenResolver {
    fn resolve(&self, token: &str) -> Result<ResolvedIdentity, GatewayError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| GatewayError::Unauthorized("invalid token".to_string()))
    }
}

/// Parses a token table of the form `token=user_id:role,token2=user_id:role`.
///
/// Whitespace around entries is ignored and empty entries are skipped.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] naming the first entry that does
/// not match the expected shape.
pub fn parse_token_table(raw: &str) -> Result<HashMap<String, ResolvedIdentity>, GatewayError> {
    let mut tokens = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let invalid = || GatewayError::InvalidRequest(format!("invalid token entry `{entry}`"));
        let (token, grant) = entry.split_once('=').ok_or_else(invalid)?;
        let (user_id, role) = grant.split_once(':').ok_or_else(invalid)?;
        let user_id: i64 = user_id.trim().parse().map_err(|_| invalid())?;
        let token = token.trim();
        let role = role.trim();
        if token.is_empty() || role.is_empty() {
            return Err(invalid());
        }
        tokens.insert(
            token.to_string(),
            ResolvedIdentity {
                user_id,
                role: role.to_string(),
            },
        );
    }
    Ok(tokens)
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
#[must_use]
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    let is_bearer = scheme.eq_ignore_ascii_case("bearer") && !token.is_empty();
    is_bearer.then_some(token)
}
