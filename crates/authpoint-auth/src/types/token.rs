//! Access tokens returned by the token issuer for the implicit flow.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// An access token produced by the external token issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    /// The access token value.
    pub value: String,

    /// OpenID Connect ID token, when `id_token` was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token_value: Option<String>,

    /// Expiry instant of the access token.
    #[serde(with = "time::serde::rfc3339")]
    pub expiration: OffsetDateTime,

    /// Token type, usually `bearer`.
    pub token_type: String,

    /// Scope actually granted.
    #[serde(default)]
    pub scope: BTreeSet<String>,
}

impl IssuedToken {
    /// Creates a bearer token.
    #[must_use]
    pub fn bearer(value: impl Into<String>, expiration: OffsetDateTime) -> Self {
        Self {
            value: value.into(),
            id_token_value: None,
            expiration,
            token_type: "bearer".to_string(),
            scope: BTreeSet::new(),
        }
    }

    /// Attaches an ID token.
    #[must_use]
    pub fn with_id_token(mut self, id_token: impl Into<String>) -> Self {
        self.id_token_value = Some(id_token.into());
        self
    }

    /// Sets the granted scope.
    #[must_use]
    pub fn with_scope(mut self, scope: BTreeSet<String>) -> Self {
        self.scope = scope;
        self
    }

    /// Seconds until expiry relative to `now`, never negative.
    #[must_use]
    pub fn expires_in(&self, now: OffsetDateTime) -> i64 {
        (self.expiration - now).whole_seconds().max(0)
    }
}
