//! Registered client domain types.
//!
//! Client registrations are owned by an external store; this module only
//! models the fields the authorization endpoint reads.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::util::glob::GlobPattern;

// =============================================================================
// Grant Type
// =============================================================================

/// Grant type selected for an authorization request.
///
/// Only the redirect-based flows are ever derived at the authorization
/// endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization Code flow. Responses are delivered in the query.
    AuthorizationCode,
    /// Implicit flow. Responses are delivered in the fragment.
    Implicit,
}

impl GrantType {
    /// Returns the OAuth 2.0 grant_type value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::Implicit => "implicit",
        }
    }

    /// Returns `true` if responses for this grant type travel in the
    /// URI fragment rather than the query.
    #[must_use]
    pub fn uses_fragment(&self) -> bool {
        matches!(self, Self::Implicit)
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Registered Client
// =============================================================================

/// A client registration as seen by the authorization endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClient {
    /// Unique client identifier used in OAuth flows.
    pub client_id: String,

    /// Registered redirect URIs. Absolute URIs or scheme-only URIs such as
    /// `myapp:/callback`.
    #[serde(default)]
    pub registered_redirect_uris: BTreeSet<String>,

    /// Grant types this client may use, as raw strings.
    #[serde(default)]
    pub authorized_grant_types: BTreeSet<String>,

    /// Scopes this client may request. Empty means any scope.
    #[serde(default)]
    pub scopes: BTreeSet<String>,

    /// Glob patterns (`*` wildcard) of scopes approved without asking the
    /// user.
    #[serde(default)]
    pub auto_approve_scopes: Vec<String>,
}

impl RegisteredClient {
    /// Creates a client with no redirect URIs, grants or scopes.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// Adds a registered redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.registered_redirect_uris.insert(uri.into());
        self
    }

    /// Adds an authorized grant type.
    #[must_use]
    pub fn with_grant_type(mut self, grant_type: impl Into<String>) -> Self {
        self.authorized_grant_types.insert(grant_type.into());
        self
    }

    /// Adds an allowed scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.insert(scope.into());
        self
    }

    /// Adds an auto-approve scope pattern.
    #[must_use]
    pub fn with_auto_approve(mut self, pattern: impl Into<String>) -> Self {
        self.auto_approve_scopes.push(pattern.into());
        self
    }

    /// Validates the client registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the registration cannot be used at the
    /// authorization endpoint.
    pub fn validate(&self) -> Result<(), ClientValidationError> {
        if self.client_id.is_empty() {
            return Err(ClientValidationError::EmptyClientId);
        }

        if self.authorized_grant_types.is_empty() {
            return Err(ClientValidationError::NoGrantTypes);
        }

        let redirect_based = [GrantType::AuthorizationCode, GrantType::Implicit]
            .iter()
            .any(|g| self.is_grant_type_allowed(*g));
        if redirect_based && self.registered_redirect_uris.is_empty() {
            return Err(ClientValidationError::NoRedirectUris);
        }

        for pattern in &self.auto_approve_scopes {
            GlobPattern::new(pattern)
                .map_err(|_| ClientValidationError::InvalidAutoApprovePattern(pattern.clone()))?;
        }

        Ok(())
    }

    /// Checks if the client may use the given grant type.
    #[must_use]
    pub fn is_grant_type_allowed(&self, grant_type: GrantType) -> bool {
        self.authorized_grant_types.contains(grant_type.as_str())
    }

    /// Checks if the given scope may be requested by this client.
    ///
    /// An empty scopes list means all scopes are allowed.
    #[must_use]
    pub fn is_scope_allowed(&self, scope: &str) -> bool {
        self.scopes.is_empty() || self.scopes.contains(scope)
    }

    /// Returns `true` if every requested scope matches one of the client's
    /// auto-approve patterns.
    ///
    /// An empty request is never auto-approved, and neither is a client
    /// without patterns. Unparseable patterns match nothing.
    #[must_use]
    pub fn is_auto_approved<'a>(&self, scopes: impl IntoIterator<Item = &'a String>) -> bool {
        if self.auto_approve_scopes.is_empty() {
            return false;
        }

        let patterns: Vec<GlobPattern> = self
            .auto_approve_scopes
            .iter()
            .filter_map(|p| GlobPattern::new(p).ok())
            .collect();

        let mut any = false;
        for scope in scopes {
            any = true;
            if !patterns.iter().any(|p| p.matches(scope)) {
                return false;
            }
        }
        any
    }
}

/// Client registration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientValidationError {
    /// The client_id is empty.
    #[error("client_id cannot be empty")]
    EmptyClientId,

    /// No grant types are configured.
    #[error("at least one grant type must be configured")]
    NoGrantTypes,

    /// A redirect-based grant is configured without redirect URIs.
    #[error("redirect-based grant types require at least one redirect URI")]
    NoRedirectUris,

    /// An auto-approve pattern cannot be compiled.
    #[error("invalid auto-approve scope pattern: {0}")]
    InvalidAutoApprovePattern(String),
}
