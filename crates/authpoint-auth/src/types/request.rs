//! Authorization request and its frozen snapshot.
//!
//! An [`AuthorizationRequest`] lives for a single browser round trip. When
//! the approval page is rendered the request is frozen into a
//! [`FrozenSnapshot`]; the snapshot is kept by the caller (usually in the
//! user's session) and handed back when the approval form is submitted, so
//! that any mutation of the request in between can be detected.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::params;

/// One authorization attempt.
///
/// # Example
///
/// ```ignore
/// GET /oauth/authorize?
///   response_type=code
///   &client_id=my-app
///   &redirect_uri=https://app.example.com/callback
///   &scope=openid read
///   &state=abc123xyz
///   &code_challenge=E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM
///   &code_challenge_method=S256
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    /// Client identifier issued during registration.
    pub client_id: String,

    /// Requested redirect URI. Replaced by the resolved URI once the
    /// request has been validated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// Opaque client state, echoed back verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Requested scopes.
    #[serde(default)]
    pub scope: BTreeSet<String>,

    /// Requested response types (`code`, `token`, `id_token`).
    #[serde(default)]
    pub response_types: BTreeSet<String>,

    /// Whether the resource owner has approved the request.
    #[serde(default)]
    pub approved: bool,

    /// Resource server identifiers the request targets.
    #[serde(default)]
    pub resource_ids: BTreeSet<String>,

    /// Authorities granted to the client.
    #[serde(default)]
    pub authorities: BTreeSet<String>,

    /// All raw request parameters (`prompt`, PKCE fields, ...).
    #[serde(default)]
    pub request_parameters: BTreeMap<String, String>,

    /// Protocol extension values.
    #[serde(default)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl AuthorizationRequest {
    /// Creates a request for `client_id` with the given response types.
    #[must_use]
    pub fn new<I, S>(client_id: impl Into<String>, response_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            client_id: client_id.into(),
            response_types: response_types.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Builds a request from raw query/form parameters.
    ///
    /// `response_type` and `scope` are split on whitespace. Every parameter
    /// is also retained in `request_parameters`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if `client_id` is missing or empty.
    pub fn from_parameters(parameters: &HashMap<String, String>) -> AuthResult<Self> {
        let client_id = parameters
            .get(params::CLIENT_ID)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AuthError::invalid_request("A client_id must be supplied."))?;

        let non_empty = |key: &str| {
            parameters
                .get(key)
                .filter(|v| !v.is_empty())
                .cloned()
        };

        Ok(Self {
            client_id: client_id.clone(),
            redirect_uri: non_empty(params::REDIRECT_URI),
            state: non_empty(params::STATE),
            scope: parameters
                .get(params::SCOPE)
                .map(|s| params::parse_parameter_list(s))
                .unwrap_or_default(),
            response_types: parameters
                .get(params::RESPONSE_TYPE)
                .map(|s| params::parse_parameter_list(s))
                .unwrap_or_default(),
            approved: false,
            resource_ids: BTreeSet::new(),
            authorities: BTreeSet::new(),
            request_parameters: parameters
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            extensions: BTreeMap::new(),
        })
    }

    /// Sets the redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    /// Sets the state.
    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Sets the requested scopes.
    #[must_use]
    pub fn with_scope<I, S>(mut self, scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope = scope.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a raw request parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request_parameters.insert(key.into(), value.into());
        self
    }

    /// Returns a raw request parameter.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.request_parameters.get(key).map(String::as_str)
    }

    /// Returns `true` if `prompt=none` was requested.
    #[must_use]
    pub fn is_prompt_none(&self) -> bool {
        self.parameter(params::PROMPT)
            .map(|p| params::parse_parameter_list(p).contains(params::PROMPT_NONE))
            .unwrap_or(false)
    }

    /// Freezes the request for the approval step.
    #[must_use]
    pub fn freeze(&self) -> FrozenSnapshot {
        FrozenSnapshot {
            id: Uuid::new_v4(),
            frozen_at: OffsetDateTime::now_utc(),
            request: self.clone(),
        }
    }
}

/// Immutable copy of an authorization request taken before approval.
///
/// The snapshot exposes read-only accessors only; a mutable request can be
/// recovered with [`FrozenSnapshot::to_request`], which always yields a
/// fresh copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrozenSnapshot {
    id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    frozen_at: OffsetDateTime,
    request: AuthorizationRequest,
}

impl FrozenSnapshot {
    /// Unique identifier of this approval round trip.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// When the snapshot was taken.
    #[must_use]
    pub fn frozen_at(&self) -> OffsetDateTime {
        self.frozen_at
    }

    /// Read-only view of the frozen request.
    #[must_use]
    pub fn request(&self) -> &AuthorizationRequest {
        &self.request
    }

    /// Returns a fresh, mutable copy of the frozen request.
    #[must_use]
    pub fn to_request(&self) -> AuthorizationRequest {
        self.request.clone()
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.request.client_id
    }

    #[must_use]
    pub fn redirect_uri(&self) -> Option<&str> {
        self.request.redirect_uri.as_deref()
    }

    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.request.state.as_deref()
    }

    #[must_use]
    pub fn scope(&self) -> &BTreeSet<String> {
        &self.request.scope
    }

    #[must_use]
    pub fn response_types(&self) -> &BTreeSet<String> {
        &self.request.response_types
    }

    #[must_use]
    pub fn approved(&self) -> bool {
        self.request.approved
    }

    #[must_use]
    pub fn resource_ids(&self) -> &BTreeSet<String> {
        &self.request.resource_ids
    }

    #[must_use]
    pub fn authorities(&self) -> &BTreeSet<String> {
        &self.request.authorities
    }
}
