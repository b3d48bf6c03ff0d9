//! Final redirect construction.
//!
//! Authorization code responses travel in the query, implicit responses in
//! the fragment. Error redirects follow the same convention as the success
//! response for the grant type.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::params;
use crate::types::{AuthorizationRequest, GrantType, IssuedToken};

// =============================================================================
// Error Codes
// =============================================================================

/// OAuth 2.0 error codes produced by the authorization endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationErrorCode {
    InvalidRequest,
    InvalidClient,
    UnauthorizedClient,
    InvalidGrant,
    RedirectMismatch,
    UnsupportedResponseType,
    AccessDenied,
    InvalidScope,
    InteractionRequired,
    ServerError,
}

impl AuthorizationErrorCode {
    /// Returns the wire value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::InvalidGrant => "invalid_grant",
            Self::RedirectMismatch => "redirect_mismatch",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::AccessDenied => "access_denied",
            Self::InvalidScope => "invalid_scope",
            Self::InteractionRequired => "interaction_required",
            Self::ServerError => "server_error",
        }
    }
}

impl std::fmt::Display for AuthorizationErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Redirect Instruction
// =============================================================================

/// HTTP status used for the final redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectStatus {
    /// 302 Found.
    #[default]
    Found,
    /// 303 See Other.
    SeeOther,
}

impl RedirectStatus {
    #[must_use]
    pub fn as_u16(&self) -> u16 {
        match self {
            Self::Found => 302,
            Self::SeeOther => 303,
        }
    }
}

/// Where to send the user agent, and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectInstruction {
    pub uri: String,
    pub status: RedirectStatus,
}

impl RedirectInstruction {
    /// Returns the `error` parameter carried by this redirect, if any.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.parameter("error")
    }

    /// Looks up a response parameter in the query or fragment.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<String> {
        let url = Url::parse(&self.uri).ok()?;
        let from_query = url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned());
        from_query.or_else(|| {
            url::form_urlencoded::parse(url.fragment()?.as_bytes())
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
        })
    }
}

// =============================================================================
// Redirect Builder
// =============================================================================

/// What was issued for an approved request.
#[derive(Debug, Clone)]
pub enum AuthorizationOutcome {
    /// An authorization code, delivered in the query.
    Code { code: String },
    /// An access token, delivered in the fragment together with a code when
    /// `code` was also requested.
    Implicit {
        token: IssuedToken,
        code: Option<String>,
    },
}

/// Builds final redirect instructions.
#[derive(Debug, Clone, Default)]
pub struct RedirectBuilder {
    status: RedirectStatus,
}

impl RedirectBuilder {
    #[must_use]
    pub fn new(status: RedirectStatus) -> Self {
        Self { status }
    }

    /// Parses the resolved redirect URI of `request`.
    ///
    /// Called before anything is issued so that a broken target cannot leave
    /// an orphaned code or token behind.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the request has no redirect URI or it does not
    /// parse as an absolute URI.
    pub fn target(request: &AuthorizationRequest) -> AuthResult<Url> {
        let uri = request
            .redirect_uri
            .as_deref()
            .ok_or_else(|| AuthError::internal("No resolved redirect_uri on request"))?;
        Url::parse(uri).map_err(|e| AuthError::internal(format!("Unusable redirect_uri: {e}")))
    }

    /// Builds the success redirect for `outcome`.
    #[must_use]
    pub fn build(
        &self,
        mut target: Url,
        request: &AuthorizationRequest,
        outcome: &AuthorizationOutcome,
        session_state: Option<&str>,
    ) -> RedirectInstruction {
        match outcome {
            AuthorizationOutcome::Code { code } => {
                {
                    let mut query = target.query_pairs_mut();
                    query.append_pair("code", code);
                    if let Some(state) = &request.state {
                        query.append_pair(params::STATE, state);
                    }
                    if let Some(session_state) = session_state {
                        query.append_pair("session_state", session_state);
                    }
                }
                self.instruction(target)
            }
            AuthorizationOutcome::Implicit { token, code } => {
                let mut fragment = url::form_urlencoded::Serializer::new(String::new());
                fragment.append_pair("token_type", &token.token_type);
                fragment.append_pair("access_token", &token.value);
                if let Some(id_token) = &token.id_token_value {
                    fragment.append_pair("id_token", id_token);
                }
                if let Some(code) = code {
                    fragment.append_pair("code", code);
                }
                if let Some(state) = &request.state {
                    fragment.append_pair(params::STATE, state);
                }
                fragment.append_pair(
                    "expires_in",
                    &token.expires_in(OffsetDateTime::now_utc()).to_string(),
                );
                let scope = if token.scope.is_empty() {
                    &request.scope
                } else {
                    &token.scope
                };
                if !scope.is_empty() {
                    fragment.append_pair(params::SCOPE, &params::format_parameter_list(scope));
                }
                if let Some(session_state) = session_state {
                    fragment.append_pair("session_state", session_state);
                }
                target.set_fragment(Some(&fragment.finish()));
                self.instruction(target)
            }
        }
    }

    /// Builds an error redirect using the response location of `grant_type`.
    #[must_use]
    pub fn error(
        &self,
        mut target: Url,
        grant_type: GrantType,
        error: &AuthError,
        state: Option<&str>,
    ) -> RedirectInstruction {
        let code = error.oauth_error_code();
        let description = error.description();

        if grant_type.uses_fragment() {
            let mut fragment = url::form_urlencoded::Serializer::new(String::new());
            fragment.append_pair("error", code);
            fragment.append_pair("error_description", description);
            if let Some(state) = state {
                fragment.append_pair(params::STATE, state);
            }
            target.set_fragment(Some(&fragment.finish()));
        } else {
            target.set_fragment(None);
            let mut query = target.query_pairs_mut();
            query.append_pair("error", code);
            query.append_pair("error_description", description);
            if let Some(state) = state {
                query.append_pair(params::STATE, state);
            }
        }
        self.instruction(target)
    }

    fn instruction(&self, target: Url) -> RedirectInstruction {
        RedirectInstruction {
            uri: target.into(),
            status: self.status,
        }
    }
}
