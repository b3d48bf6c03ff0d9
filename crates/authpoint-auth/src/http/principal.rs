//! Current principal resolution.
//!
//! Authentication happens in front of the authorization endpoint. An
//! [`Authenticator`] reports who that is for an incoming request, and the
//! [`AuthenticatedPrincipal`] extractor makes it available to handlers.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Json,
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::AuthResult;
use crate::types::Principal;

/// Header carrying the subject id for [`TrustedHeaderAuthenticator`].
pub const DEFAULT_SUBJECT_HEADER: &str = "x-authenticated-user";

/// Header carrying the login name for [`TrustedHeaderAuthenticator`].
pub const DEFAULT_USERNAME_HEADER: &str = "x-authenticated-username";

/// Header carrying the session id for [`TrustedHeaderAuthenticator`].
pub const DEFAULT_SESSION_HEADER: &str = "x-authenticated-session";

/// Supplies the authenticated principal of a request.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns `None` if the request is not authenticated.
    ///
    /// # Errors
    ///
    /// Returns an error if the authentication backend fails.
    async fn current_principal(&self, parts: &Parts) -> AuthResult<Option<Principal>>;
}

/// Reads the principal from headers set by a trusted authenticating proxy.
///
/// Only suitable behind a proxy that strips these headers from client
/// requests.
#[derive(Debug, Clone)]
pub struct TrustedHeaderAuthenticator {
    subject_header: String,
    username_header: String,
    session_header: String,
}

impl Default for TrustedHeaderAuthenticator {
    fn default() -> Self {
        Self::new(DEFAULT_SUBJECT_HEADER)
    }
}

impl TrustedHeaderAuthenticator {
    #[must_use]
    pub fn new(subject_header: impl Into<String>) -> Self {
        Self {
            subject_header: subject_header.into(),
            username_header: DEFAULT_USERNAME_HEADER.to_string(),
            session_header: DEFAULT_SESSION_HEADER.to_string(),
        }
    }
}

#[async_trait]
impl Authenticator for TrustedHeaderAuthenticator {
    async fn current_principal(&self, parts: &Parts) -> AuthResult<Option<Principal>> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let Some(subject_id) = header(&self.subject_header) else {
            return Ok(None);
        };
        let username = header(&self.username_header).unwrap_or(subject_id);

        let mut principal = Principal::new(subject_id, username);
        if let Some(session_id) = header(&self.session_header) {
            principal = principal.with_session_id(session_id);
        }
        Ok(Some(principal))
    }
}

// =============================================================================
// Extractor
// =============================================================================

/// State required by the [`AuthenticatedPrincipal`] extractor.
#[derive(Clone)]
pub struct AuthenticatorState {
    pub authenticator: Arc<dyn Authenticator>,
}

impl AuthenticatorState {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self { authenticator }
    }
}

/// Extracts the authenticated principal, rejecting anonymous requests.
#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal(pub Principal);

#[derive(Debug, Clone, Serialize)]
pub struct PrincipalRejection {
    #[serde(skip)]
    status: StatusCode,
    pub error: String,
    pub error_description: String,
}

impl IntoResponse for PrincipalRejection {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl<S> FromRequestParts<S> for AuthenticatedPrincipal
where
    S: Send + Sync,
    AuthenticatorState: FromRef<S>,
{
    type Rejection = PrincipalRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let authenticator = AuthenticatorState::from_ref(state).authenticator;

        let principal = authenticator
            .current_principal(parts)
            .await
            .map_err(|e| PrincipalRejection {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: "server_error".to_string(),
                error_description: format!("Authentication backend error: {}", e),
            })?
            .ok_or_else(|| PrincipalRejection {
                status: StatusCode::UNAUTHORIZED,
                error: "access_denied".to_string(),
                error_description: "User must be authenticated before authorization can be completed.".to_string(),
            })?;

        tracing::debug!(
            subject_id = %principal.subject_id,
            endpoint = %parts.uri.path(),
            "Principal resolved"
        );

        Ok(Self(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/oauth/authorize");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_anonymous_request() {
        let authenticator = TrustedHeaderAuthenticator::default();
        assert!(authenticator.current_principal(&parts(&[])).await.unwrap().is_none());
        assert!(
            authenticator
                .current_principal(&parts(&[("x-authenticated-user", "  ")]))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_principal_from_headers() {
        let authenticator = TrustedHeaderAuthenticator::default();
        let principal = authenticator
            .current_principal(&parts(&[
                ("x-authenticated-user", "user-1"),
                ("x-authenticated-username", "marissa"),
                ("x-authenticated-session", "sess-9"),
            ]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(principal.subject_id, "user-1");
        assert_eq!(principal.username, "marissa");
        assert_eq!(principal.session_id.as_deref(), Some("sess-9"));
    }

    #[test]
    fn test_username_defaults_to_subject() {
        let authenticator = TrustedHeaderAuthenticator::new("x-user");
        let principal =
            tokio_test::block_on(authenticator.current_principal(&parts(&[("x-user", "user-1")])))
                .unwrap()
                .unwrap();
        assert_eq!(principal.username, "user-1");
        assert!(principal.session_id.is_none());
    }

    #[tokio::test]
    async fn test_extractor_rejects_anonymous() {
        let state = AuthenticatorState::new(Arc::new(TrustedHeaderAuthenticator::default()));
        let mut p = parts(&[]);
        let rejection = AuthenticatedPrincipal::from_request_parts(&mut p, &state)
            .await
            .unwrap_err();
        assert_eq!(rejection.status, StatusCode::UNAUTHORIZED);
        assert_eq!(rejection.error, "access_denied");
    }
}
