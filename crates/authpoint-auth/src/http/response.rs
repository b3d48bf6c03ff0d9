//! Response conversions.
//!
//! Errors that may not be redirected are answered directly with a JSON body
//! in the OAuth 2.0 error format.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::oauth::endpoint::{AuthorizeOutcome, RenderApprovalInstruction};
use crate::oauth::response::RedirectInstruction;

/// OAuth 2.0 error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub error_description: String,
}

impl From<&AuthError> for ErrorBody {
    fn from(err: &AuthError) -> Self {
        Self {
            error: err.oauth_error_code().to_string(),
            error_description: err.description().to_string(),
        }
    }
}

/// HTTP status for an error answered without redirect.
#[must_use]
pub fn status_for(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidClient { .. } => StatusCode::UNAUTHORIZED,
        AuthError::AccessDenied { .. } => StatusCode::FORBIDDEN,
        e if e.is_server_error() => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            tracing::error!(error = %self, "Authorization endpoint failure");
        }
        (status, Json(ErrorBody::from(&self))).into_response()
    }
}

impl IntoResponse for RedirectInstruction {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status.as_u16()).unwrap_or(StatusCode::FOUND);
        match HeaderValue::from_str(&self.uri) {
            Ok(location) => (status, [(header::LOCATION, location)]).into_response(),
            Err(_) => AuthError::internal("Redirect URI is not a valid header value")
                .into_response(),
        }
    }
}

impl IntoResponse for RenderApprovalInstruction {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

impl IntoResponse for AuthorizeOutcome {
    fn into_response(self) -> Response {
        match self {
            Self::Redirect(redirect) => redirect.into_response(),
            Self::RenderApproval(approval) => approval.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::response::RedirectStatus;

    #[test]
    fn test_status_for_errors() {
        assert_eq!(
            status_for(&AuthError::invalid_request("x")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&AuthError::redirect_mismatch("x")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&AuthError::invalid_client("x")),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&AuthError::storage("x")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_redirect_response() {
        let response = RedirectInstruction {
            uri: "https://anywhere.com/?code=abc".to_string(),
            status: RedirectStatus::SeeOther,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://anywhere.com/?code=abc"
        );
    }

    #[test]
    fn test_error_response() {
        let response = AuthError::redirect_mismatch("no match").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_error_body() {
        let body = ErrorBody::from(&AuthError::invalid_grant("no redirect grant"));
        assert_eq!(body.error, "invalid_grant");
        assert_eq!(body.error_description, "no redirect grant");
    }
}
