//! Authorization endpoint error types.
//!
//! This module defines all error types that can occur while processing an
//! authorization request. Each variant maps onto an OAuth 2.0 error code,
//! which is what ends up on the wire (either in an error redirect or in the
//! error page rendered by the caller).

use std::fmt;

use crate::oauth::response::AuthorizationErrorCode;

/// Errors that can occur while handling an authorization request.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The request is missing a required parameter, carries a malformed
    /// parameter (including PKCE parameters), or was tampered with between
    /// rendering and approval.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of why the request is invalid.
        message: String,
    },

    /// The client is not registered.
    #[error("Invalid client: {message}")]
    InvalidClient {
        /// Description of why the client is invalid.
        message: String,
    },

    /// The client is not allowed to use the grant type derived from the
    /// requested response types.
    #[error("Unauthorized client: {message}")]
    UnauthorizedClient {
        /// Description of why the client is unauthorized.
        message: String,
    },

    /// The client is not configured for any redirect-based grant type.
    #[error("Invalid grant: {message}")]
    InvalidGrant {
        /// Description of why the grant is invalid.
        message: String,
    },

    /// The requested redirect URI matches none of the registered values,
    /// or no redirect URI was requested and the default is ambiguous.
    #[error("Redirect mismatch: {message}")]
    RedirectMismatch {
        /// Generic description; never names the rule that failed.
        message: String,
    },

    /// The response type set is recognized by neither grant path.
    #[error("Unsupported response type: {response_type}")]
    UnsupportedResponseType {
        /// The unsupported response type(s), space separated.
        response_type: String,
    },

    /// The resource owner denied the authorization request.
    #[error("Access denied: {message}")]
    AccessDenied {
        /// Description of why access was denied.
        message: String,
    },

    /// The requested (or approved) scope is outside what is allowed.
    #[error("Invalid scope: {message}")]
    InvalidScope {
        /// Description of why the scope is invalid.
        message: String,
    },

    /// `prompt=none` was requested but the user would have to interact.
    #[error("Interaction required: {message}")]
    InteractionRequired {
        /// Description of the interaction that would be needed.
        message: String,
    },

    /// A storage collaborator failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The auth configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An issuance or session-state collaborator failed, or an unexpected
    /// internal condition occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClient` error.
    #[must_use]
    pub fn invalid_client(message: impl Into<String>) -> Self {
        Self::InvalidClient {
            message: message.into(),
        }
    }

    /// Creates a new `UnauthorizedClient` error.
    #[must_use]
    pub fn unauthorized_client(message: impl Into<String>) -> Self {
        Self::UnauthorizedClient {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidGrant` error.
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant {
            message: message.into(),
        }
    }

    /// Creates a new `RedirectMismatch` error.
    #[must_use]
    pub fn redirect_mismatch(message: impl Into<String>) -> Self {
        Self::RedirectMismatch {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedResponseType` error.
    #[must_use]
    pub fn unsupported_response_type(response_type: impl Into<String>) -> Self {
        Self::UnsupportedResponseType {
            response_type: response_type.into(),
        }
    }

    /// Creates a new `AccessDenied` error.
    #[must_use]
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidScope` error.
    #[must_use]
    pub fn invalid_scope(message: impl Into<String>) -> Self {
        Self::InvalidScope {
            message: message.into(),
        }
    }

    /// Creates a new `InteractionRequired` error.
    #[must_use]
    pub fn interaction_required(message: impl Into<String>) -> Self {
        Self::InteractionRequired {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. }
        )
    }

    /// Returns the human-readable description without the variant prefix.
    ///
    /// This is what goes into `error_description`.
    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::InvalidRequest { message }
            | Self::InvalidClient { message }
            | Self::UnauthorizedClient { message }
            | Self::InvalidGrant { message }
            | Self::RedirectMismatch { message }
            | Self::AccessDenied { message }
            | Self::InvalidScope { message }
            | Self::InteractionRequired { message }
            | Self::Storage { message }
            | Self::Configuration { message }
            | Self::Internal { message } => message,
            Self::UnsupportedResponseType { response_type } => response_type,
        }
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRequest { .. } => ErrorCategory::Validation,
            Self::InvalidClient { .. } => ErrorCategory::Client,
            Self::UnauthorizedClient { .. } => ErrorCategory::Client,
            Self::InvalidGrant { .. } => ErrorCategory::Client,
            Self::RedirectMismatch { .. } => ErrorCategory::Redirect,
            Self::UnsupportedResponseType { .. } => ErrorCategory::Validation,
            Self::AccessDenied { .. } => ErrorCategory::Authorization,
            Self::InvalidScope { .. } => ErrorCategory::Authorization,
            Self::InteractionRequired { .. } => ErrorCategory::Authorization,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the wire-level error code for this error.
    #[must_use]
    pub fn error_code(&self) -> AuthorizationErrorCode {
        match self {
            Self::InvalidRequest { .. } => AuthorizationErrorCode::InvalidRequest,
            Self::InvalidClient { .. } => AuthorizationErrorCode::InvalidClient,
            Self::UnauthorizedClient { .. } => AuthorizationErrorCode::UnauthorizedClient,
            Self::InvalidGrant { .. } => AuthorizationErrorCode::InvalidGrant,
            Self::RedirectMismatch { .. } => AuthorizationErrorCode::RedirectMismatch,
            Self::UnsupportedResponseType { .. } => {
                AuthorizationErrorCode::UnsupportedResponseType
            }
            Self::AccessDenied { .. } => AuthorizationErrorCode::AccessDenied,
            Self::InvalidScope { .. } => AuthorizationErrorCode::InvalidScope,
            Self::InteractionRequired { .. } => AuthorizationErrorCode::InteractionRequired,
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                AuthorizationErrorCode::ServerError
            }
        }
    }

    /// Returns the OAuth 2.0 error code string for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        self.error_code().as_str()
    }
}

/// Categories of authorization errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed or tampered requests.
    Validation,
    /// Client registration problems.
    Client,
    /// Redirect URI resolution failures.
    Redirect,
    /// Consent and scope decisions.
    Authorization,
    /// Storage collaborator failures.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal server errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Client => write!(f, "client"),
            Self::Redirect => write!(f, "redirect"),
            Self::Authorization => write!(f, "authorization"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
