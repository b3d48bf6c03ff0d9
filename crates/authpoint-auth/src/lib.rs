//! # authpoint-auth
//!
//! OAuth 2.0 / OpenID Connect authorization endpoint core.
//!
//! This crate turns an incoming authorization request into an authorization
//! code, an implicit-flow token fragment, or a rejection. It provides:
//! - Grant type derivation and redirect URI resolution
//! - PKCE parameter validation and verification (`plain`, `S256`)
//! - Tamper detection between the rendered and the approved request
//! - Query and fragment redirect construction with OIDC `session_state`
//! - Authorization events on a broadcast channel
//!
//! Client registrations, code and token issuance, and user authentication
//! are collaborators supplied by the embedding application.
//!
//! ## Modules
//!
//! - [`config`] - Endpoint configuration
//! - [`oauth`] - The authorization endpoint and its components
//! - [`types`] - Requests, clients, principals and tokens
//! - [`storage`] - Storage traits for clients and snapshots
//! - [`events`] - Authorization event broadcasting
//! - [`http`] - Axum response conversions and principal extraction

pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod oauth;
pub mod storage;
pub mod types;
pub mod util;

pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, ErrorCategory};
pub use events::{AuthorizationEvent, AuthorizationEventBroadcaster, AuthorizationEventKind};
pub use http::{AuthenticatedPrincipal, Authenticator, AuthenticatorState, TrustedHeaderAuthenticator};
pub use oauth::{
    AuthorizationEndpoint, AuthorizeOutcome, CodeIssuer, RedirectInstruction,
    RenderApprovalInstruction, TokenIssuer,
};
pub use storage::{ClientStorage, SnapshotStorage};
pub use types::{
    AuthorizationRequest, FrozenSnapshot, GrantType, IssuedToken, Principal, RegisteredClient,
};

/// Type alias for authorization endpoint results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use authpoint_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::{AuthConfig, ConfigError};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::events::{
        AuthorizationEvent, AuthorizationEventBroadcaster, AuthorizationEventKind,
    };
    pub use crate::oauth::{
        AuthorizationEndpoint, AuthorizeOutcome, CodeIssuer, PkceValidationService,
        RedirectInstruction, RenderApprovalInstruction, SessionStateCalculator, TokenIssuer,
    };
    pub use crate::storage::{ClientStorage, SnapshotStorage};
    pub use crate::types::{
        AuthorizationRequest, FrozenSnapshot, GrantType, IssuedToken, Principal,
        RegisteredClient,
    };
}
