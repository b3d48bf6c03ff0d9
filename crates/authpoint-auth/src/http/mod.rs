//! HTTP bindings for the authorization endpoint.
//!
//! - [`response`]: `IntoResponse` for redirects, approval instructions and
//!   errors
//! - [`principal`]: the [`Authenticator`] seam and an axum extractor for the
//!   current principal

pub mod principal;
pub mod response;

pub use principal::{
    AuthenticatedPrincipal, Authenticator, AuthenticatorState, PrincipalRejection,
    TrustedHeaderAuthenticator,
};
pub use response::ErrorBody;
