//! Common types used across the authorization endpoint modules.
//!
//! ## Domain Types
//!
//! - [`RegisteredClient`] - the parts of a client registration the endpoint reads
//! - [`GrantType`] - grant type derived from the requested response types
//! - [`AuthorizationRequest`] / [`FrozenSnapshot`] - one authorization attempt
//! - [`Principal`] - the authenticated resource owner
//! - [`IssuedToken`] - an access token produced for the implicit flow

pub mod client;
pub mod principal;
pub mod request;
pub mod token;

pub use client::{ClientValidationError, GrantType, RegisteredClient};
pub use principal::Principal;
pub use request::{AuthorizationRequest, FrozenSnapshot};
pub use token::IssuedToken;
