//! Issuance collaborators.
//!
//! Codes and tokens are minted, stored and made single-use elsewhere; the
//! endpoint only asks for them once a request has been approved.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::{AuthorizationRequest, IssuedToken, Principal};

/// Issues authorization codes for approved requests.
#[async_trait]
pub trait CodeIssuer: Send + Sync {
    /// Returns an opaque, unguessable, single-use code.
    ///
    /// # Errors
    ///
    /// Any failure is reported to the client as `server_error`.
    async fn issue(
        &self,
        approved: &AuthorizationRequest,
        principal: &Principal,
    ) -> AuthResult<String>;
}

/// Issues access tokens for approved implicit-flow requests.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// # Errors
    ///
    /// Any failure is reported to the client as `server_error`.
    async fn issue(
        &self,
        approved: &AuthorizationRequest,
        principal: &Principal,
    ) -> AuthResult<IssuedToken>;
}
