//! OAuth 2.0 / OpenID Connect authorization endpoint.
//!
//! - [`grant`] - grant type derivation from response types
//! - [`redirect`] - redirect URI resolution against the registration
//! - [`pkce`] - PKCE parameter validation and code verifier checks
//! - [`guard`] - tamper detection at approval time
//! - [`response`] - final redirect construction
//! - [`session_state`] - OIDC session management values
//! - [`issuer`] - code and token issuance collaborators
//! - [`endpoint`] - the orchestrating state machine

pub mod endpoint;
pub mod grant;
pub mod guard;
pub mod issuer;
pub mod params;
pub mod pkce;
pub mod redirect;
pub mod response;
pub mod session_state;

pub use endpoint::{
    AuthorizationEndpoint, AuthorizationPhase, AuthorizeOutcome, RenderApprovalInstruction,
};
pub use grant::derive_grant_type;
pub use guard::check_unmodified;
pub use issuer::{CodeIssuer, TokenIssuer};
pub use pkce::{
    PkceError, PkceValidationService, PkceVerifier, PlainPkceVerifier, S256PkceVerifier,
    compute_s256_challenge, generate_code_verifier,
};
pub use redirect::RedirectResolver;
pub use response::{
    AuthorizationErrorCode, AuthorizationOutcome, RedirectBuilder, RedirectInstruction,
    RedirectStatus,
};
pub use session_state::{SessionStateCalculator, Sha256SessionStateCalculator};
