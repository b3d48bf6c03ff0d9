//! PKCE (Proof Key for Code Exchange) support.
//!
//! Implements RFC 7636 with pluggable challenge methods. `plain` and `S256`
//! are built in; each is a [`PkceVerifier`] registered under its method name
//! in a [`PkceValidationService`].
//!
//! # Example
//!
//! ```
//! use authpoint_auth::oauth::pkce::{PkceValidationService, compute_s256_challenge};
//!
//! let service = PkceValidationService::default();
//!
//! let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
//! let challenge = compute_s256_challenge(verifier);
//! assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
//!
//! assert!(service.verify(verifier, Some(challenge.as_str()), "S256"));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

use crate::config::{ConfigError, PkceConfig};
use crate::oauth::params;

/// The `plain` challenge method.
pub const PLAIN_METHOD: &str = "plain";

/// The `S256` challenge method.
pub const S256_METHOD: &str = "S256";

const MIN_LENGTH: usize = 43;
const MAX_LENGTH: usize = 128;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during PKCE operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PkceError {
    /// Challenge length is outside the valid range (43-128 characters).
    #[error("Invalid code_challenge length: must be 43-128 characters, got {0}")]
    InvalidChallengeLength(usize),

    /// Challenge contains characters outside the unreserved set.
    #[error("Invalid code_challenge characters: must be [A-Za-z0-9-._~]")]
    InvalidChallengeCharacters,

    /// Verifier length is outside the valid range (43-128 characters).
    #[error("Invalid code_verifier length: must be 43-128 characters, got {0}")]
    InvalidVerifierLength(usize),

    /// Verifier contains characters outside the unreserved set.
    #[error("Invalid code_verifier characters: must be [A-Za-z0-9-._~]")]
    InvalidVerifierCharacters,

    /// No verifier is registered for the challenge method.
    #[error("Unsupported code_challenge_method: {0}")]
    UnsupportedMethod(String),

    /// A challenge was stored but no verifier was presented.
    #[error("code_verifier is required for this authorization code")]
    MissingVerifier,

    /// A verifier was presented for a code issued without a challenge.
    #[error("code_verifier supplied but no code_challenge was present in the authorization request")]
    UnexpectedVerifier,
}

impl PkceError {
    /// Returns `true` if this error concerns the `code_challenge` shape or
    /// method sent at authorization time.
    #[must_use]
    pub fn is_challenge_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidChallengeLength(_)
                | Self::InvalidChallengeCharacters
                | Self::UnsupportedMethod(_)
        )
    }

    /// Returns `true` if this error concerns the `code_verifier` sent at
    /// token exchange.
    #[must_use]
    pub fn is_verifier_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidVerifierLength(_)
                | Self::InvalidVerifierCharacters
                | Self::MissingVerifier
                | Self::UnexpectedVerifier
        )
    }

    /// Get the OAuth 2.0 error code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::MissingVerifier | Self::UnexpectedVerifier => "invalid_grant",
            _ => "invalid_request",
        }
    }
}

impl From<PkceError> for crate::error::AuthError {
    fn from(err: PkceError) -> Self {
        match err {
            PkceError::MissingVerifier | PkceError::UnexpectedVerifier => {
                Self::invalid_grant(err.to_string())
            }
            _ => Self::invalid_request(err.to_string()),
        }
    }
}

// =============================================================================
// Verifiers
// =============================================================================

/// A PKCE challenge method.
///
/// Implementations are registered in a [`PkceValidationService`] under
/// [`PkceVerifier::method`].
pub trait PkceVerifier: Send + Sync {
    /// The `code_challenge_method` value this verifier handles.
    fn method(&self) -> &str;

    /// Checks `code_verifier` against a stored `code_challenge`.
    fn verify(&self, code_verifier: &str, code_challenge: &str) -> bool;
}

/// `plain`: the challenge is the verifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainPkceVerifier;

impl PkceVerifier for PlainPkceVerifier {
    fn method(&self) -> &str {
        PLAIN_METHOD
    }

    fn verify(&self, code_verifier: &str, code_challenge: &str) -> bool {
        code_verifier == code_challenge
    }
}

/// `S256`: `code_challenge = BASE64URL(SHA256(ASCII(code_verifier)))`.
#[derive(Debug, Clone, Copy, Default)]
pub struct S256PkceVerifier;

impl PkceVerifier for S256PkceVerifier {
    fn method(&self) -> &str {
        S256_METHOD
    }

    fn verify(&self, code_verifier: &str, code_challenge: &str) -> bool {
        compute_s256_challenge(code_verifier) == code_challenge
    }
}

/// Computes the S256 challenge for a verifier (unpadded base64url).
#[must_use]
pub fn compute_s256_challenge(code_verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Generates a random verifier: 32 random bytes as base64url (43 characters).
#[must_use]
pub fn generate_code_verifier() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.r#gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

fn is_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '~'
}

/// Validates a code_challenge or code_verifier value.
fn check_shape(
    value: &str,
    on_length: fn(usize) -> PkceError,
    on_characters: PkceError,
) -> Result<(), PkceError> {
    let len = value.chars().count();
    if !(MIN_LENGTH..=MAX_LENGTH).contains(&len) {
        return Err(on_length(len));
    }
    if !value.chars().all(is_unreserved) {
        return Err(on_characters);
    }
    Ok(())
}

// =============================================================================
// Validation Service
// =============================================================================

/// Validates PKCE parameters at authorization time and verifies code
/// verifiers at token exchange.
#[derive(Clone)]
pub struct PkceValidationService {
    verifiers: HashMap<String, Arc<dyn PkceVerifier>>,
}

impl std::fmt::Debug for PkceValidationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceValidationService")
            .field("methods", &self.supported_methods())
            .finish()
    }
}

impl Default for PkceValidationService {
    /// Both `plain` and `S256`.
    fn default() -> Self {
        Self::new([
            Arc::new(PlainPkceVerifier) as Arc<dyn PkceVerifier>,
            Arc::new(S256PkceVerifier),
        ])
    }
}

impl PkceValidationService {
    /// Creates a service with the given verifiers, keyed by their method.
    pub fn new(verifiers: impl IntoIterator<Item = Arc<dyn PkceVerifier>>) -> Self {
        Self {
            verifiers: verifiers
                .into_iter()
                .map(|v| (v.method().to_string(), v))
                .collect(),
        }
    }

    /// Creates a service with the built-in verifiers enabled in `config`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for an unknown method name.
    pub fn from_config(config: &PkceConfig) -> Result<Self, ConfigError> {
        let mut verifiers: Vec<Arc<dyn PkceVerifier>> = Vec::with_capacity(config.methods.len());
        for method in &config.methods {
            match method.as_str() {
                PLAIN_METHOD => verifiers.push(Arc::new(PlainPkceVerifier)),
                S256_METHOD => verifiers.push(Arc::new(S256PkceVerifier)),
                other => {
                    return Err(ConfigError::InvalidValue(format!(
                        "Invalid PKCE method: '{}'",
                        other
                    )));
                }
            }
        }
        Ok(Self::new(verifiers))
    }

    /// Registers an additional verifier, replacing any with the same method.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn PkceVerifier>) -> Self {
        self.verifiers.insert(verifier.method().to_string(), verifier);
        self
    }

    /// Sorted list of the registered method names.
    #[must_use]
    pub fn supported_methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.verifiers.keys().cloned().collect();
        methods.sort();
        methods
    }

    /// Returns `true` if a verifier is registered for `method`.
    #[must_use]
    pub fn is_supported(&self, method: &str) -> bool {
        self.verifiers.contains_key(method)
    }

    /// Validates the shape of PKCE parameters on an authorization request.
    ///
    /// Requests without a `code_challenge` pass. A `code_challenge_method`
    /// is checked whenever present; when absent it defaults to `plain`,
    /// which must then be registered.
    ///
    /// # Errors
    ///
    /// Returns a challenge error for a malformed challenge or an
    /// unregistered method.
    pub fn validate_request_parameters(
        &self,
        parameters: &BTreeMap<String, String>,
    ) -> Result<(), PkceError> {
        let challenge = parameters.get(params::CODE_CHALLENGE);
        let method = parameters.get(params::CODE_CHALLENGE_METHOD);

        if let Some(method) = method
            && !self.is_supported(method)
        {
            return Err(PkceError::UnsupportedMethod(method.clone()));
        }

        let Some(challenge) = challenge else {
            return Ok(());
        };

        check_shape(
            challenge,
            PkceError::InvalidChallengeLength,
            PkceError::InvalidChallengeCharacters,
        )?;

        if method.is_none() && !self.is_supported(PLAIN_METHOD) {
            return Err(PkceError::UnsupportedMethod(PLAIN_METHOD.to_string()));
        }

        Ok(())
    }

    /// Verifies a code verifier against a stored challenge.
    ///
    /// A missing challenge means PKCE was not used and verification is
    /// skipped (`true`). An unregistered method never verifies.
    #[must_use]
    pub fn verify(&self, code_verifier: &str, stored_challenge: Option<&str>, method: &str) -> bool {
        let Some(challenge) = stored_challenge else {
            return true;
        };
        self.verifiers
            .get(method)
            .is_some_and(|v| v.verify(code_verifier, challenge))
    }

    /// Token-exchange check of a verifier against the parameters stored with
    /// an authorization code.
    ///
    /// Returns `Ok(true)` when PKCE was not used and no verifier was sent,
    /// or when the verifier matches.
    ///
    /// # Errors
    ///
    /// - `MissingVerifier` if a challenge was stored but no verifier sent
    /// - `UnexpectedVerifier` if a verifier was sent without a stored challenge
    /// - a verifier shape error if the verifier is malformed
    pub fn check_and_validate(
        &self,
        stored_parameters: &BTreeMap<String, String>,
        code_verifier: Option<&str>,
    ) -> Result<bool, PkceError> {
        let challenge = stored_parameters.get(params::CODE_CHALLENGE);

        let verifier = match (challenge, code_verifier) {
            (None, None) => return Ok(true),
            (None, Some(_)) => return Err(PkceError::UnexpectedVerifier),
            (Some(_), None) => return Err(PkceError::MissingVerifier),
            (Some(_), Some(v)) => v,
        };

        check_shape(
            verifier,
            PkceError::InvalidVerifierLength,
            PkceError::InvalidVerifierCharacters,
        )?;

        let method = stored_parameters
            .get(params::CODE_CHALLENGE_METHOD)
            .map_or(PLAIN_METHOD, String::as_str);

        Ok(self.verify(verifier, challenge.map(String::as_str), method))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFC_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const RFC_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    fn challenge_params(challenge: &str, method: Option<&str>) -> BTreeMap<String, String> {
        let mut parameters = BTreeMap::new();
        parameters.insert(params::CODE_CHALLENGE.to_string(), challenge.to_string());
        if let Some(method) = method {
            parameters.insert(params::CODE_CHALLENGE_METHOD.to_string(), method.to_string());
        }
        parameters
    }

    // -------------------------------------------------------------------------
    // Verifier strategies
    // -------------------------------------------------------------------------

    #[test]
    fn test_s256_rfc_vector() {
        assert_eq!(compute_s256_challenge(RFC_VERIFIER), RFC_CHALLENGE);
        assert!(S256PkceVerifier.verify(RFC_VERIFIER, RFC_CHALLENGE));
    }

    #[test]
    fn test_verify_properties() {
        let service = PkceValidationService::default();
        let abc = compute_s256_challenge("abc");
        assert!(service.verify("abc", Some(abc.as_str()), "S256"));
        assert!(service.verify("abc", Some("abc"), "plain"));
        assert!(!service.verify("abc", Some("xyz"), "S256"));
        assert!(!service.verify("abc", Some("xyz"), "plain"));
    }

    #[test]
    fn test_verify_without_stored_challenge_is_skipped() {
        let service = PkceValidationService::default();
        assert!(service.verify("anything", None, "S256"));
    }

    #[test]
    fn test_verify_unknown_method_fails() {
        let service = PkceValidationService::default();
        assert!(!service.verify("abc", Some("abc"), "S512"));
    }

    #[test]
    fn test_generated_verifier_is_valid() {
        let verifier = generate_code_verifier();
        assert_eq!(verifier.len(), 43);
        assert!(verifier.chars().all(is_unreserved));
        assert_ne!(verifier, generate_code_verifier());
    }

    // -------------------------------------------------------------------------
    // Request parameter validation
    // -------------------------------------------------------------------------

    #[test]
    fn test_no_challenge_passes() {
        let service = PkceValidationService::default();
        assert!(service.validate_request_parameters(&BTreeMap::new()).is_ok());
    }

    #[test]
    fn test_challenge_length_bounds() {
        let service = PkceValidationService::default();

        for len in [42, 129] {
            let challenge = "a".repeat(len);
            let err = service
                .validate_request_parameters(&challenge_params(&challenge, Some("S256")))
                .unwrap_err();
            assert_eq!(err, PkceError::InvalidChallengeLength(len));
        }

        for len in [43, 128] {
            let challenge = "a".repeat(len);
            assert!(
                service
                    .validate_request_parameters(&challenge_params(&challenge, Some("S256")))
                    .is_ok()
            );
        }
    }

    #[test]
    fn test_challenge_forbidden_characters() {
        let service = PkceValidationService::default();
        let challenge = format!("{}+/=", "a".repeat(40));
        let err = service
            .validate_request_parameters(&challenge_params(&challenge, None))
            .unwrap_err();
        assert_eq!(err, PkceError::InvalidChallengeCharacters);
        assert_eq!(err.oauth_error_code(), "invalid_request");
    }

    #[test]
    fn test_challenge_with_all_unreserved_characters() {
        let service = PkceValidationService::default();
        let challenge = format!("{}-._~", "aZ9".repeat(14));
        assert!(
            service
                .validate_request_parameters(&challenge_params(&challenge, Some("plain")))
                .is_ok()
        );
    }

    #[test]
    fn test_unsupported_method() {
        let service = PkceValidationService::default();
        let err = service
            .validate_request_parameters(&challenge_params(RFC_CHALLENGE, Some("S512")))
            .unwrap_err();
        assert_eq!(err, PkceError::UnsupportedMethod("S512".to_string()));
        assert!(err.is_challenge_error());
    }

    #[test]
    fn test_method_defaults_to_plain() {
        let config = PkceConfig {
            methods: vec![S256_METHOD.to_string()],
        };
        let service = PkceValidationService::from_config(&config).unwrap();
        let err = service
            .validate_request_parameters(&challenge_params(RFC_CHALLENGE, None))
            .unwrap_err();
        assert_eq!(err, PkceError::UnsupportedMethod("plain".to_string()));

        assert!(
            service
                .validate_request_parameters(&challenge_params(RFC_CHALLENGE, Some("S256")))
                .is_ok()
        );
    }

    #[test]
    fn test_from_config_rejects_unknown_method() {
        let config = PkceConfig {
            methods: vec!["S512".to_string()],
        };
        assert!(PkceValidationService::from_config(&config).is_err());
    }

    #[test]
    fn test_custom_verifier_extends_service() {
        struct Reversed;
        impl PkceVerifier for Reversed {
            fn method(&self) -> &str {
                "reversed"
            }
            fn verify(&self, code_verifier: &str, code_challenge: &str) -> bool {
                code_verifier.chars().rev().collect::<String>() == code_challenge
            }
        }

        let service = PkceValidationService::default().with_verifier(Arc::new(Reversed));
        assert_eq!(service.supported_methods(), vec!["S256", "plain", "reversed"]);
        assert!(service.verify("abc", Some("cba"), "reversed"));
    }

    // -------------------------------------------------------------------------
    // Token exchange
    // -------------------------------------------------------------------------

    #[test]
    fn test_check_and_validate_s256() {
        let service = PkceValidationService::default();
        let stored = challenge_params(RFC_CHALLENGE, Some("S256"));
        assert_eq!(service.check_and_validate(&stored, Some(RFC_VERIFIER)), Ok(true));

        let other = generate_code_verifier();
        assert_eq!(service.check_and_validate(&stored, Some(other.as_str())), Ok(false));
    }

    #[test]
    fn test_check_and_validate_plain_default() {
        let service = PkceValidationService::default();
        let stored = challenge_params(RFC_VERIFIER, None);
        assert_eq!(service.check_and_validate(&stored, Some(RFC_VERIFIER)), Ok(true));
    }

    #[test]
    fn test_check_and_validate_without_pkce() {
        let service = PkceValidationService::default();
        assert_eq!(service.check_and_validate(&BTreeMap::new(), None), Ok(true));
    }

    #[test]
    fn test_check_and_validate_missing_or_unexpected_verifier() {
        let service = PkceValidationService::default();

        let stored = challenge_params(RFC_CHALLENGE, Some("S256"));
        let err = service.check_and_validate(&stored, None).unwrap_err();
        assert_eq!(err, PkceError::MissingVerifier);
        assert_eq!(err.oauth_error_code(), "invalid_grant");

        let err = service
            .check_and_validate(&BTreeMap::new(), Some(RFC_VERIFIER))
            .unwrap_err();
        assert_eq!(err, PkceError::UnexpectedVerifier);
    }

    #[test]
    fn test_check_and_validate_malformed_verifier() {
        let service = PkceValidationService::default();
        let stored = challenge_params(RFC_CHALLENGE, Some("S256"));
        let err = service.check_and_validate(&stored, Some("short")).unwrap_err();
        assert_eq!(err, PkceError::InvalidVerifierLength(5));
        assert!(err.is_verifier_error());
    }

    #[test]
    fn test_pkce_error_into_auth_error() {
        use crate::error::AuthError;

        let err: AuthError = PkceError::InvalidChallengeCharacters.into();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));

        let err: AuthError = PkceError::MissingVerifier.into();
        assert!(matches!(err, AuthError::InvalidGrant { .. }));
    }
}
