//! OpenID Connect Session Management `session_state` values.

use sha2::{Digest, Sha256};

use crate::AuthResult;

/// Computes the `session_state` returned with `prompt=none` responses.
pub trait SessionStateCalculator: Send + Sync {
    /// # Errors
    ///
    /// Implementations return an error if the value cannot be computed; the
    /// endpoint then answers with `server_error`.
    fn calculate(&self, subject_id: &str, client_id: &str, origin: &str) -> AuthResult<String>;
}

/// `hex(sha256(client_id " " origin " " subject_id " " salt)) "." salt`
/// with a fresh random salt per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256SessionStateCalculator;

impl Sha256SessionStateCalculator {
    /// Computes the value for a given salt.
    #[must_use]
    pub fn calculate_with_salt(
        &self,
        subject_id: &str,
        client_id: &str,
        origin: &str,
        salt: &str,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{client_id} {origin} {subject_id} {salt}").as_bytes());
        format!("{}.{}", hex::encode(hasher.finalize()), salt)
    }
}

impl SessionStateCalculator for Sha256SessionStateCalculator {
    fn calculate(&self, subject_id: &str, client_id: &str, origin: &str) -> AuthResult<String> {
        use rand::RngCore;
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        Ok(self.calculate_with_salt(subject_id, client_id, origin, &hex::encode(salt)))
    }
}

/// Origin (`scheme://host[:port]`) of a redirect target.
#[must_use]
pub fn redirect_origin(target: &url::Url) -> String {
    target.origin().ascii_serialization()
}
