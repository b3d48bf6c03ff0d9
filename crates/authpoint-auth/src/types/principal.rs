//! Authenticated principal.

use serde::{Deserialize, Serialize};

/// The authenticated resource owner on whose behalf the request is made.
///
/// Supplied by the external authenticator; the endpoint never verifies
/// credentials itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable subject identifier (the user id).
    pub subject_id: String,

    /// Login name.
    pub username: String,

    /// Identifier of the authenticated browser session, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl Principal {
    /// Creates a principal without a session id.
    #[must_use]
    pub fn new(subject_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            username: username.into(),
            session_id: None,
        }
    }

    /// Sets the session id.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}
