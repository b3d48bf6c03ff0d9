//! Authorization endpoint configuration.
//!
//! This module provides the configuration types for the authorization
//! endpoint core: redirect URI matching rules, the PKCE methods on offer,
//! approval form conventions, and event publication.

use serde::{Deserialize, Serialize};

use crate::oauth::pkce::{PLAIN_METHOD, S256_METHOD};
use crate::oauth::response::RedirectStatus;

/// Root authorization endpoint configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [auth.redirect]
/// redirect_grant_types = ["authorization_code", "implicit"]
/// match_subdomains = false
/// match_ports = true
///
/// [auth.pkce]
/// methods = ["S256"]
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Redirect URI resolution rules.
    pub redirect: RedirectConfig,

    /// PKCE configuration.
    pub pkce: PkceConfig,

    /// Approval (consent) step configuration.
    pub approval: ApprovalConfig,

    /// Authorization event publication.
    pub events: EventsConfig,
}

/// Redirect URI resolution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedirectConfig {
    /// Grant types for which a redirect URI is meaningful.
    /// A client holding none of these cannot use the authorization endpoint.
    pub redirect_grant_types: Vec<String>,

    /// Accept requested hosts that are subdomains of the registered host.
    pub match_subdomains: bool,

    /// Require requested and registered ports to be equal.
    pub match_ports: bool,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            redirect_grant_types: vec!["authorization_code".to_string(), "implicit".to_string()],
            match_subdomains: false,
            match_ports: true,
        }
    }
}

/// PKCE configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PkceConfig {
    /// Enabled `code_challenge_method` values.
    /// Supported: "plain", "S256"
    pub methods: Vec<String>,
}

impl Default for PkceConfig {
    fn default() -> Self {
        Self {
            methods: vec![PLAIN_METHOD.to_string(), S256_METHOD.to_string()],
        }
    }
}

/// Approval step configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Form field carrying the user's decision (`"true"` approves).
    pub approval_parameter: String,

    /// Prefix of form fields naming individually approved scopes
    /// (`scope.0`, `scope.1`, ...).
    pub scope_prefix: String,

    /// HTTP status used for the final redirect.
    pub redirect_status: RedirectStatus,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            approval_parameter: "user_oauth_approval".to_string(),
            scope_prefix: "scope.".to_string(),
            redirect_status: RedirectStatus::Found,
        }
    }
}

/// Event publication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Publish authorization events.
    pub enabled: bool,

    /// Broadcast channel capacity. Slow subscribers lose the oldest events.
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 1024,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - No redirect grant types are configured
    /// - An unknown PKCE method is enabled
    /// - The approval parameter or scope prefix is empty
    /// - Events are enabled with a zero capacity
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.redirect.redirect_grant_types.is_empty() {
            return Err(ConfigError::Missing(
                "redirect.redirect_grant_types".to_string(),
            ));
        }

        for method in &self.pkce.methods {
            match method.as_str() {
                PLAIN_METHOD | S256_METHOD => {}
                other => {
                    return Err(ConfigError::InvalidValue(format!(
                        "Invalid PKCE method: '{}'. Must be plain or S256",
                        other
                    )));
                }
            }
        }

        if self.approval.approval_parameter.is_empty() {
            return Err(ConfigError::Missing(
                "approval.approval_parameter".to_string(),
            ));
        }

        if self.approval.scope_prefix.is_empty() {
            return Err(ConfigError::Missing("approval.scope_prefix".to_string()));
        }

        if self.events.enabled && self.events.capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "events.capacity must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
