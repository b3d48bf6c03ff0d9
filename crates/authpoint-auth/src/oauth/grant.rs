//! Grant type derivation from requested response types.

use std::collections::BTreeSet;

use crate::AuthResult;
use crate::error::AuthError;
use crate::types::GrantType;

pub const RESPONSE_TYPE_CODE: &str = "code";
pub const RESPONSE_TYPE_TOKEN: &str = "token";
pub const RESPONSE_TYPE_ID_TOKEN: &str = "id_token";

/// Selects the grant type for a set of response types.
///
/// First match wins:
/// 1. `token` present: implicit
/// 2. `code` present: authorization code (also for `code id_token`)
/// 3. `id_token` present: implicit
///
/// # Errors
///
/// Returns `UnsupportedResponseType` for any other set, including the
/// empty set.
pub fn derive_grant_type(response_types: &BTreeSet<String>) -> AuthResult<GrantType> {
    if response_types.contains(RESPONSE_TYPE_TOKEN) {
        Ok(GrantType::Implicit)
    } else if response_types.contains(RESPONSE_TYPE_CODE) {
        Ok(GrantType::AuthorizationCode)
    } else if response_types.contains(RESPONSE_TYPE_ID_TOKEN) {
        Ok(GrantType::Implicit)
    } else {
        let joined = response_types
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        Err(AuthError::unsupported_response_type(joined))
    }
}
