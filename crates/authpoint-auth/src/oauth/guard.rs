//! Tamper detection between the frozen request and the approval resubmission.

use crate::AuthResult;
use crate::error::AuthError;
use crate::types::{AuthorizationRequest, FrozenSnapshot};

const TAMPER_MESSAGE: &str = "Changes were detected from the original authorization request.";

/// Fails with `InvalidRequest` if any guarded field of `resubmitted`
/// differs from the snapshot.
///
/// Guarded: client_id, redirect_uri, state, scope, response_types, approved,
/// resource_ids, authorities. Sets compare order-insensitively.
/// `request_parameters` and `extensions` are not guarded.
///
/// # Errors
///
/// Returns `InvalidRequest` naming nothing about which field changed.
pub fn check_unmodified(
    original: &FrozenSnapshot,
    resubmitted: &AuthorizationRequest,
) -> AuthResult<()> {
    match modified_field(original.request(), resubmitted) {
        None => Ok(()),
        Some(field) => {
            tracing::debug!(
                client_id = %original.client_id(),
                field,
                "Authorization request modified before approval"
            );
            Err(AuthError::invalid_request(TAMPER_MESSAGE))
        }
    }
}

/// Returns the name of the first guarded field that differs.
pub(crate) fn modified_field(
    original: &AuthorizationRequest,
    resubmitted: &AuthorizationRequest,
) -> Option<&'static str> {
    if original.client_id != resubmitted.client_id {
        Some("client_id")
    } else if original.redirect_uri != resubmitted.redirect_uri {
        Some("redirect_uri")
    } else if original.state != resubmitted.state {
        Some("state")
    } else if original.scope != resubmitted.scope {
        Some("scope")
    } else if original.response_types != resubmitted.response_types {
        Some("response_types")
    } else if original.approved != resubmitted.approved {
        Some("approved")
    } else if original.resource_ids != resubmitted.resource_ids {
        Some("resource_ids")
    } else if original.authorities != resubmitted.authorities {
        Some("authorities")
    } else {
        None
    }
}
