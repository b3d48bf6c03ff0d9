use std::collections::HashMap;
use std::sync::Arc;

use authpoint_auth::oauth::params;
use authpoint_auth::{
    AuthError, AuthenticatedPrincipal, AuthenticatorState, AuthorizationEndpoint,
    AuthorizationRequest, AuthorizeOutcome, FrozenSnapshot, SnapshotStorage,
};
use axum::{
    Form, Json,
    extract::{FromRef, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::storage::InMemoryCodeIssuer;

/// Form field naming the snapshot an approval answers.
pub const SNAPSHOT_ID_FIELD: &str = "snapshot_id";

#[derive(Clone)]
pub struct AppState {
    pub endpoint: Arc<AuthorizationEndpoint>,
    pub snapshots: Arc<dyn SnapshotStorage>,
    pub codes: Arc<InMemoryCodeIssuer>,
    pub authenticator: AuthenticatorState,
}

impl FromRef<AppState> for AuthenticatorState {
    fn from_ref(state: &AppState) -> Self {
        state.authenticator.clone()
    }
}

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn root() -> impl IntoResponse {
    let body = json!({
        "service": "authpoint",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// GET /oauth/authorize
///
/// Redirects straight back to the client, or stores the frozen request and
/// answers with the consent to render.
pub async fn authorize_get(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, AuthError> {
    let outcome = state
        .endpoint
        .handle_authorization_request(&query, &principal)
        .await?;

    if let AuthorizeOutcome::RenderApproval(approval) = &outcome {
        state
            .snapshots
            .store(&principal.subject_id, &approval.snapshot)
            .await?;
    }
    Ok(outcome.into_response())
}

/// POST /oauth/authorize
///
/// Receives the consent form. The snapshot is consumed whatever the outcome.
pub async fn authorize_post(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Form(form): Form<HashMap<String, String>>,
) -> Result<Response, AuthError> {
    let snapshot_id = form
        .get(SNAPSHOT_ID_FIELD)
        .and_then(|id| Uuid::parse_str(id).ok())
        .ok_or_else(|| AuthError::invalid_request("A valid snapshot_id must be supplied."))?;

    let snapshot = state
        .snapshots
        .take(&principal.subject_id, snapshot_id)
        .await?
        .ok_or_else(|| {
            AuthError::invalid_request("The authorization request expired or was already answered.")
        })?;

    let resubmitted = resubmitted_request(&snapshot, &form);
    let redirect = state
        .endpoint
        .handle_approval(&form, &snapshot, &resubmitted, &principal)
        .await?;
    Ok(redirect.into_response())
}

/// The stored request with any request fields echoed by the consent form
/// laid over it.
fn resubmitted_request(
    snapshot: &FrozenSnapshot,
    form: &HashMap<String, String>,
) -> AuthorizationRequest {
    let mut request = snapshot.to_request();
    if let Some(client_id) = form.get(params::CLIENT_ID) {
        request.client_id = client_id.clone();
    }
    if let Some(redirect_uri) = form.get(params::REDIRECT_URI) {
        request.redirect_uri = Some(redirect_uri.clone()).filter(|v| !v.is_empty());
    }
    if let Some(state) = form.get(params::STATE) {
        request.state = Some(state.clone()).filter(|v| !v.is_empty());
    }
    if let Some(scope) = form.get(params::SCOPE) {
        request.scope = params::parse_parameter_list(scope);
    }
    if let Some(response_type) = form.get(params::RESPONSE_TYPE) {
        request.response_types = params::parse_parameter_list(response_type);
    }
    request
}
