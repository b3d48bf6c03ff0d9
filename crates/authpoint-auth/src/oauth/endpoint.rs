//! Authorization endpoint orchestration.
//!
//! An authorization attempt moves through
//! `Received -> Validated -> AwaitingApproval -> Decided -> Responded`.
//!
//! Errors found before the redirect URI is resolved are returned as `Err` and
//! must be shown to the user directly. Once the redirect URI is known, errors
//! are delivered to the client as an error redirect in the query (code
//! grant) or fragment (implicit grant).
//!
//! # Usage
//!
//! ```ignore
//! use authpoint_auth::oauth::{AuthorizationEndpoint, AuthorizeOutcome};
//!
//! let endpoint = AuthorizationEndpoint::new(&config, clients, codes, tokens)?;
//!
//! match endpoint.handle_authorization_request(&params, &principal).await? {
//!     AuthorizeOutcome::Redirect(redirect) => { /* send redirect */ }
//!     AuthorizeOutcome::RenderApproval(approval) => {
//!         snapshots.store(&principal.subject_id, &approval.snapshot).await?;
//!         /* render consent page */
//!     }
//! }
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;
use url::Url;

use crate::AuthResult;
use crate::config::{ApprovalConfig, AuthConfig, ConfigError};
use crate::error::AuthError;
use crate::events::{AuthorizationEvent, AuthorizationEventBroadcaster, AuthorizationEventKind};
use crate::oauth::grant::{RESPONSE_TYPE_CODE, derive_grant_type};
use crate::oauth::guard::check_unmodified;
use crate::oauth::issuer::{CodeIssuer, TokenIssuer};
use crate::oauth::pkce::PkceValidationService;
use crate::oauth::redirect::RedirectResolver;
use crate::oauth::response::{AuthorizationOutcome, RedirectBuilder, RedirectInstruction};
use crate::oauth::session_state::{
    SessionStateCalculator, Sha256SessionStateCalculator, redirect_origin,
};
use crate::storage::ClientStorage;
use crate::types::{AuthorizationRequest, FrozenSnapshot, GrantType, Principal, RegisteredClient};

// =============================================================================
// Outcomes
// =============================================================================

/// Stage of an authorization attempt, used in log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationPhase {
    Received,
    Validated,
    AwaitingApproval,
    Decided,
    Responded,
}

impl std::fmt::Display for AuthorizationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Decided => "decided",
            Self::Responded => "responded",
        };
        write!(f, "{}", s)
    }
}

/// Consent the caller must render before the request can continue.
///
/// The caller keeps `snapshot` for the user's session and passes it back to
/// [`AuthorizationEndpoint::handle_approval`] with the form submission.
#[derive(Debug, Clone, Serialize)]
pub struct RenderApprovalInstruction {
    pub snapshot: FrozenSnapshot,
    /// Form field carrying the decision.
    pub approval_parameter: String,
    /// Prefix of form fields naming individually approved scopes.
    pub scope_prefix: String,
}

impl RenderApprovalInstruction {
    #[must_use]
    pub fn client_id(&self) -> &str {
        self.snapshot.client_id()
    }

    #[must_use]
    pub fn scope(&self) -> &BTreeSet<String> {
        self.snapshot.scope()
    }
}

/// Result of the first leg of an authorization request.
#[derive(Debug, Clone)]
pub enum AuthorizeOutcome {
    /// Send the user agent to the client.
    Redirect(RedirectInstruction),
    /// Ask the user for consent.
    RenderApproval(RenderApprovalInstruction),
}

// =============================================================================
// Endpoint
// =============================================================================

/// The authorization endpoint state machine.
pub struct AuthorizationEndpoint {
    client_storage: Arc<dyn ClientStorage>,
    code_issuer: Arc<dyn CodeIssuer>,
    token_issuer: Arc<dyn TokenIssuer>,
    session_state: Arc<dyn SessionStateCalculator>,
    redirect_resolver: RedirectResolver,
    pkce: PkceValidationService,
    builder: RedirectBuilder,
    events: AuthorizationEventBroadcaster,
    approval: ApprovalConfig,
}

impl AuthorizationEndpoint {
    /// Creates an endpoint from configuration and collaborators.
    ///
    /// Uses [`Sha256SessionStateCalculator`] for `session_state`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration does not validate.
    pub fn new(
        config: &AuthConfig,
        client_storage: Arc<dyn ClientStorage>,
        code_issuer: Arc<dyn CodeIssuer>,
        token_issuer: Arc<dyn TokenIssuer>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            client_storage,
            code_issuer,
            token_issuer,
            session_state: Arc::new(Sha256SessionStateCalculator),
            redirect_resolver: RedirectResolver::new(&config.redirect),
            pkce: PkceValidationService::from_config(&config.pkce)?,
            builder: RedirectBuilder::new(config.approval.redirect_status),
            events: AuthorizationEventBroadcaster::from_config(&config.events),
            approval: config.approval.clone(),
        })
    }

    /// Replaces the session state calculator.
    #[must_use]
    pub fn with_session_state_calculator(
        mut self,
        calculator: Arc<dyn SessionStateCalculator>,
    ) -> Self {
        self.session_state = calculator;
        self
    }

    /// Replaces the PKCE validation service.
    #[must_use]
    pub fn with_pkce_service(mut self, pkce: PkceValidationService) -> Self {
        self.pkce = pkce;
        self
    }

    /// Shares an existing event broadcaster.
    #[must_use]
    pub fn with_event_broadcaster(mut self, events: AuthorizationEventBroadcaster) -> Self {
        self.events = events;
        self
    }

    /// Event broadcaster for subscribing to authorization events.
    #[must_use]
    pub fn events(&self) -> &AuthorizationEventBroadcaster {
        &self.events
    }

    /// PKCE service, shared with the token endpoint for code exchange.
    #[must_use]
    pub fn pkce(&self) -> &PkceValidationService {
        &self.pkce
    }

    // -------------------------------------------------------------------------
    // Authorization request
    // -------------------------------------------------------------------------

    /// Handles an incoming authorization request.
    ///
    /// Returns either a redirect (auto-approved requests and redirectable
    /// errors) or an instruction to render the approval page.
    ///
    /// # Errors
    ///
    /// Returns an error, which must not be redirected, if:
    /// - `client_id` is missing (`InvalidRequest`)
    /// - the client is unknown (`InvalidClient`)
    /// - the client holds no redirect-based grant type (`InvalidGrant`)
    /// - the redirect URI cannot be resolved (`RedirectMismatch`,
    ///   `InvalidRequest`)
    /// - client storage fails (`Storage`)
    pub async fn handle_authorization_request(
        &self,
        raw_parameters: &HashMap<String, String>,
        principal: &Principal,
    ) -> AuthResult<AuthorizeOutcome> {
        tracing::debug!(phase = %AuthorizationPhase::Received, "Authorization request received");

        let mut request = AuthorizationRequest::from_parameters(raw_parameters).map_err(|e| {
            let client_id = raw_parameters.get("client_id").map_or("", String::as_str);
            self.rejected(client_id, principal, e)
        })?;

        let client = self
            .client_storage
            .find_by_client_id(&request.client_id)
            .await?
            .ok_or_else(|| {
                self.rejected(
                    &request.client_id,
                    principal,
                    AuthError::invalid_client(format!("No client with requested id: {}", request.client_id)),
                )
            })?;

        let resolved = self
            .redirect_resolver
            .resolve_redirect(request.redirect_uri.as_deref(), &client)
            .map_err(|e| self.rejected(&request.client_id, principal, e))?;
        request.redirect_uri = Some(resolved);
        let target = RedirectBuilder::target(&request)?;

        // From here on every failure is redirected.

        if request.response_types.is_empty() {
            return Ok(AuthorizeOutcome::Redirect(self.error_redirect(
                target,
                GrantType::AuthorizationCode,
                &request,
                principal,
                AuthError::invalid_request("A response_type must be supplied."),
            )));
        }

        let grant_type = match derive_grant_type(&request.response_types) {
            Ok(grant_type) => grant_type,
            Err(e) => {
                return Ok(AuthorizeOutcome::Redirect(self.error_redirect(
                    target,
                    GrantType::AuthorizationCode,
                    &request,
                    principal,
                    e,
                )));
            }
        };

        if let Err(e) = self.validate_for_client(&request, &client, grant_type) {
            return Ok(AuthorizeOutcome::Redirect(
                self.error_redirect(target, grant_type, &request, principal, e),
            ));
        }

        tracing::debug!(
            phase = %AuthorizationPhase::Validated,
            client_id = %request.client_id,
            grant_type = %grant_type,
            "Authorization request validated"
        );

        if client.is_auto_approved(&request.scope) {
            request.approved = true;
            self.publish(&request, principal, AuthorizationEventKind::AutoApproved);
            tracing::debug!(client_id = %request.client_id, "Request auto-approved");
            return Ok(AuthorizeOutcome::Redirect(
                self.respond(target, grant_type, request, principal).await,
            ));
        }

        if request.is_prompt_none() {
            return Ok(AuthorizeOutcome::Redirect(self.error_redirect(
                target,
                grant_type,
                &request,
                principal,
                AuthError::interaction_required("User approval is required but prompt=none was requested."),
            )));
        }

        let snapshot = request.freeze();
        self.publish(
            &request,
            principal,
            AuthorizationEventKind::ApprovalRequested {
                snapshot_id: snapshot.id(),
            },
        );
        tracing::debug!(
            phase = %AuthorizationPhase::AwaitingApproval,
            client_id = %request.client_id,
            snapshot_id = %snapshot.id(),
            "Awaiting user approval"
        );

        Ok(AuthorizeOutcome::RenderApproval(RenderApprovalInstruction {
            snapshot,
            approval_parameter: self.approval.approval_parameter.clone(),
            scope_prefix: self.approval.scope_prefix.clone(),
        }))
    }

    /// Client-specific checks run after the redirect URI is resolved.
    fn validate_for_client(
        &self,
        request: &AuthorizationRequest,
        client: &RegisteredClient,
        grant_type: GrantType,
    ) -> AuthResult<()> {
        if !client.is_grant_type_allowed(grant_type) {
            return Err(AuthError::unauthorized_client(format!(
                "Client is not authorized for the {} grant",
                grant_type
            )));
        }

        if let Some(scope) = request.scope.iter().find(|s| !client.is_scope_allowed(s)) {
            return Err(AuthError::invalid_scope(format!(
                "Invalid scope: {}. Did you know that you can get default scopes by simply sending no value?",
                scope
            )));
        }

        self.pkce
            .validate_request_parameters(&request.request_parameters)
            .map_err(AuthError::from)
    }

    // -------------------------------------------------------------------------
    // Approval
    // -------------------------------------------------------------------------

    /// Handles the user's approval decision.
    ///
    /// `stored_original` is the snapshot returned with the approval
    /// instruction; `resubmitted` is the request as it came back with the
    /// form. Denial yields an `access_denied` redirect. `scope.N` fields may
    /// narrow the granted scope; naming a scope outside the original request
    /// yields an `invalid_scope` redirect.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest`, which must not be redirected, if the
    /// resubmitted request differs from the snapshot.
    pub async fn handle_approval(
        &self,
        approval_parameters: &HashMap<String, String>,
        stored_original: &FrozenSnapshot,
        resubmitted: &AuthorizationRequest,
        principal: &Principal,
    ) -> AuthResult<RedirectInstruction> {
        if let Err(e) = check_unmodified(stored_original, resubmitted) {
            tracing::warn!(
                client_id = %stored_original.client_id(),
                subject_id = %principal.subject_id,
                "Authorization request was modified before approval"
            );
            self.publish(
                stored_original.request(),
                principal,
                AuthorizationEventKind::TamperDetected,
            );
            return Err(e);
        }

        let mut request = stored_original.to_request();
        let target = RedirectBuilder::target(&request)?;
        let grant_type = derive_grant_type(&request.response_types)?;

        let approved = approval_parameters
            .get(&self.approval.approval_parameter)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        tracing::debug!(
            phase = %AuthorizationPhase::Decided,
            client_id = %request.client_id,
            approved,
            "Approval decision received"
        );

        if !approved {
            self.publish(&request, principal, AuthorizationEventKind::AccessDenied);
            return Ok(self.error_redirect(
                target,
                grant_type,
                &request,
                principal,
                AuthError::access_denied("User denied access"),
            ));
        }

        let reduced: BTreeSet<String> = approval_parameters
            .iter()
            .filter(|(k, _)| k.starts_with(&self.approval.scope_prefix))
            .map(|(_, v)| v.clone())
            .collect();

        if !reduced.is_empty() {
            if let Some(extra) = reduced.iter().find(|s| !request.scope.contains(*s)) {
                return Ok(self.error_redirect(
                    target,
                    grant_type,
                    &request,
                    principal,
                    AuthError::invalid_scope(format!(
                        "The requested scopes are invalid. Please use valid scope names in the request: {}",
                        extra
                    )),
                ));
            }
            request.scope = reduced;
        }

        request.approved = true;
        Ok(self.respond(target, grant_type, request, principal).await)
    }

    // -------------------------------------------------------------------------
    // Response
    // -------------------------------------------------------------------------

    /// Issues a code or token for an approved request and builds the final
    /// redirect. Collaborator failures become a `server_error` redirect.
    async fn respond(
        &self,
        target: Url,
        grant_type: GrantType,
        request: AuthorizationRequest,
        principal: &Principal,
    ) -> RedirectInstruction {
        match self.issue(&target, grant_type, &request, principal).await {
            Ok((outcome, session_state)) => {
                let kind = match outcome {
                    AuthorizationOutcome::Code { .. } => AuthorizationEventKind::CodeIssued { grant_type },
                    AuthorizationOutcome::Implicit { .. } => {
                        AuthorizationEventKind::TokenIssued { grant_type }
                    }
                };
                self.publish(&request, principal, kind);
                tracing::info!(
                    phase = %AuthorizationPhase::Responded,
                    client_id = %request.client_id,
                    subject_id = %principal.subject_id,
                    grant_type = %grant_type,
                    "Authorization granted"
                );
                self.builder
                    .build(target, &request, &outcome, session_state.as_deref())
            }
            Err(e) => {
                tracing::error!(
                    client_id = %request.client_id,
                    error = %e,
                    "Authorization response could not be issued"
                );
                self.error_redirect(
                    target,
                    grant_type,
                    &request,
                    principal,
                    AuthError::internal("The authorization response could not be issued."),
                )
            }
        }
    }

    /// Computes the session state first, then asks the issuers. For hybrid
    /// implicit responses the code is issued before the token.
    async fn issue(
        &self,
        target: &Url,
        grant_type: GrantType,
        request: &AuthorizationRequest,
        principal: &Principal,
    ) -> AuthResult<(AuthorizationOutcome, Option<String>)> {
        let session_state = if request.is_prompt_none() {
            Some(self.session_state.calculate(
                &principal.subject_id,
                &request.client_id,
                &redirect_origin(target),
            )?)
        } else {
            None
        };

        let outcome = match grant_type {
            GrantType::AuthorizationCode => AuthorizationOutcome::Code {
                code: self.code_issuer.issue(request, principal).await?,
            },
            GrantType::Implicit => {
                let code = if request.response_types.contains(RESPONSE_TYPE_CODE) {
                    Some(self.code_issuer.issue(request, principal).await?)
                } else {
                    None
                };
                let token = self.token_issuer.issue(request, principal).await?;
                AuthorizationOutcome::Implicit { token, code }
            }
        };

        Ok((outcome, session_state))
    }

    fn error_redirect(
        &self,
        target: Url,
        grant_type: GrantType,
        request: &AuthorizationRequest,
        principal: &Principal,
        error: AuthError,
    ) -> RedirectInstruction {
        tracing::warn!(
            client_id = %request.client_id,
            error = error.oauth_error_code(),
            category = %error.category(),
            "Authorization request rejected with redirect"
        );
        if !matches!(error, AuthError::AccessDenied { .. }) {
            self.publish(
                request,
                principal,
                AuthorizationEventKind::RequestRejected {
                    error: error.error_code(),
                },
            );
        }
        self.builder
            .error(target, grant_type, &error, request.state.as_deref())
    }

    /// Logs and publishes an error that is returned without redirect.
    fn rejected(&self, client_id: &str, principal: &Principal, error: AuthError) -> AuthError {
        tracing::warn!(
            client_id = %client_id,
            error = error.oauth_error_code(),
            category = %error.category(),
            "Authorization request rejected"
        );
        self.events.send(
            AuthorizationEvent::new(
                AuthorizationEventKind::RequestRejected {
                    error: error.error_code(),
                },
                client_id,
            )
            .with_subject(&principal.subject_id),
        );
        error
    }

    fn publish(
        &self,
        request: &AuthorizationRequest,
        principal: &Principal,
        kind: AuthorizationEventKind,
    ) {
        self.events.send(
            AuthorizationEvent::new(kind, &request.client_id).with_subject(&principal.subject_id),
        );
    }
}

impl std::fmt::Debug for AuthorizationEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationEndpoint")
            .field("redirect_resolver", &self.redirect_resolver)
            .field("pkce", &self.pkce)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}
