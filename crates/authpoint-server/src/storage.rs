//! In-memory collaborators for the authorization endpoint.
//!
//! Everything here lives for the lifetime of the process. Suitable for
//! development and tests, not for a multi-instance deployment.

use async_trait::async_trait;
use authpoint_auth::{
    AuthResult, AuthorizationRequest, ClientStorage, CodeIssuer, FrozenSnapshot, IssuedToken,
    Principal, RegisteredClient, SnapshotStorage, TokenIssuer,
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use dashmap::DashMap;
use rand::RngCore;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Bytes of randomness in generated codes and tokens.
const RANDOM_VALUE_BYTES: usize = 32;

fn random_value() -> String {
    let mut bytes = [0u8; RANDOM_VALUE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

// ---- Clients ----

/// Client registrations loaded from configuration.
#[derive(Debug, Default)]
pub struct InMemoryClientStorage {
    clients: DashMap<String, RegisteredClient>,
}

impl InMemoryClientStorage {
    pub fn new(clients: impl IntoIterator<Item = RegisteredClient>) -> Self {
        Self {
            clients: clients
                .into_iter()
                .map(|c| (c.client_id.clone(), c))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[async_trait]
impl ClientStorage for InMemoryClientStorage {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<RegisteredClient>> {
        Ok(self.clients.get(client_id).map(|c| c.value().clone()))
    }
}

// ---- Snapshots ----

#[derive(Debug)]
struct OwnedSnapshot {
    owner: String,
    snapshot: FrozenSnapshot,
}

/// Snapshots keyed by id, each bound to the user it was rendered for.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStorage {
    snapshots: DashMap<Uuid, OwnedSnapshot>,
}

impl InMemorySnapshotStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[async_trait]
impl SnapshotStorage for InMemorySnapshotStorage {
    async fn store(&self, owner: &str, snapshot: &FrozenSnapshot) -> AuthResult<()> {
        self.snapshots.insert(
            snapshot.id(),
            OwnedSnapshot {
                owner: owner.to_string(),
                snapshot: snapshot.clone(),
            },
        );
        Ok(())
    }

    async fn take(&self, owner: &str, id: Uuid) -> AuthResult<Option<FrozenSnapshot>> {
        Ok(self
            .snapshots
            .remove_if(&id, |_, entry| entry.owner == owner)
            .map(|(_, entry)| entry.snapshot))
    }

    async fn cleanup_expired(&self, max_age: Duration) -> AuthResult<u64> {
        let cutoff = OffsetDateTime::now_utc() - max_age;
        let before = self.snapshots.len();
        self.snapshots
            .retain(|_, entry| entry.snapshot.frozen_at() > cutoff);
        Ok(before.saturating_sub(self.snapshots.len()) as u64)
    }
}

// ---- Codes ----

/// What a code was issued for.
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub request: AuthorizationRequest,
    pub subject_id: String,
    pub issued_at: OffsetDateTime,
}

/// Issues random codes and keeps them until redeemed or expired.
#[derive(Debug)]
pub struct InMemoryCodeIssuer {
    codes: DashMap<String, IssuedCode>,
    max_age: Duration,
}

impl Default for InMemoryCodeIssuer {
    fn default() -> Self {
        Self::new(Duration::minutes(5))
    }
}

impl InMemoryCodeIssuer {
    pub fn new(max_age: Duration) -> Self {
        Self {
            codes: DashMap::new(),
            max_age,
        }
    }

    /// Removes and returns a code. A code can be redeemed once, and not
    /// after it expired.
    pub fn redeem(&self, code: &str) -> Option<IssuedCode> {
        let cutoff = OffsetDateTime::now_utc() - self.max_age;
        self.codes
            .remove(code)
            .map(|(_, c)| c)
            .filter(|c| c.issued_at > cutoff)
    }

    /// Drops codes older than the configured maximum age.
    pub fn cleanup_expired(&self) -> usize {
        let cutoff = OffsetDateTime::now_utc() - self.max_age;
        let before = self.codes.len();
        self.codes.retain(|_, c| c.issued_at > cutoff);
        before.saturating_sub(self.codes.len())
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

#[async_trait]
impl CodeIssuer for InMemoryCodeIssuer {
    async fn issue(
        &self,
        approved: &AuthorizationRequest,
        principal: &Principal,
    ) -> AuthResult<String> {
        let code = random_value();
        self.codes.insert(
            code.clone(),
            IssuedCode {
                request: approved.clone(),
                subject_id: principal.subject_id.clone(),
                issued_at: OffsetDateTime::now_utc(),
            },
        );
        Ok(code)
    }
}

// ---- Tokens ----

/// Issues opaque bearer tokens for the implicit flow.
#[derive(Debug, Clone)]
pub struct RandomTokenIssuer {
    lifetime: Duration,
}

impl RandomTokenIssuer {
    pub fn new(lifetime: Duration) -> Self {
        Self { lifetime }
    }
}

impl Default for RandomTokenIssuer {
    fn default() -> Self {
        Self::new(Duration::hours(1))
    }
}

#[async_trait]
impl TokenIssuer for RandomTokenIssuer {
    async fn issue(
        &self,
        approved: &AuthorizationRequest,
        _principal: &Principal,
    ) -> AuthResult<IssuedToken> {
        Ok(
            IssuedToken::bearer(random_value(), OffsetDateTime::now_utc() + self.lifetime)
                .with_scope(approved.scope.clone()),
        )
    }
}
