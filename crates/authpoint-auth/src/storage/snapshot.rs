//! Snapshot storage trait.
//!
//! Holds frozen authorization requests between rendering the approval page
//! and receiving the user's decision. Entries belong to the user the page
//! was rendered for, are never handed to anyone else, and are removed once
//! read.

use async_trait::async_trait;
use time::Duration;
use uuid::Uuid;

use crate::AuthResult;
use crate::types::FrozenSnapshot;

#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// Stores a snapshot under its id for `owner`.
    async fn store(&self, owner: &str, snapshot: &FrozenSnapshot) -> AuthResult<()>;

    /// Removes and returns the snapshot with the given id. Returns `None`
    /// if it does not exist or belongs to someone other than `owner`.
    async fn take(&self, owner: &str, id: Uuid) -> AuthResult<Option<FrozenSnapshot>>;

    /// Removes snapshots older than `max_age`, returning how many were
    /// removed.
    async fn cleanup_expired(&self, max_age: Duration) -> AuthResult<u64>;
}
