//! Storage traits for the authorization endpoint.
//!
//! - Client registrations, read-only
//! - Frozen snapshots awaiting approval
//!
//! Implementations live with the embedding application.

pub mod client;
pub mod snapshot;

pub use client::ClientStorage;
pub use snapshot::SnapshotStorage;
