//! Authorization events.
//!
//! The endpoint pushes a domain event onto a tokio broadcast channel at each
//! decision point. Publishing never blocks and never fails: with no
//! subscribers the event is dropped, and slow subscribers lose the oldest
//! events once the channel is full.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::EventsConfig;
use crate::oauth::response::AuthorizationErrorCode;
use crate::types::GrantType;

const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Kind of authorization event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthorizationEventKind {
    /// The approval page is about to be rendered.
    ApprovalRequested { snapshot_id: Uuid },
    /// Approval was skipped through the client's auto-approve patterns.
    AutoApproved,
    /// An authorization code was issued.
    CodeIssued { grant_type: GrantType },
    /// An access token was issued.
    TokenIssued { grant_type: GrantType },
    /// The user denied the request.
    AccessDenied,
    /// The resubmitted request differed from the frozen snapshot.
    TamperDetected,
    /// The request was rejected.
    RequestRejected { error: AuthorizationErrorCode },
}

/// An event with the context it happened in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationEvent {
    pub kind: AuthorizationEventKind,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl AuthorizationEvent {
    #[must_use]
    pub fn new(kind: AuthorizationEventKind, client_id: impl Into<String>) -> Self {
        Self {
            kind,
            client_id: client_id.into(),
            subject_id: None,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    #[must_use]
    pub fn with_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }
}

/// Broadcasts authorization events to any number of subscribers.
#[derive(Clone)]
pub struct AuthorizationEventBroadcaster {
    sender: Option<broadcast::Sender<AuthorizationEvent>>,
}

impl AuthorizationEventBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Some(sender),
        }
    }

    /// A broadcaster that drops every event.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn from_config(config: &EventsConfig) -> Self {
        if config.enabled {
            Self::with_capacity(config.capacity)
        } else {
            Self::disabled()
        }
    }

    /// Publishes an event, returning the number of subscribers reached.
    pub fn send(&self, event: AuthorizationEvent) -> usize {
        match &self.sender {
            Some(sender) => sender.send(event).unwrap_or_default(),
            None => 0,
        }
    }

    /// Subscribes to future events. A disabled broadcaster yields a receiver
    /// that is already closed.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthorizationEvent> {
        match &self.sender {
            Some(sender) => sender.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.as_ref().map_or(0, broadcast::Sender::receiver_count)
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }
}

impl Default for AuthorizationEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AuthorizationEventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationEventBroadcaster")
            .field("enabled", &self.is_enabled())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
