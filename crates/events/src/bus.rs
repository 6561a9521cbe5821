//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] fans [`ActivityEvent`]s out to every subscriber (the audit
//! persistence task, and anything else that wants to observe connection
//! activity). Shared as `Arc<EventBus>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use kinship_core::types::DbId;

// ---------------------------------------------------------------------------
// ActivityEvent
// ---------------------------------------------------------------------------

/// Event type names written to `connection_activity.event_type`.
pub mod activity {
    pub const REQUEST_SENT: &str = "connection.request_sent";
    pub const REQUEST_ACCEPTED: &str = "connection.request_accepted";
    pub const REQUEST_DECLINED: &str = "connection.request_declined";
    pub const REQUEST_BLOCKED: &str = "connection.request_blocked";
    pub const CONNECTION_BLOCKED: &str = "connection.blocked";
    pub const LEVEL_PROPOSED: &str = "trust.level_proposed";
    pub const LEVEL_CHANGED: &str = "trust.level_changed";
    pub const MESSAGE_RELAYED: &str = "interaction.message";
    pub const CALL_RECORDED: &str = "interaction.call";
    pub const PIN_REGENERATED: &str = "discovery.pin_regenerated";
}

/// A durable record of something that happened to a request or connection.
///
/// Built with [`ActivityEvent::new`] and the `with_*` methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Dot-separated name, one of the [`activity`] constants.
    pub event_type: String,
    pub connection_id: Option<DbId>,
    pub request_id: Option<DbId>,
    /// The user whose call caused the event.
    pub actor_user_id: Option<DbId>,
    /// The other party, when there is one.
    pub target_user_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            connection_id: None,
            request_id: None,
            actor_user_id: None,
            target_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_connection(mut self, connection_id: DbId) -> Self {
        self.connection_id = Some(connection_id);
        self
    }

    pub fn with_request(mut self, request_id: DbId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn with_actor(mut self, user_id: DbId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    pub fn with_target(mut self, user_id: DbId) -> Self {
        self.target_user_id = Some(user_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus for [`ActivityEvent`]s.
pub struct EventBus {
    sender: broadcast::Sender<ActivityEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest unread events are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Dropped silently if there are none.
    pub fn publish(&self, event: ActivityEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActivityEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
