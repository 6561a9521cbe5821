//! Payloads delivered to connected sessions.
//!
//! Every event serializes as `{"type": <kind>, "data": {...}}`. The set is
//! closed: adding a kind means adding a variant, and every `match` on it
//! must be updated.

use serde::{Deserialize, Serialize};
use kinship_core::trust::TrustLevel;
use kinship_core::types::DbId;

/// An event pushed to every active session of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RealtimeEvent {
    /// A new request is waiting for the receiver.
    ConnectionRequest {
        request_id: DbId,
        sender: DbId,
        message: Option<String>,
    },
    /// The receiver accepted; sent to the original sender. `chat_id` is
    /// null when the direct chat could not be opened yet.
    ConnectionAccepted {
        request_id: DbId,
        accepter: DbId,
        chat_id: Option<DbId>,
    },
    /// The connection was blocked by `blocked_by`.
    ConnectionBlocked {
        connection_id: DbId,
        blocked_by: DbId,
    },
    /// The stored trust level advanced. Sent to both participants.
    TrustLevelChanged {
        connection_id: DbId,
        new_level: TrustLevel,
    },
    /// The counterpart proposed a level and is waiting for consent.
    TrustLevelProposed {
        connection_id: DbId,
        proposer: DbId,
        target_level: TrustLevel,
    },
    /// A text message relayed over an accepted connection.
    NewMessage {
        connection_id: DbId,
        sender: DbId,
        text: String,
    },
}

impl RealtimeEvent {
    /// The `type` tag this event serializes with.
    pub fn kind(&self) -> &'static str {
        match self {
            RealtimeEvent::ConnectionRequest { .. } => "connection_request",
            RealtimeEvent::ConnectionAccepted { .. } => "connection_accepted",
            RealtimeEvent::ConnectionBlocked { .. } => "connection_blocked",
            RealtimeEvent::TrustLevelChanged { .. } => "trust_level_changed",
            RealtimeEvent::TrustLevelProposed { .. } => "trust_level_proposed",
            RealtimeEvent::NewMessage { .. } => "new_message",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
