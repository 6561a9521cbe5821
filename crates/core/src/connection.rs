//! Connection lifecycle vocabulary: request and connection statuses, respond
//! actions, interaction kinds, and the stable reason strings surfaced to
//! callers.
//!
//! Status values are stored as `TEXT` columns, so every enum here round-trips
//! through its snake_case string form.

use crate::types::DbId;

define_text_enum! {
    /// Lifecycle of a connection request.
    RequestStatus {
        Pending = "pending",
        Accepted = "accepted",
        Declined = "declined",
        Blocked = "blocked",
    }
}

define_text_enum! {
    /// Lifecycle of an established connection.
    ConnectionStatus {
        Pending = "pending",
        Accepted = "accepted",
        Blocked = "blocked",
        Declined = "declined",
    }
}

define_text_enum! {
    /// What the receiver of a request chose to do with it.
    RespondAction {
        Accept = "accept",
        Decline = "decline",
        Block = "block",
    }
}

define_text_enum! {
    /// Interaction counters tracked per connection.
    InteractionKind {
        Message = "message",
        VoiceCall = "voice_call",
        VideoCall = "video_call",
    }
}

impl RespondAction {
    /// The request status an action moves a pending request into.
    pub fn resulting_status(self) -> RequestStatus {
        match self {
            RespondAction::Accept => RequestStatus::Accepted,
            RespondAction::Decline => RequestStatus::Declined,
            RespondAction::Block => RequestStatus::Blocked,
        }
    }
}

/// Longest optional note attached to a connection request.
pub const MAX_REQUEST_NOTE_CHARS: usize = 500;

/// Canonical storage order for an unordered user pair (`lower`, `higher`).
pub fn ordered_pair(a: DbId, b: DbId) -> (DbId, DbId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Stable reason strings returned with rejected operations.
pub mod reasons {
    pub const CANNOT_CONNECT_TO_SELF: &str = "cannot connect to self";
    pub const ALREADY_SENT: &str = "already sent";
    pub const ALREADY_PENDING_FROM_TARGET: &str = "request already pending from this user";
    pub const ALREADY_CONNECTED: &str = "already connected";
    pub const ALREADY_RESPONDED: &str = "already responded";
    pub const BLOCKED: &str = "blocked";
    pub const NOT_ADDRESSED_TO_YOU: &str = "request not addressed to you";
    pub const NOT_A_PARTICIPANT: &str = "not a participant in this connection";
    pub const NOT_ACCEPTED: &str = "connection not accepted";
    pub const MUTUAL_CONSENT_REQUIRED: &str = "mutual consent required";
    pub const REQUIREMENTS_NOT_MET: &str = "requirements not met";
    pub const LEVEL_SKIP: &str = "trust level must advance one step at a time";
    pub const DOWNGRADE_NOT_PERMITTED: &str = "trust level cannot decrease";
    pub const ALREADY_AT_LEVEL: &str = "already at this trust level";
    pub const CAPABILITY_LOCKED: &str = "capability not unlocked at this trust level";
    pub const MESSAGE_TOO_LONG: &str = "message exceeds the limit for this trust level";
    pub const EMPTY_MESSAGE: &str = "message must not be empty";
    pub const REQUEST_NOTE_TOO_LONG: &str = "request message too long";
    pub const NOT_A_CALL: &str = "interaction is not a call";
    pub const CONCURRENT_UPDATE: &str = "connection changed concurrently";
    pub const DUPLICATE_PIN: &str = "duplicate pin";
    pub const INVALID_PIN: &str = "invalid pin format";
    pub const INVALID_EMAIL: &str = "invalid email address";
    pub const INVALID_QR: &str = "invalid qr payload";
}
