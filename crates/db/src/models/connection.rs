//! Established connections between two users.

use serde::Serialize;
use sqlx::FromRow;
use kinship_core::connection::ConnectionStatus;
use kinship_core::trust::{ConnectionSnapshot, TrustLevel};
use kinship_core::types::{DbId, Timestamp};

/// A row from the `connections` table.
///
/// Exactly one row exists per unordered pair, stored with
/// `user_a_id < user_b_id`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Connection {
    pub id: DbId,
    pub user_a_id: DbId,
    pub user_b_id: DbId,
    #[sqlx(try_from = "String")]
    pub status: ConnectionStatus,
    #[sqlx(try_from = "i16")]
    pub trust_level: TrustLevel,
    pub message_count: i64,
    pub voice_call_count: i64,
    pub video_call_count: i64,
    pub trust_updated_by: Option<DbId>,
    pub created_at: Timestamp,
    pub accepted_at: Option<Timestamp>,
    pub last_interaction_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl Connection {
    pub fn involves(&self, user_id: DbId) -> bool {
        self.user_a_id == user_id || self.user_b_id == user_id
    }

    /// The participant that is not `user_id`, or `None` if `user_id` is not
    /// part of this connection.
    pub fn counterpart(&self, user_id: DbId) -> Option<DbId> {
        if user_id == self.user_a_id {
            Some(self.user_b_id)
        } else if user_id == self.user_b_id {
            Some(self.user_a_id)
        } else {
            None
        }
    }

    pub fn participants(&self) -> (DbId, DbId) {
        (self.user_a_id, self.user_b_id)
    }

    /// The fields the trust state machine evaluates.
    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            status: self.status,
            trust_level: self.trust_level,
            accepted_at: self.accepted_at,
            message_count: self.message_count,
            voice_call_count: self.voice_call_count,
            video_call_count: self.video_call_count,
        }
    }
}
