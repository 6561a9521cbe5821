//! Block relations between users.

use serde::Serialize;
use sqlx::FromRow;
use kinship_core::types::{DbId, Timestamp};

/// A row from the `user_blocks` table: `blocker_id` refuses contact from
/// `blocked_id`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserBlock {
    pub id: DbId,
    pub blocker_id: DbId,
    pub blocked_id: DbId,
    pub created_at: Timestamp,
}
