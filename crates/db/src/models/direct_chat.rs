//! Direct chats opened when a connection is accepted.

use serde::Serialize;
use sqlx::FromRow;
use kinship_core::types::{DbId, Timestamp};

/// A row from the `direct_chats` table (canonical pair order).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DirectChat {
    pub id: DbId,
    pub user_a_id: DbId,
    pub user_b_id: DbId,
    pub created_at: Timestamp,
}
