//! Connection activity audit rows.

use serde::Serialize;
use sqlx::FromRow;
use kinship_core::types::{DbId, Timestamp};

/// A row from the `connection_activity` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ConnectionActivity {
    pub id: DbId,
    pub event_type: String,
    pub connection_id: Option<DbId>,
    pub request_id: Option<DbId>,
    pub actor_user_id: Option<DbId>,
    pub target_user_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
}

/// DTO for appending an activity row.
#[derive(Debug, Clone)]
pub struct CreateConnectionActivity {
    pub event_type: String,
    pub connection_id: Option<DbId>,
    pub request_id: Option<DbId>,
    pub actor_user_id: Option<DbId>,
    pub target_user_id: Option<DbId>,
    pub payload: serde_json::Value,
    /// When the event happened, not when the row was written.
    pub occurred_at: Timestamp,
}
