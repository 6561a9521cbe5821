//! Connection requests created by discovery.

use serde::Serialize;
use sqlx::FromRow;
use kinship_core::connection::RequestStatus;
use kinship_core::types::{DbId, Timestamp};

/// A row from the `connection_requests` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ConnectionRequest {
    pub id: DbId,
    pub sender_id: DbId,
    pub receiver_id: DbId,
    pub message: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: RequestStatus,
    pub created_at: Timestamp,
    pub responded_at: Option<Timestamp>,
}

/// DTO for creating a pending request.
#[derive(Debug, Clone)]
pub struct CreateConnectionRequest {
    pub sender_id: DbId,
    pub receiver_id: DbId,
    pub message: Option<String>,
}
