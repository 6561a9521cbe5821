//! Directory entries used for PIN and email discovery.

use serde::Serialize;
use sqlx::FromRow;
use kinship_core::types::{DbId, Timestamp};

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    pub display_name: String,
    pub email: String,
    pub pin: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for registering a directory entry.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub display_name: String,
    pub email: String,
    pub pin: Option<String>,
}
