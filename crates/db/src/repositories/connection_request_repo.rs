//! Repository for the `connection_requests` table.

use sqlx::PgPool;
use kinship_core::connection::RequestStatus;
use kinship_core::types::DbId;

use crate::models::connection_request::{ConnectionRequest, CreateConnectionRequest};

/// Column list for `connection_requests` queries.
const COLUMNS: &str = "id, sender_id, receiver_id, message, status, created_at, responded_at";

/// Provides CRUD operations for connection requests.
pub struct ConnectionRequestRepo;

impl ConnectionRequestRepo {
    /// Insert a pending request.
    ///
    /// The partial unique index `uq_connection_requests_pending_pair` rejects
    /// a second pending request for the same unordered pair.
    pub async fn create(
        pool: &PgPool,
        input: &CreateConnectionRequest,
    ) -> Result<ConnectionRequest, sqlx::Error> {
        let query = format!(
            "INSERT INTO connection_requests (sender_id, receiver_id, message, status) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ConnectionRequest>(&query)
            .bind(input.sender_id)
            .bind(input.receiver_id)
            .bind(&input.message)
            .bind(RequestStatus::Pending.as_str())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ConnectionRequest>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM connection_requests WHERE id = $1");
        sqlx::query_as::<_, ConnectionRequest>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The pending request from `sender_id` to `receiver_id`, if any.
    pub async fn find_pending(
        pool: &PgPool,
        sender_id: DbId,
        receiver_id: DbId,
    ) -> Result<Option<ConnectionRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM connection_requests \
             WHERE sender_id = $1 AND receiver_id = $2 AND status = $3"
        );
        sqlx::query_as::<_, ConnectionRequest>(&query)
            .bind(sender_id)
            .bind(receiver_id)
            .bind(RequestStatus::Pending.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Pending requests addressed to a user, oldest first.
    pub async fn list_pending_for_receiver(
        pool: &PgPool,
        receiver_id: DbId,
    ) -> Result<Vec<ConnectionRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM connection_requests \
             WHERE receiver_id = $1 AND status = $2 \
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, ConnectionRequest>(&query)
            .bind(receiver_id)
            .bind(RequestStatus::Pending.as_str())
            .fetch_all(pool)
            .await
    }

    /// Pending requests sent by a user, oldest first.
    pub async fn list_pending_for_sender(
        pool: &PgPool,
        sender_id: DbId,
    ) -> Result<Vec<ConnectionRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM connection_requests \
             WHERE sender_id = $1 AND status = $2 \
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, ConnectionRequest>(&query)
            .bind(sender_id)
            .bind(RequestStatus::Pending.as_str())
            .fetch_all(pool)
            .await
    }

    /// Move a request from `expected` to `status`.
    ///
    /// The `WHERE status = expected` guard makes this a compare-and-set: of
    /// several concurrent responders only one sees a row come back.
    pub async fn transition_status(
        pool: &PgPool,
        id: DbId,
        expected: RequestStatus,
        status: RequestStatus,
    ) -> Result<Option<ConnectionRequest>, sqlx::Error> {
        let query = format!(
            "UPDATE connection_requests SET status = $3, responded_at = NOW() \
             WHERE id = $1 AND status = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ConnectionRequest>(&query)
            .bind(id)
            .bind(expected.as_str())
            .bind(status.as_str())
            .fetch_optional(pool)
            .await
    }
}
