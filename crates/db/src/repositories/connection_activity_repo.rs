//! Repository for the `connection_activity` audit table.

use sqlx::PgPool;
use kinship_core::types::DbId;

use crate::models::activity::{ConnectionActivity, CreateConnectionActivity};

/// Column list for `connection_activity` queries.
const COLUMNS: &str = "id, event_type, connection_id, request_id, actor_user_id, \
                       target_user_id, payload, created_at";

/// Append-only access to the activity audit trail.
pub struct ConnectionActivityRepo;

impl ConnectionActivityRepo {
    pub async fn insert(
        pool: &PgPool,
        input: &CreateConnectionActivity,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO connection_activity \
             (event_type, connection_id, request_id, actor_user_id, target_user_id, payload, \
              created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
        )
        .bind(&input.event_type)
        .bind(input.connection_id)
        .bind(input.request_id)
        .bind(input.actor_user_id)
        .bind(input.target_user_id)
        .bind(&input.payload)
        .bind(input.occurred_at)
        .fetch_one(pool)
        .await
    }

    /// Activity for one connection, oldest first.
    pub async fn list_for_connection(
        pool: &PgPool,
        connection_id: DbId,
    ) -> Result<Vec<ConnectionActivity>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM connection_activity \
             WHERE connection_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, ConnectionActivity>(&query)
            .bind(connection_id)
            .fetch_all(pool)
            .await
    }
}
