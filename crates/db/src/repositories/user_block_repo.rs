//! Repository for the `user_blocks` table.

use sqlx::PgPool;
use kinship_core::types::DbId;

use crate::models::block::UserBlock;

/// Column list for `user_blocks` queries.
const COLUMNS: &str = "id, blocker_id, blocked_id, created_at";

/// Provides CRUD operations for block relations.
pub struct UserBlockRepo;

impl UserBlockRepo {
    /// Record a block. Re-blocking returns the existing row.
    pub async fn create(
        pool: &PgPool,
        blocker_id: DbId,
        blocked_id: DbId,
    ) -> Result<UserBlock, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_blocks (blocker_id, blocked_id) VALUES ($1, $2) \
             ON CONFLICT ON CONSTRAINT uq_user_blocks_pair \
             DO UPDATE SET blocker_id = EXCLUDED.blocker_id \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserBlock>(&query)
            .bind(blocker_id)
            .bind(blocked_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find(
        pool: &PgPool,
        blocker_id: DbId,
        blocked_id: DbId,
    ) -> Result<Option<UserBlock>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_blocks WHERE blocker_id = $1 AND blocked_id = $2"
        );
        sqlx::query_as::<_, UserBlock>(&query)
            .bind(blocker_id)
            .bind(blocked_id)
            .fetch_optional(pool)
            .await
    }
}
