//! Repository for the `direct_chats` table.

use sqlx::PgPool;
use kinship_core::connection::ordered_pair;
use kinship_core::types::DbId;

/// Provides the get-or-create used when a connection is accepted.
pub struct DirectChatRepo;

impl DirectChatRepo {
    /// Return the chat id for the pair, inserting the chat if needed.
    pub async fn ensure(pool: &PgPool, user_a: DbId, user_b: DbId) -> Result<DbId, sqlx::Error> {
        let (low, high) = ordered_pair(user_a, user_b);
        sqlx::query_scalar(
            "INSERT INTO direct_chats (user_a_id, user_b_id) VALUES ($1, $2) \
             ON CONFLICT ON CONSTRAINT uq_direct_chats_pair \
             DO UPDATE SET user_a_id = EXCLUDED.user_a_id \
             RETURNING id",
        )
        .bind(low)
        .bind(high)
        .fetch_one(pool)
        .await
    }
}
