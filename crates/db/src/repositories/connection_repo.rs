//! Repository for the `connections` table.

use sqlx::PgPool;
use kinship_core::connection::{ordered_pair, ConnectionStatus, InteractionKind};
use kinship_core::trust::TrustLevel;
use kinship_core::types::DbId;

use crate::models::connection::Connection;

/// Column list for `connections` queries.
const COLUMNS: &str = "id, user_a_id, user_b_id, status, trust_level, \
                       message_count, voice_call_count, video_call_count, \
                       trust_updated_by, created_at, accepted_at, \
                       last_interaction_at, updated_at";

/// Provides CRUD operations for connections.
///
/// Every method normalises the user pair with [`ordered_pair`], so callers
/// may pass the two ids in either order.
pub struct ConnectionRepo;

impl ConnectionRepo {
    /// Insert an accepted connection for the pair.
    pub async fn create_accepted(
        pool: &PgPool,
        user_a: DbId,
        user_b: DbId,
        initial_level: TrustLevel,
    ) -> Result<Connection, sqlx::Error> {
        let (low, high) = ordered_pair(user_a, user_b);
        let query = format!(
            "INSERT INTO connections (user_a_id, user_b_id, status, trust_level, accepted_at) \
             VALUES ($1, $2, $3, $4, NOW()) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Connection>(&query)
            .bind(low)
            .bind(high)
            .bind(ConnectionStatus::Accepted.as_str())
            .bind(i16::from(initial_level))
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Connection>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM connections WHERE id = $1");
        sqlx::query_as::<_, Connection>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_pair(
        pool: &PgPool,
        user_a: DbId,
        user_b: DbId,
    ) -> Result<Option<Connection>, sqlx::Error> {
        let (low, high) = ordered_pair(user_a, user_b);
        let query = format!(
            "SELECT {COLUMNS} FROM connections WHERE user_a_id = $1 AND user_b_id = $2"
        );
        sqlx::query_as::<_, Connection>(&query)
            .bind(low)
            .bind(high)
            .fetch_optional(pool)
            .await
    }

    /// Accepted connections involving a user, most recently accepted first.
    pub async fn list_accepted_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<Connection>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM connections \
             WHERE (user_a_id = $1 OR user_b_id = $1) AND status = $2 \
             ORDER BY accepted_at DESC NULLS LAST, id DESC"
        );
        sqlx::query_as::<_, Connection>(&query)
            .bind(user_id)
            .bind(ConnectionStatus::Accepted.as_str())
            .fetch_all(pool)
            .await
    }

    pub async fn update_status(
        pool: &PgPool,
        id: DbId,
        status: ConnectionStatus,
    ) -> Result<Option<Connection>, sqlx::Error> {
        let query = format!(
            "UPDATE connections SET status = $2, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Connection>(&query)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Advance the trust level only if it still equals `expected` and the
    /// connection is accepted. The `level > expected` guard keeps the column
    /// monotonic even if a caller passes a lower value.
    pub async fn compare_and_set_trust_level(
        pool: &PgPool,
        id: DbId,
        expected: TrustLevel,
        level: TrustLevel,
        updated_by: DbId,
    ) -> Result<Option<Connection>, sqlx::Error> {
        let query = format!(
            "UPDATE connections \
             SET trust_level = $3, trust_updated_by = $4, updated_at = NOW() \
             WHERE id = $1 AND trust_level = $2 AND $3 > $2 AND status = $5 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Connection>(&query)
            .bind(id)
            .bind(i16::from(expected))
            .bind(i16::from(level))
            .bind(updated_by)
            .bind(ConnectionStatus::Accepted.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Atomically increment one interaction counter.
    pub async fn increment_interaction(
        pool: &PgPool,
        id: DbId,
        kind: InteractionKind,
    ) -> Result<Option<Connection>, sqlx::Error> {
        let column = match kind {
            InteractionKind::Message => "message_count",
            InteractionKind::VoiceCall => "voice_call_count",
            InteractionKind::VideoCall => "video_call_count",
        };
        let query = format!(
            "UPDATE connections \
             SET {column} = {column} + 1, last_interaction_at = NOW(), updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Connection>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
