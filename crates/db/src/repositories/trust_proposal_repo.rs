//! Repository for the `trust_level_proposals` table.

use sqlx::PgPool;
use kinship_core::trust::TrustLevel;
use kinship_core::types::DbId;

use crate::models::trust_proposal::TrustProposal;

/// Column list for `trust_level_proposals` queries.
const COLUMNS: &str = "id, connection_id, user_id, target_level, created_at";

/// Provides CRUD operations for level-up proposals.
pub struct TrustProposalRepo;

impl TrustProposalRepo {
    /// Insert or replace a participant's proposal.
    pub async fn upsert(
        pool: &PgPool,
        connection_id: DbId,
        user_id: DbId,
        target_level: TrustLevel,
    ) -> Result<TrustProposal, sqlx::Error> {
        let query = format!(
            "INSERT INTO trust_level_proposals (connection_id, user_id, target_level) \
             VALUES ($1, $2, $3) \
             ON CONFLICT ON CONSTRAINT uq_trust_level_proposals_connection_user \
             DO UPDATE SET target_level = EXCLUDED.target_level, created_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TrustProposal>(&query)
            .bind(connection_id)
            .bind(user_id)
            .bind(i16::from(target_level))
            .fetch_one(pool)
            .await
    }

    pub async fn list_for_connection(
        pool: &PgPool,
        connection_id: DbId,
    ) -> Result<Vec<TrustProposal>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM trust_level_proposals \
             WHERE connection_id = $1 ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, TrustProposal>(&query)
            .bind(connection_id)
            .fetch_all(pool)
            .await
    }

    pub async fn delete_for_connection(
        pool: &PgPool,
        connection_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM trust_level_proposals WHERE connection_id = $1")
            .bind(connection_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
