//! Outstanding trust level-up proposals.

use serde::Serialize;
use sqlx::FromRow;
use kinship_core::trust::TrustLevel;
use kinship_core::types::{DbId, Timestamp};

/// A row from the `trust_level_proposals` table.
///
/// Each participant holds at most one proposal per connection; proposing a
/// new target replaces the previous one.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TrustProposal {
    pub id: DbId,
    pub connection_id: DbId,
    pub user_id: DbId,
    #[sqlx(try_from = "i16")]
    pub target_level: TrustLevel,
    pub created_at: Timestamp,
}
