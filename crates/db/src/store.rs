//! Collaborator traits the connection service is written against.
//!
//! Every write is a single-row operation; there are no multi-row
//! transactions. Callers order their writes so that a failure part-way leaves
//! a recoverable state (request status first, then the connection row).

use async_trait::async_trait;
use kinship_core::connection::{ConnectionStatus, InteractionKind, RequestStatus};
use kinship_core::discovery::Pin;
use kinship_core::error::CoreError;
use kinship_core::trust::TrustLevel;
use kinship_core::types::DbId;

use crate::models::block::UserBlock;
use crate::models::connection::Connection;
use crate::models::connection_request::{ConnectionRequest, CreateConnectionRequest};
use crate::models::trust_proposal::TrustProposal;
use crate::models::user::User;

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Failure reported by a store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique index rejected the write. Carries the constraint name.
    #[error("Duplicate value violates unique constraint: {0}")]
    Duplicate(String),

    /// The backing store could not be reached or timed out.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store returned data the model could not decode.
    #[error("Store internal error: {0}")]
    Internal(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            // PostgreSQL unique constraint violation: error code 23505
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                StoreError::Duplicate(db_err.constraint().unwrap_or("unknown").to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Internal(err.to_string())
            }
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(constraint) => {
                CoreError::Conflict(format!("duplicate value for {constraint}"))
            }
            StoreError::Unavailable(msg) => CoreError::Unavailable(msg),
            StoreError::Internal(msg) => CoreError::Internal(msg),
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectionStore
// ---------------------------------------------------------------------------

/// Persistence for requests, connections, blocks, and level-up proposals.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Cheap liveness probe.
    async fn ping(&self) -> StoreResult<()>;

    /// The connection for an unordered pair, whatever its status.
    async fn find_connection(&self, user_a: DbId, user_b: DbId) -> StoreResult<Option<Connection>>;

    async fn get_connection(&self, connection_id: DbId) -> StoreResult<Option<Connection>>;

    /// Accepted connections involving `user_id`, most recent first.
    async fn list_connections(&self, user_id: DbId) -> StoreResult<Vec<Connection>>;

    /// The pending request from `sender_id` to `receiver_id` (directional).
    async fn find_pending_request(
        &self,
        sender_id: DbId,
        receiver_id: DbId,
    ) -> StoreResult<Option<ConnectionRequest>>;

    async fn get_request(&self, request_id: DbId) -> StoreResult<Option<ConnectionRequest>>;

    /// Pending requests addressed to `receiver_id`, oldest first.
    async fn list_incoming_requests(&self, receiver_id: DbId)
        -> StoreResult<Vec<ConnectionRequest>>;

    /// Pending requests sent by `sender_id`, oldest first.
    async fn list_outgoing_requests(&self, sender_id: DbId) -> StoreResult<Vec<ConnectionRequest>>;

    /// Insert a pending request. Fails with [`StoreError::Duplicate`] if the
    /// unordered pair already has a pending request.
    async fn create_request(&self, input: &CreateConnectionRequest)
        -> StoreResult<ConnectionRequest>;

    /// Compare-and-set the request status. Returns `None` when the request
    /// does not exist or is no longer in `expected`.
    async fn update_request_status(
        &self,
        request_id: DbId,
        expected: RequestStatus,
        status: RequestStatus,
    ) -> StoreResult<Option<ConnectionRequest>>;

    /// Insert the single accepted row for an unordered pair. Fails with
    /// [`StoreError::Duplicate`] if the pair already has a connection.
    async fn create_connection_pair(
        &self,
        user_a: DbId,
        user_b: DbId,
        initial_level: TrustLevel,
    ) -> StoreResult<Connection>;

    async fn update_connection_status(
        &self,
        connection_id: DbId,
        status: ConnectionStatus,
    ) -> StoreResult<Option<Connection>>;

    /// Compare-and-set the trust level. Returns `None` when the stored level
    /// is no longer `expected`, so concurrent finalisers cannot double-advance.
    async fn update_trust_level(
        &self,
        connection_id: DbId,
        expected: TrustLevel,
        level: TrustLevel,
        updated_by: DbId,
    ) -> StoreResult<Option<Connection>>;

    /// Bump one interaction counter and `last_interaction_at`.
    async fn increment_interaction(
        &self,
        connection_id: DbId,
        kind: InteractionKind,
    ) -> StoreResult<Option<Connection>>;

    async fn find_block(&self, blocker_id: DbId, blocked_id: DbId) -> StoreResult<Option<UserBlock>>;

    /// Record that `blocker_id` blocks `blocked_id`. Idempotent.
    async fn create_block(&self, blocker_id: DbId, blocked_id: DbId) -> StoreResult<UserBlock>;

    /// Record (or replace) `user_id`'s proposal for `connection_id`.
    async fn record_trust_proposal(
        &self,
        connection_id: DbId,
        user_id: DbId,
        target_level: TrustLevel,
    ) -> StoreResult<TrustProposal>;

    async fn list_trust_proposals(&self, connection_id: DbId) -> StoreResult<Vec<TrustProposal>>;

    /// Drop all proposals for a connection. Returns the number removed.
    async fn clear_trust_proposals(&self, connection_id: DbId) -> StoreResult<u64>;
}

// ---------------------------------------------------------------------------
// UserDirectory
// ---------------------------------------------------------------------------

/// Resolves discovery identifiers to user ids.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn resolve_pin(&self, pin: &Pin) -> StoreResult<Option<DbId>>;

    /// `email` is expected to be normalised already.
    async fn resolve_email(&self, email: &str) -> StoreResult<Option<DbId>>;

    async fn get_user(&self, user_id: DbId) -> StoreResult<Option<User>>;

    /// Replace a user's PIN. Returns `false` if the user does not exist and
    /// fails with [`StoreError::Duplicate`] if another user holds the PIN.
    async fn assign_pin(&self, user_id: DbId, pin: &Pin) -> StoreResult<bool>;
}

// ---------------------------------------------------------------------------
// DirectChatProvisioner
// ---------------------------------------------------------------------------

/// Opens the direct chat that accompanies an accepted connection.
#[async_trait]
pub trait DirectChatProvisioner: Send + Sync {
    /// Return the chat id for the pair, creating the chat if needed.
    async fn ensure_direct_chat(&self, user_a: DbId, user_b: DbId) -> StoreResult<DbId>;
}
