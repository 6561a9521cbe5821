//! PostgreSQL-backed implementation of the store traits.
//!
//! Thin adapter: each method is one repository call with the `sqlx::Error`
//! classified into a [`StoreError`].

use async_trait::async_trait;
use kinship_core::connection::{ConnectionStatus, InteractionKind, RequestStatus};
use kinship_core::discovery::Pin;
use kinship_core::trust::TrustLevel;
use kinship_core::types::DbId;

use crate::models::block::UserBlock;
use crate::models::connection::Connection;
use crate::models::connection_request::{ConnectionRequest, CreateConnectionRequest};
use crate::models::trust_proposal::TrustProposal;
use crate::models::user::User;
use crate::repositories::{
    ConnectionRepo, ConnectionRequestRepo, DirectChatRepo, TrustProposalRepo, UserBlockRepo,
    UserRepo,
};
use crate::store::{ConnectionStore, DirectChatProvisioner, StoreResult, UserDirectory};
use crate::DbPool;

/// Store backed by a PostgreSQL pool. Cheap to clone.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl ConnectionStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }

    async fn find_connection(&self, user_a: DbId, user_b: DbId) -> StoreResult<Option<Connection>> {
        Ok(ConnectionRepo::find_by_pair(&self.pool, user_a, user_b).await?)
    }

    async fn get_connection(&self, connection_id: DbId) -> StoreResult<Option<Connection>> {
        Ok(ConnectionRepo::find_by_id(&self.pool, connection_id).await?)
    }

    async fn list_connections(&self, user_id: DbId) -> StoreResult<Vec<Connection>> {
        Ok(ConnectionRepo::list_accepted_for_user(&self.pool, user_id).await?)
    }

    async fn find_pending_request(
        &self,
        sender_id: DbId,
        receiver_id: DbId,
    ) -> StoreResult<Option<ConnectionRequest>> {
        Ok(ConnectionRequestRepo::find_pending(&self.pool, sender_id, receiver_id).await?)
    }

    async fn get_request(&self, request_id: DbId) -> StoreResult<Option<ConnectionRequest>> {
        Ok(ConnectionRequestRepo::find_by_id(&self.pool, request_id).await?)
    }

    async fn list_incoming_requests(
        &self,
        receiver_id: DbId,
    ) -> StoreResult<Vec<ConnectionRequest>> {
        Ok(ConnectionRequestRepo::list_pending_for_receiver(&self.pool, receiver_id).await?)
    }

    async fn list_outgoing_requests(&self, sender_id: DbId) -> StoreResult<Vec<ConnectionRequest>> {
        Ok(ConnectionRequestRepo::list_pending_for_sender(&self.pool, sender_id).await?)
    }

    async fn create_request(
        &self,
        input: &CreateConnectionRequest,
    ) -> StoreResult<ConnectionRequest> {
        Ok(ConnectionRequestRepo::create(&self.pool, input).await?)
    }

    async fn update_request_status(
        &self,
        request_id: DbId,
        expected: RequestStatus,
        status: RequestStatus,
    ) -> StoreResult<Option<ConnectionRequest>> {
        Ok(
            ConnectionRequestRepo::transition_status(&self.pool, request_id, expected, status)
                .await?,
        )
    }

    async fn create_connection_pair(
        &self,
        user_a: DbId,
        user_b: DbId,
        initial_level: TrustLevel,
    ) -> StoreResult<Connection> {
        Ok(ConnectionRepo::create_accepted(&self.pool, user_a, user_b, initial_level).await?)
    }

    async fn update_connection_status(
        &self,
        connection_id: DbId,
        status: ConnectionStatus,
    ) -> StoreResult<Option<Connection>> {
        Ok(ConnectionRepo::update_status(&self.pool, connection_id, status).await?)
    }

    async fn update_trust_level(
        &self,
        connection_id: DbId,
        expected: TrustLevel,
        level: TrustLevel,
        updated_by: DbId,
    ) -> StoreResult<Option<Connection>> {
        Ok(ConnectionRepo::compare_and_set_trust_level(
            &self.pool,
            connection_id,
            expected,
            level,
            updated_by,
        )
        .await?)
    }

    async fn increment_interaction(
        &self,
        connection_id: DbId,
        kind: InteractionKind,
    ) -> StoreResult<Option<Connection>> {
        Ok(ConnectionRepo::increment_interaction(&self.pool, connection_id, kind).await?)
    }

    async fn find_block(&self, blocker_id: DbId, blocked_id: DbId) -> StoreResult<Option<UserBlock>> {
        Ok(UserBlockRepo::find(&self.pool, blocker_id, blocked_id).await?)
    }

    async fn create_block(&self, blocker_id: DbId, blocked_id: DbId) -> StoreResult<UserBlock> {
        Ok(UserBlockRepo::create(&self.pool, blocker_id, blocked_id).await?)
    }

    async fn record_trust_proposal(
        &self,
        connection_id: DbId,
        user_id: DbId,
        target_level: TrustLevel,
    ) -> StoreResult<TrustProposal> {
        Ok(TrustProposalRepo::upsert(&self.pool, connection_id, user_id, target_level).await?)
    }

    async fn list_trust_proposals(&self, connection_id: DbId) -> StoreResult<Vec<TrustProposal>> {
        Ok(TrustProposalRepo::list_for_connection(&self.pool, connection_id).await?)
    }

    async fn clear_trust_proposals(&self, connection_id: DbId) -> StoreResult<u64> {
        Ok(TrustProposalRepo::delete_for_connection(&self.pool, connection_id).await?)
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn resolve_pin(&self, pin: &Pin) -> StoreResult<Option<DbId>> {
        Ok(UserRepo::find_id_by_pin(&self.pool, pin.as_str()).await?)
    }

    async fn resolve_email(&self, email: &str) -> StoreResult<Option<DbId>> {
        Ok(UserRepo::find_id_by_email(&self.pool, email).await?)
    }

    async fn get_user(&self, user_id: DbId) -> StoreResult<Option<User>> {
        Ok(UserRepo::find_by_id(&self.pool, user_id).await?)
    }

    async fn assign_pin(&self, user_id: DbId, pin: &Pin) -> StoreResult<bool> {
        Ok(UserRepo::update_pin(&self.pool, user_id, pin.as_str()).await?)
    }
}

#[async_trait]
impl DirectChatProvisioner for PgStore {
    async fn ensure_direct_chat(&self, user_a: DbId, user_b: DbId) -> StoreResult<DbId> {
        Ok(DirectChatRepo::ensure(&self.pool, user_a, user_b).await?)
    }
}
