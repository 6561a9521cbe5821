//! A store wrapper that injects failures and scheduling points.
//!
//! Delegates every call to an [`InMemoryStore`]. Individual operations can be
//! told to fail a number of times, and every call can yield to the runtime
//! first so that two futures driven by `tokio::join!` interleave at each
//! store access.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use kinship_core::connection::{ConnectionStatus, InteractionKind, RequestStatus};
use kinship_core::discovery::Pin;
use kinship_core::trust::TrustLevel;
use kinship_core::types::DbId;
use kinship_db::models::block::UserBlock;
use kinship_db::models::connection::Connection;
use kinship_db::models::connection_request::{ConnectionRequest, CreateConnectionRequest};
use kinship_db::models::trust_proposal::TrustProposal;
use kinship_db::models::user::User;
use kinship_db::{
    ConnectionStore, DirectChatProvisioner, InMemoryStore, StoreError, StoreResult,
    UserDirectory,
};

pub struct FaultyStore {
    inner: Arc<InMemoryStore>,
    block_failures: AtomicUsize,
    chat_failures: AtomicUsize,
    interleave: AtomicBool,
}

impl FaultyStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            block_failures: AtomicUsize::new(0),
            chat_failures: AtomicUsize::new(0),
            interleave: AtomicBool::new(false),
        }
    }

    /// Make the next `n` calls to `create_block` fail.
    pub fn fail_blocks(&self, n: usize) {
        self.block_failures.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` calls to `ensure_direct_chat` fail.
    pub fn fail_chats(&self, n: usize) {
        self.chat_failures.store(n, Ordering::SeqCst);
    }

    /// Yield to the scheduler before every delegated call.
    pub fn interleave(&self, on: bool) {
        self.interleave.store(on, Ordering::SeqCst);
    }

    async fn pause(&self) {
        if self.interleave.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ConnectionStore for FaultyStore {
    async fn ping(&self) -> StoreResult<()> {
        self.pause().await;
        self.inner.ping().await
    }

    async fn find_connection(&self, user_a: DbId, user_b: DbId) -> StoreResult<Option<Connection>> {
        self.pause().await;
        self.inner.find_connection(user_a, user_b).await
    }

    async fn get_connection(&self, connection_id: DbId) -> StoreResult<Option<Connection>> {
        self.pause().await;
        self.inner.get_connection(connection_id).await
    }

    async fn list_connections(&self, user_id: DbId) -> StoreResult<Vec<Connection>> {
        self.pause().await;
        self.inner.list_connections(user_id).await
    }

    async fn find_pending_request(
        &self,
        sender_id: DbId,
        receiver_id: DbId,
    ) -> StoreResult<Option<ConnectionRequest>> {
        self.pause().await;
        self.inner.find_pending_request(sender_id, receiver_id).await
    }

    async fn get_request(&self, request_id: DbId) -> StoreResult<Option<ConnectionRequest>> {
        self.pause().await;
        self.inner.get_request(request_id).await
    }

    async fn list_incoming_requests(
        &self,
        receiver_id: DbId,
    ) -> StoreResult<Vec<ConnectionRequest>> {
        self.pause().await;
        self.inner.list_incoming_requests(receiver_id).await
    }

    async fn list_outgoing_requests(&self, sender_id: DbId) -> StoreResult<Vec<ConnectionRequest>> {
        self.pause().await;
        self.inner.list_outgoing_requests(sender_id).await
    }

    async fn create_request(
        &self,
        input: &CreateConnectionRequest,
    ) -> StoreResult<ConnectionRequest> {
        self.pause().await;
        self.inner.create_request(input).await
    }

    async fn update_request_status(
        &self,
        request_id: DbId,
        expected: RequestStatus,
        status: RequestStatus,
    ) -> StoreResult<Option<ConnectionRequest>> {
        self.pause().await;
        self.inner
            .update_request_status(request_id, expected, status)
            .await
    }

    async fn create_connection_pair(
        &self,
        user_a: DbId,
        user_b: DbId,
        initial_level: TrustLevel,
    ) -> StoreResult<Connection> {
        self.pause().await;
        self.inner
            .create_connection_pair(user_a, user_b, initial_level)
            .await
    }

    async fn update_connection_status(
        &self,
        connection_id: DbId,
        status: ConnectionStatus,
    ) -> StoreResult<Option<Connection>> {
        self.pause().await;
        self.inner.update_connection_status(connection_id, status).await
    }

    async fn update_trust_level(
        &self,
        connection_id: DbId,
        expected: TrustLevel,
        level: TrustLevel,
        updated_by: DbId,
    ) -> StoreResult<Option<Connection>> {
        self.pause().await;
        self.inner
            .update_trust_level(connection_id, expected, level, updated_by)
            .await
    }

    async fn increment_interaction(
        &self,
        connection_id: DbId,
        kind: InteractionKind,
    ) -> StoreResult<Option<Connection>> {
        self.pause().await;
        self.inner.increment_interaction(connection_id, kind).await
    }

    async fn find_block(&self, blocker_id: DbId, blocked_id: DbId) -> StoreResult<Option<UserBlock>> {
        self.pause().await;
        self.inner.find_block(blocker_id, blocked_id).await
    }

    async fn create_block(&self, blocker_id: DbId, blocked_id: DbId) -> StoreResult<UserBlock> {
        self.pause().await;
        if Self::take_failure(&self.block_failures) {
            return Err(StoreError::Unavailable("blocks down".into()));
        }
        self.inner.create_block(blocker_id, blocked_id).await
    }

    async fn record_trust_proposal(
        &self,
        connection_id: DbId,
        user_id: DbId,
        target_level: TrustLevel,
    ) -> StoreResult<TrustProposal> {
        self.pause().await;
        self.inner
            .record_trust_proposal(connection_id, user_id, target_level)
            .await
    }

    async fn list_trust_proposals(&self, connection_id: DbId) -> StoreResult<Vec<TrustProposal>> {
        self.pause().await;
        self.inner.list_trust_proposals(connection_id).await
    }

    async fn clear_trust_proposals(&self, connection_id: DbId) -> StoreResult<u64> {
        self.pause().await;
        self.inner.clear_trust_proposals(connection_id).await
    }
}

#[async_trait]
impl UserDirectory for FaultyStore {
    async fn resolve_pin(&self, pin: &Pin) -> StoreResult<Option<DbId>> {
        self.pause().await;
        self.inner.resolve_pin(pin).await
    }

    async fn resolve_email(&self, email: &str) -> StoreResult<Option<DbId>> {
        self.pause().await;
        self.inner.resolve_email(email).await
    }

    async fn get_user(&self, user_id: DbId) -> StoreResult<Option<User>> {
        self.pause().await;
        self.inner.get_user(user_id).await
    }

    async fn assign_pin(&self, user_id: DbId, pin: &Pin) -> StoreResult<bool> {
        self.pause().await;
        self.inner.assign_pin(user_id, pin).await
    }
}

#[async_trait]
impl DirectChatProvisioner for FaultyStore {
    async fn ensure_direct_chat(&self, user_a: DbId, user_b: DbId) -> StoreResult<DbId> {
        self.pause().await;
        if Self::take_failure(&self.chat_failures) {
            return Err(StoreError::Unavailable("chat down".into()));
        }
        self.inner.ensure_direct_chat(user_a, user_b).await
    }
}
