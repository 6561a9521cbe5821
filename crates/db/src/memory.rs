//! In-process implementation of the store traits.
//!
//! Mirrors the PostgreSQL unique indexes (pending pair, connection pair, PIN,
//! block pair, one proposal per participant) so service-level behaviour is
//! the same against either backend. Used by the test suites and for running
//! the server without a database.
//!
//! The mutex is never held across an `.await`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use kinship_core::connection::{ordered_pair, ConnectionStatus, InteractionKind, RequestStatus};
use kinship_core::discovery::Pin;
use kinship_core::trust::TrustLevel;
use kinship_core::types::DbId;

use crate::models::block::UserBlock;
use crate::models::connection::Connection;
use crate::models::connection_request::{ConnectionRequest, CreateConnectionRequest};
use crate::models::trust_proposal::TrustProposal;
use crate::models::user::User;
use crate::store::{
    ConnectionStore, DirectChatProvisioner, StoreError, StoreResult, UserDirectory,
};

#[derive(Default)]
struct MemoryState {
    next_id: DbId,
    users: BTreeMap<DbId, User>,
    requests: BTreeMap<DbId, ConnectionRequest>,
    connections: BTreeMap<DbId, Connection>,
    blocks: Vec<UserBlock>,
    proposals: Vec<TrustProposal>,
    chats: BTreeMap<(DbId, DbId), DbId>,
}

impl MemoryState {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

/// Store that keeps everything in a mutex-guarded map.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Register a directory entry and return its id.
    pub fn add_user(&self, display_name: &str, email: &str, pin: Option<&str>) -> DbId {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let id = state.next_id();
        let now = Utc::now();
        state.users.insert(
            id,
            User {
                id,
                display_name: display_name.to_string(),
                email: email.to_lowercase(),
                pin: pin.map(str::to_string),
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    /// Shift `accepted_at` into the past, as if the pair connected `days` ago.
    pub fn backdate_connection(&self, connection_id: DbId, days: i64) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(conn) = state.connections.get_mut(&connection_id) {
            conn.accepted_at = Some(Utc::now() - Duration::days(days));
        }
    }

    /// Overwrite a connection's interaction counters.
    pub fn set_interaction_counts(
        &self,
        connection_id: DbId,
        messages: i64,
        voice_calls: i64,
        video_calls: i64,
    ) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(conn) = state.connections.get_mut(&connection_id) {
            conn.message_count = messages;
            conn.voice_call_count = voice_calls;
            conn.video_call_count = video_calls;
        }
    }

    pub fn connection_count(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).connections.len()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).requests.len()
    }

    pub fn chat_count(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).chats.len()
    }

    /// Lock the state, failing first if the store is marked unavailable.
    fn state(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store marked unavailable".into()));
        }
        self.state
            .lock()
            .map_err(|_| StoreError::Internal("in-memory store lock poisoned".into()))
    }
}

#[async_trait]
impl ConnectionStore for InMemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.state().map(|_| ())
    }

    async fn find_connection(&self, user_a: DbId, user_b: DbId) -> StoreResult<Option<Connection>> {
        let (low, high) = ordered_pair(user_a, user_b);
        let state = self.state()?;
        Ok(state
            .connections
            .values()
            .find(|c| c.user_a_id == low && c.user_b_id == high)
            .cloned())
    }

    async fn get_connection(&self, connection_id: DbId) -> StoreResult<Option<Connection>> {
        Ok(self.state()?.connections.get(&connection_id).cloned())
    }

    async fn list_connections(&self, user_id: DbId) -> StoreResult<Vec<Connection>> {
        let state = self.state()?;
        let mut found: Vec<Connection> = state
            .connections
            .values()
            .filter(|c| c.involves(user_id) && c.status == ConnectionStatus::Accepted)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.accepted_at.cmp(&a.accepted_at).then(b.id.cmp(&a.id)));
        Ok(found)
    }

    async fn find_pending_request(
        &self,
        sender_id: DbId,
        receiver_id: DbId,
    ) -> StoreResult<Option<ConnectionRequest>> {
        let state = self.state()?;
        Ok(state
            .requests
            .values()
            .find(|r| {
                r.sender_id == sender_id
                    && r.receiver_id == receiver_id
                    && r.status == RequestStatus::Pending
            })
            .cloned())
    }

    async fn get_request(&self, request_id: DbId) -> StoreResult<Option<ConnectionRequest>> {
        Ok(self.state()?.requests.get(&request_id).cloned())
    }

    async fn list_incoming_requests(
        &self,
        receiver_id: DbId,
    ) -> StoreResult<Vec<ConnectionRequest>> {
        let state = self.state()?;
        Ok(state
            .requests
            .values()
            .filter(|r| r.receiver_id == receiver_id && r.status == RequestStatus::Pending)
            .cloned()
            .collect())
    }

    async fn list_outgoing_requests(&self, sender_id: DbId) -> StoreResult<Vec<ConnectionRequest>> {
        let state = self.state()?;
        Ok(state
            .requests
            .values()
            .filter(|r| r.sender_id == sender_id && r.status == RequestStatus::Pending)
            .cloned()
            .collect())
    }

    async fn create_request(
        &self,
        input: &CreateConnectionRequest,
    ) -> StoreResult<ConnectionRequest> {
        let mut state = self.state()?;
        let pair = ordered_pair(input.sender_id, input.receiver_id);
        let duplicate = state.requests.values().any(|r| {
            r.status == RequestStatus::Pending && ordered_pair(r.sender_id, r.receiver_id) == pair
        });
        if duplicate {
            return Err(StoreError::Duplicate(
                "uq_connection_requests_pending_pair".into(),
            ));
        }
        let id = state.next_id();
        let request = ConnectionRequest {
            id,
            sender_id: input.sender_id,
            receiver_id: input.receiver_id,
            message: input.message.clone(),
            status: RequestStatus::Pending,
            created_at: Utc::now(),
            responded_at: None,
        };
        state.requests.insert(id, request.clone());
        Ok(request)
    }

    async fn update_request_status(
        &self,
        request_id: DbId,
        expected: RequestStatus,
        status: RequestStatus,
    ) -> StoreResult<Option<ConnectionRequest>> {
        let mut state = self.state()?;
        match state.requests.get_mut(&request_id) {
            Some(request) if request.status == expected => {
                request.status = status;
                request.responded_at = Some(Utc::now());
                Ok(Some(request.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn create_connection_pair(
        &self,
        user_a: DbId,
        user_b: DbId,
        initial_level: TrustLevel,
    ) -> StoreResult<Connection> {
        let (low, high) = ordered_pair(user_a, user_b);
        let mut state = self.state()?;
        if state
            .connections
            .values()
            .any(|c| c.user_a_id == low && c.user_b_id == high)
        {
            return Err(StoreError::Duplicate("uq_connections_pair".into()));
        }
        let id = state.next_id();
        let now = Utc::now();
        let connection = Connection {
            id,
            user_a_id: low,
            user_b_id: high,
            status: ConnectionStatus::Accepted,
            trust_level: initial_level,
            message_count: 0,
            voice_call_count: 0,
            video_call_count: 0,
            trust_updated_by: None,
            created_at: now,
            accepted_at: Some(now),
            last_interaction_at: None,
            updated_at: now,
        };
        state.connections.insert(id, connection.clone());
        Ok(connection)
    }

    async fn update_connection_status(
        &self,
        connection_id: DbId,
        status: ConnectionStatus,
    ) -> StoreResult<Option<Connection>> {
        let mut state = self.state()?;
        Ok(state.connections.get_mut(&connection_id).map(|conn| {
            conn.status = status;
            conn.updated_at = Utc::now();
            conn.clone()
        }))
    }

    async fn update_trust_level(
        &self,
        connection_id: DbId,
        expected: TrustLevel,
        level: TrustLevel,
        updated_by: DbId,
    ) -> StoreResult<Option<Connection>> {
        let mut state = self.state()?;
        match state.connections.get_mut(&connection_id) {
            Some(conn)
                if conn.trust_level == expected
                    && level > expected
                    && conn.status == ConnectionStatus::Accepted =>
            {
                conn.trust_level = level;
                conn.trust_updated_by = Some(updated_by);
                conn.updated_at = Utc::now();
                Ok(Some(conn.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn increment_interaction(
        &self,
        connection_id: DbId,
        kind: InteractionKind,
    ) -> StoreResult<Option<Connection>> {
        let mut state = self.state()?;
        Ok(state.connections.get_mut(&connection_id).map(|conn| {
            match kind {
                InteractionKind::Message => conn.message_count += 1,
                InteractionKind::VoiceCall => conn.voice_call_count += 1,
                InteractionKind::VideoCall => conn.video_call_count += 1,
            }
            let now = Utc::now();
            conn.last_interaction_at = Some(now);
            conn.updated_at = now;
            conn.clone()
        }))
    }

    async fn find_block(&self, blocker_id: DbId, blocked_id: DbId) -> StoreResult<Option<UserBlock>> {
        let state = self.state()?;
        Ok(state
            .blocks
            .iter()
            .find(|b| b.blocker_id == blocker_id && b.blocked_id == blocked_id)
            .cloned())
    }

    async fn create_block(&self, blocker_id: DbId, blocked_id: DbId) -> StoreResult<UserBlock> {
        let mut state = self.state()?;
        if let Some(existing) = state
            .blocks
            .iter()
            .find(|b| b.blocker_id == blocker_id && b.blocked_id == blocked_id)
        {
            return Ok(existing.clone());
        }
        let block = UserBlock {
            id: state.next_id(),
            blocker_id,
            blocked_id,
            created_at: Utc::now(),
        };
        state.blocks.push(block.clone());
        Ok(block)
    }

    async fn record_trust_proposal(
        &self,
        connection_id: DbId,
        user_id: DbId,
        target_level: TrustLevel,
    ) -> StoreResult<TrustProposal> {
        let mut state = self.state()?;
        state
            .proposals
            .retain(|p| !(p.connection_id == connection_id && p.user_id == user_id));
        let proposal = TrustProposal {
            id: state.next_id(),
            connection_id,
            user_id,
            target_level,
            created_at: Utc::now(),
        };
        state.proposals.push(proposal.clone());
        Ok(proposal)
    }

    async fn list_trust_proposals(&self, connection_id: DbId) -> StoreResult<Vec<TrustProposal>> {
        let state = self.state()?;
        Ok(state
            .proposals
            .iter()
            .filter(|p| p.connection_id == connection_id)
            .cloned()
            .collect())
    }

    async fn clear_trust_proposals(&self, connection_id: DbId) -> StoreResult<u64> {
        let mut state = self.state()?;
        let before = state.proposals.len();
        state.proposals.retain(|p| p.connection_id != connection_id);
        Ok((before - state.proposals.len()) as u64)
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn resolve_pin(&self, pin: &Pin) -> StoreResult<Option<DbId>> {
        let state = self.state()?;
        Ok(state
            .users
            .values()
            .find(|u| u.pin.as_deref() == Some(pin.as_str()))
            .map(|u| u.id))
    }

    async fn resolve_email(&self, email: &str) -> StoreResult<Option<DbId>> {
        let state = self.state()?;
        Ok(state.users.values().find(|u| u.email == email).map(|u| u.id))
    }

    async fn get_user(&self, user_id: DbId) -> StoreResult<Option<User>> {
        Ok(self.state()?.users.get(&user_id).cloned())
    }

    async fn assign_pin(&self, user_id: DbId, pin: &Pin) -> StoreResult<bool> {
        let mut state = self.state()?;
        let taken = state
            .users
            .values()
            .any(|u| u.id != user_id && u.pin.as_deref() == Some(pin.as_str()));
        if taken {
            return Err(StoreError::Duplicate("uq_users_pin".into()));
        }
        Ok(state
            .users
            .get_mut(&user_id)
            .map(|user| {
                user.pin = Some(pin.to_string());
                user.updated_at = Utc::now();
            })
            .is_some())
    }
}

#[async_trait]
impl DirectChatProvisioner for InMemoryStore {
    async fn ensure_direct_chat(&self, user_a: DbId, user_b: DbId) -> StoreResult<DbId> {
        let pair = ordered_pair(user_a, user_b);
        let mut state = self.state()?;
        if let Some(id) = state.chats.get(&pair) {
            return Ok(*id);
        }
        let id = state.next_id();
        state.chats.insert(pair, id);
        Ok(id)
    }
}
