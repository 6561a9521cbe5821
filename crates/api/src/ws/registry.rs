use std::collections::{HashMap, HashSet};

use axum::body::Bytes;
use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;
use kinship_core::types::{DbId, Timestamp};

/// Identifier of one open socket (one device or tab).
pub type SessionId = Uuid;

/// Channel sender half for pushing messages to one session.
pub type SessionSender = mpsc::Sender<Message>;

/// Default outbound buffer per session.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Metadata for a single registered session.
pub struct UserSession {
    pub user_id: DbId,
    /// Bounded channel drained by the socket's writer task.
    pub sender: SessionSender,
    pub connected_at: Timestamp,
}

/// A freshly registered session: its id and the receiver the socket writer
/// drains.
pub struct Registration {
    pub session_id: SessionId,
    pub receiver: mpsc::Receiver<Message>,
}

/// Tracks which users are online and on how many sessions.
///
/// Thread-safe via interior `RwLock`; constructed once at start-up and shared
/// as `Arc<SessionRegistry>`. Tests build as many isolated instances as they
/// need.
pub struct SessionRegistry {
    users: RwLock<HashMap<DbId, HashMap<SessionId, UserSession>>>,
    channel_capacity: usize,
}

impl SessionRegistry {
    /// Create an empty registry whose sessions buffer up to `channel_capacity`
    /// outbound messages each.
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Add a session for `user_id`.
    pub async fn register(&self, user_id: DbId) -> Registration {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let session_id = Uuid::new_v4();
        let session = UserSession {
            user_id,
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        let mut users = self.users.write().await;
        let sessions = users.entry(user_id).or_default();
        sessions.insert(session_id, session);
        tracing::debug!(
            user_id,
            session_id = %session_id,
            sessions = sessions.len(),
            "Session registered"
        );
        Registration {
            session_id,
            receiver: rx,
        }
    }

    /// Remove a session. Returns `false` if it was already gone.
    pub async fn unregister(&self, user_id: DbId, session_id: SessionId) -> bool {
        let mut users = self.users.write().await;
        let Some(sessions) = users.get_mut(&user_id) else {
            return false;
        };
        let removed = sessions.remove(&session_id).is_some();
        if sessions.is_empty() {
            users.remove(&user_id);
        }
        if removed {
            tracing::debug!(user_id, session_id = %session_id, "Session unregistered");
        }
        removed
    }

    /// Ids of every open session for `user_id`; empty when offline.
    pub async fn active_sessions(&self, user_id: DbId) -> HashSet<SessionId> {
        self.users
            .read()
            .await
            .get(&user_id)
            .map(|sessions| sessions.keys().copied().collect())
            .unwrap_or_default()
    }

    pub async fn is_online(&self, user_id: DbId) -> bool {
        self.users.read().await.contains_key(&user_id)
    }

    /// Snapshot of the senders for `user_id`, so callers can write without
    /// holding the lock.
    pub async fn senders_for(&self, user_id: DbId) -> Vec<(SessionId, SessionSender)> {
        self.users
            .read()
            .await
            .get(&user_id)
            .map(|sessions| {
                sessions
                    .iter()
                    .map(|(id, session)| (*id, session.sender.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Total open sessions across all users.
    pub async fn session_count(&self) -> usize {
        self.users.read().await.values().map(HashMap::len).sum()
    }

    pub async fn online_user_count(&self) -> usize {
        self.users.read().await.len()
    }

    /// Queue a Ping frame on every session. Sessions with a full buffer skip
    /// this round.
    pub async fn ping_all(&self) {
        let users = self.users.read().await;
        for session in users.values().flat_map(HashMap::values) {
            let _ = session.sender.try_send(Message::Ping(Bytes::new()));
        }
    }

    /// Send a Close frame to every session, then clear the registry.
    pub async fn shutdown_all(&self) {
        let mut users = self.users.write().await;
        let count: usize = users.values().map(HashMap::len).sum();
        for session in users.values().flat_map(HashMap::values) {
            let _ = session.sender.try_send(Message::Close(None));
        }
        users.clear();
        tracing::info!(count, "Closed all sessions");
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}
