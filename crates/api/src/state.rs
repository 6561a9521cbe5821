use std::sync::Arc;

use crate::config::ServerConfig;
use crate::connections::ConnectionService;
use crate::ws::SessionRegistry;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Open real-time sessions per user.
    pub sessions: Arc<SessionRegistry>,
    /// Connection lifecycle and trust transitions.
    pub connections: Arc<ConnectionService>,
    /// Activity bus; the audit persistence task subscribes to it.
    pub event_bus: Arc<kinship_events::EventBus>,
}
