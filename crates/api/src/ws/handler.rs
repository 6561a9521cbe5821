use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequestParts, Query, State};
use axum::http::request::Parts;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use kinship_core::error::CoreError;
use kinship_core::types::DbId;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;
use crate::ws::registry::SessionRegistry;

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// User authenticated by the `?token=<jwt>` query parameter.
///
/// Browsers cannot set headers on a WebSocket handshake, so the token
/// travels in the URL. Runs before the upgrade extractor so a bad token is
/// rejected with 401 rather than upgraded.
#[derive(Debug, Clone, Copy)]
pub struct SessionUser {
    pub user_id: DbId,
}

impl FromRequestParts<AppState> for SessionUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<TokenQuery>::try_from_uri(&parts.uri)
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        let token = query
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Core(CoreError::Unauthorized("Missing token".into())))?;

        let claims = validate_token(&token, &state.config.jwt).map_err(|_| {
            AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
        })?;

        Ok(SessionUser {
            user_id: claims.sub,
        })
    }
}

/// GET /api/v1/ws?token=<jwt>
///
/// Upgrades to WebSocket and registers the socket as one session of the
/// token's user.
pub async fn ws_handler(
    user: SessionUser,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, user.user_id, state.sessions))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket, registers a session, forwards the session channel to
/// the sink on a spawned task, and reads inbound frames until either side
/// closes. The session is unregistered on the way out.
async fn handle_socket(socket: WebSocket, user_id: DbId, sessions: Arc<SessionRegistry>) {
    let registration = sessions.register(user_id).await;
    let session_id = registration.session_id;
    let mut rx = registration.receiver;
    tracing::info!(user_id, session_id = %session_id, "Session connected");

    let (mut sink, mut stream) = socket.split();

    // Ends when the registry drops the sender (router eviction, shutdown) or
    // the sink fails.
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(session_id = %session_id, "Session sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    let recv_loop = async {
        while let Some(result) = stream.next().await {
            match result {
                Ok(Message::Close(_)) => break,
                Ok(Message::Pong(_)) => {
                    tracing::trace!(session_id = %session_id, "Pong received");
                }
                // Clients send nothing meaningful; actions go through HTTP.
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(session_id = %session_id, error = %e, "Session receive error");
                    break;
                }
            }
        }
    };

    tokio::select! {
        () = recv_loop => {}
        _ = &mut send_task => {}
    }

    sessions.unregister(user_id, session_id).await;
    send_task.abort();
    tracing::info!(user_id, session_id = %session_id, "Session disconnected");
}
