//! Fan-out of [`RealtimeEvent`]s to every session of one user.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::mpsc::error::SendTimeoutError;
use kinship_core::types::DbId;
use kinship_events::RealtimeEvent;

use crate::ws::registry::{SessionId, SessionRegistry};

/// Default bound on a single session write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// What happened when one event was delivered to one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryOutcome {
    /// Sessions the event was queued on.
    pub delivered_to: usize,
    /// Whether the user had any session when delivery started.
    pub was_online: bool,
    /// Sessions that were closed or too slow and have been dropped.
    pub failed: usize,
}

/// Routes events to a user's sessions via the [`SessionRegistry`].
///
/// Delivery is best-effort and at-most-once per session. A dead or slow
/// session is abandoned after `write_timeout` and unregistered; it never
/// holds up the others.
#[derive(Clone)]
pub struct EventRouter {
    registry: Arc<SessionRegistry>,
    write_timeout: Duration,
}

impl EventRouter {
    pub fn new(registry: Arc<SessionRegistry>, write_timeout: Duration) -> Self {
        Self {
            registry,
            write_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Push `event` to every active session of `target`.
    pub async fn deliver(&self, target: DbId, event: &RealtimeEvent) -> DeliveryOutcome {
        let senders = self.registry.senders_for(target).await;
        if senders.is_empty() {
            tracing::debug!(user_id = target, kind = event.kind(), "Target offline, event not delivered");
            return DeliveryOutcome::default();
        }

        let text = match event.to_json() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, kind = event.kind(), "Failed to serialize event");
                return DeliveryOutcome {
                    delivered_to: 0,
                    was_online: true,
                    failed: 0,
                };
            }
        };
        let message = Message::Text(text.into());

        let attempts = senders.into_iter().map(|(session_id, sender)| {
            let message = message.clone();
            async move {
                let result = sender.send_timeout(message, self.write_timeout).await;
                (session_id, result)
            }
        });

        let mut outcome = DeliveryOutcome {
            delivered_to: 0,
            was_online: true,
            failed: 0,
        };
        let mut dead: Vec<SessionId> = Vec::new();
        for (session_id, result) in join_all(attempts).await {
            match result {
                Ok(()) => outcome.delivered_to += 1,
                Err(SendTimeoutError::Timeout(_)) => {
                    tracing::warn!(
                        user_id = target,
                        session_id = %session_id,
                        kind = event.kind(),
                        "Session write timed out, dropping session"
                    );
                    dead.push(session_id);
                }
                Err(SendTimeoutError::Closed(_)) => {
                    tracing::debug!(
                        user_id = target,
                        session_id = %session_id,
                        "Session channel closed, dropping session"
                    );
                    dead.push(session_id);
                }
            }
        }

        outcome.failed = dead.len();
        for session_id in dead {
            self.registry.unregister(target, session_id).await;
        }

        tracing::debug!(
            user_id = target,
            kind = event.kind(),
            delivered_to = outcome.delivered_to,
            failed = outcome.failed,
            "Event delivered"
        );
        outcome
    }
}
