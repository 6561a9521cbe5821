//! Durable activity persistence.
//!
//! [`ActivityPersistence`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and appends every [`ActivityEvent`] to `connection_activity`. It runs as a
//! long-lived background task and exits when the bus is dropped.

use tokio::sync::broadcast;
use kinship_core::types::DbId;
use kinship_db::models::activity::CreateConnectionActivity;
use kinship_db::repositories::ConnectionActivityRepo;
use kinship_db::DbPool;

use crate::bus::ActivityEvent;

/// Background service that writes activity events to the database.
pub struct ActivityPersistence;

impl ActivityPersistence {
    /// Run the persistence loop until the channel closes.
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<ActivityEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = Self::persist(&pool, &event).await {
                        tracing::error!(
                            error = %e,
                            event_type = %event.event_type,
                            "Failed to persist activity event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Activity persistence lagged, some events were not persisted"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, activity persistence shutting down");
                    break;
                }
            }
        }
    }

    async fn persist(pool: &DbPool, event: &ActivityEvent) -> Result<DbId, sqlx::Error> {
        ConnectionActivityRepo::insert(pool, &to_row(event)).await
    }
}

/// Map a bus event onto the insert DTO.
pub fn to_row(event: &ActivityEvent) -> CreateConnectionActivity {
    CreateConnectionActivity {
        event_type: event.event_type.clone(),
        connection_id: event.connection_id,
        request_id: event.request_id,
        actor_user_id: event.actor_user_id,
        target_user_id: event.target_user_id,
        payload: event.payload.clone(),
        occurred_at: event.timestamp,
    }
}
