use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::ws::registry::SessionRegistry;

/// Interval between heartbeat pings (in seconds).
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Spawn a background task that queues a Ping on every session periodically.
///
/// Runs until `cancel` is triggered.
pub fn start_heartbeat(
    registry: Arc<SessionRegistry>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Heartbeat stopping");
                    break;
                }
                _ = interval.tick() => {
                    let count = registry.session_count().await;
                    tracing::debug!(count, "Session heartbeat ping");
                    registry.ping_all().await;
                }
            }
        }
    })
}
