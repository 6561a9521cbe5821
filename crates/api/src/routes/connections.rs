//! Route definitions for the `/connections` resource.
//!
//! All endpoints require authentication.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::connections;
use crate::state::AppState;

/// Routes mounted at `/connections`.
///
/// ```text
/// GET    /                                -> list_connections
/// POST   /requests/pin                    -> request_by_pin
/// POST   /requests/email                  -> request_by_email
/// POST   /requests/qr                     -> request_by_qr
/// GET    /requests/incoming               -> incoming_requests
/// GET    /requests/outgoing               -> outgoing_requests
/// POST   /requests/{id}/respond           -> respond
/// POST   /{id}/level-up                   -> propose_level_up
/// POST   /{id}/block                      -> block_connection
/// GET    /{id}/capabilities/{capability}  -> has_capability
/// POST   /{id}/messages                   -> relay_message
/// POST   /{id}/calls                      -> record_call
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(connections::list_connections))
        // Requests
        .route("/requests/pin", post(connections::request_by_pin))
        .route("/requests/email", post(connections::request_by_email))
        .route("/requests/qr", post(connections::request_by_qr))
        .route("/requests/incoming", get(connections::incoming_requests))
        .route("/requests/outgoing", get(connections::outgoing_requests))
        .route("/requests/{id}/respond", post(connections::respond))
        // Established connections
        .route("/{id}/level-up", post(connections::propose_level_up))
        .route("/{id}/block", post(connections::block_connection))
        .route(
            "/{id}/capabilities/{capability}",
            get(connections::has_capability),
        )
        .route("/{id}/messages", post(connections::relay_message))
        .route("/{id}/calls", post(connections::record_call))
}
