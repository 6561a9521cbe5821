pub mod connections;
pub mod health;
pub mod pin;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /ws?token=<jwt>                                  WebSocket session
///
/// /connections/requests/pin                        request by PIN (POST)
/// /connections/requests/email                      request by email (POST)
/// /connections/requests/qr                         request by QR payload (POST)
/// /connections/requests/incoming                   pending, addressed to me (GET)
/// /connections/requests/outgoing                   pending, sent by me (GET)
/// /connections/requests/{id}/respond               accept / decline / block (POST)
/// /connections                                     my accepted connections (GET)
/// /connections/{id}/level-up                       propose next trust level (POST)
/// /connections/{id}/block                          block connection (POST)
/// /connections/{id}/capabilities/{capability}      capability check (GET)
/// /connections/{id}/messages                       relay text message (POST)
/// /connections/{id}/calls                          record completed call (POST)
///
/// /pin/regenerate                                  new discovery PIN (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // WebSocket upgrade (token in query string).
        .route("/ws", get(ws::ws_handler))
        .nest("/connections", connections::router())
        .nest("/pin", pin::router())
}
