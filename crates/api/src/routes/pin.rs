use axum::routing::post;
use axum::Router;

use crate::handlers::pin;
use crate::state::AppState;

/// Routes mounted at `/pin`.
///
/// ```text
/// POST   /regenerate   -> regenerate_pin
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/regenerate", post(pin::regenerate_pin))
}
