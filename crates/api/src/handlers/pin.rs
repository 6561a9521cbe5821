use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PinResponse {
    pub pin: String,
}

/// POST /api/v1/pin/regenerate
///
/// Replace the caller's discovery PIN. Fails with 409 `duplicate pin` when no
/// free PIN could be drawn.
pub async fn regenerate_pin(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let pin = state.connections.regenerate_pin(auth.user_id).await?;
    Ok(Json(DataResponse {
        data: PinResponse { pin: pin.into() },
    }))
}
