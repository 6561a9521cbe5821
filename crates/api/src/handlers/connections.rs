//! Handlers for the `/connections` resource.
//!
//! Thin wrappers: decode the body, call [`ConnectionService`], wrap the
//! result. All endpoints require authentication via [`AuthUser`].
//!
//! [`ConnectionService`]: crate::connections::ConnectionService

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use kinship_core::connection::{InteractionKind, RespondAction};
use kinship_core::trust::Capability;
use kinship_core::types::DbId;

use crate::connections::LevelUpOutcome;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PinRequestBody {
    pub pin: String,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequestBody {
    pub email: String,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QrRequestBody {
    /// Raw text scanned from the QR code.
    pub payload: String,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RespondBody {
    pub action: RespondAction,
}

#[derive(Debug, Deserialize)]
pub struct LevelUpBody {
    pub target_level: i32,
}

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct CallBody {
    pub kind: InteractionKind,
}

#[derive(Debug, Serialize)]
pub struct CapabilityResponse {
    pub connection_id: DbId,
    pub capability: Capability,
    pub allowed: bool,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// POST /api/v1/connections/requests/pin
pub async fn request_by_pin(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<PinRequestBody>,
) -> AppResult<impl IntoResponse> {
    let request = state
        .connections
        .request_by_pin(auth.user_id, &body.pin, body.message)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: request })))
}

/// POST /api/v1/connections/requests/email
pub async fn request_by_email(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<EmailRequestBody>,
) -> AppResult<impl IntoResponse> {
    let request = state
        .connections
        .request_by_email(auth.user_id, &body.email, body.message)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: request })))
}

/// POST /api/v1/connections/requests/qr
pub async fn request_by_qr(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<QrRequestBody>,
) -> AppResult<impl IntoResponse> {
    let request = state
        .connections
        .request_by_qr(auth.user_id, &body.payload, body.message)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: request })))
}

/// GET /api/v1/connections/requests/incoming
pub async fn incoming_requests(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let requests = state.connections.incoming_requests(auth.user_id).await?;
    Ok(Json(DataResponse { data: requests }))
}

/// GET /api/v1/connections/requests/outgoing
pub async fn outgoing_requests(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let requests = state.connections.outgoing_requests(auth.user_id).await?;
    Ok(Json(DataResponse { data: requests }))
}

/// POST /api/v1/connections/requests/{id}/respond
pub async fn respond(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(request_id): Path<DbId>,
    Json(body): Json<RespondBody>,
) -> AppResult<impl IntoResponse> {
    let outcome = state
        .connections
        .respond(request_id, auth.user_id, body.action)
        .await?;
    Ok(Json(DataResponse { data: outcome }))
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

/// GET /api/v1/connections
pub async fn list_connections(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let connections = state.connections.connections_for(auth.user_id).await?;
    Ok(Json(DataResponse { data: connections }))
}

/// POST /api/v1/connections/{id}/level-up
///
/// Returns 200 when the level changed (or is already at the cap) and 202
/// when the proposal is waiting for the counterpart.
pub async fn propose_level_up(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(connection_id): Path<DbId>,
    Json(body): Json<LevelUpBody>,
) -> AppResult<impl IntoResponse> {
    let outcome = state
        .connections
        .propose_level_up(connection_id, auth.user_id, body.target_level)
        .await?;
    let status = match &outcome {
        LevelUpOutcome::AwaitingConsent { .. } => StatusCode::ACCEPTED,
        LevelUpOutcome::Changed { .. } | LevelUpOutcome::AtCap { .. } => StatusCode::OK,
    };
    Ok((status, Json(DataResponse { data: outcome })))
}

/// POST /api/v1/connections/{id}/block
pub async fn block_connection(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(connection_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let connection = state
        .connections
        .block_connection(connection_id, auth.user_id)
        .await?;
    Ok(Json(DataResponse { data: connection }))
}

/// GET /api/v1/connections/{id}/capabilities/{capability}
pub async fn has_capability(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((connection_id, capability)): Path<(DbId, String)>,
) -> AppResult<impl IntoResponse> {
    let capability: Capability = capability.parse()?;
    state
        .connections
        .connection_for_participant(connection_id, auth.user_id)
        .await?;
    let allowed = state
        .connections
        .has_capability(connection_id, capability)
        .await?;
    Ok(Json(DataResponse {
        data: CapabilityResponse {
            connection_id,
            capability,
            allowed,
        },
    }))
}

/// POST /api/v1/connections/{id}/messages
pub async fn relay_message(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(connection_id): Path<DbId>,
    Json(body): Json<MessageBody>,
) -> AppResult<impl IntoResponse> {
    let outcome = state
        .connections
        .relay_message(connection_id, auth.user_id, &body.text)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: outcome })))
}

/// POST /api/v1/connections/{id}/calls
pub async fn record_call(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(connection_id): Path<DbId>,
    Json(body): Json<CallBody>,
) -> AppResult<impl IntoResponse> {
    let connection = state
        .connections
        .record_call(connection_id, auth.user_id, body.kind)
        .await?;
    Ok(Json(DataResponse { data: connection }))
}
