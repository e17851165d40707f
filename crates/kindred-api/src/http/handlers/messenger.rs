//! Autonomous messenger handlers.

use axum::Json;
use axum::extract::{Path, State};

use kindred_types::messenger::{AutonomousMessage, MessengerSettings, Registration};

use super::resolve_character;
use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// GET /api/v1/messenger
pub async fn messenger_status(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> ApiResponse<serde_json::Value> {
    let timer = RequestTimer::start();
    timer.finish(serde_json::json!({
        "enabled": state.messenger.is_enabled().await,
        "registrations": state.messenger.registrations().await,
    }))
}

/// POST /api/v1/messenger/enable
pub async fn enable_messenger(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();
    state.messenger.enable().await?;
    Ok(timer.finish(serde_json::json!({ "enabled": true })))
}

/// POST /api/v1/messenger/disable
pub async fn disable_messenger(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();
    state.messenger.disable().await?;
    Ok(timer.finish(serde_json::json!({ "enabled": false })))
}

/// GET /api/v1/characters/{id}/messenger
pub async fn get_registration(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(reference): Path<String>,
) -> Result<ApiResponse<Registration>, AppError> {
    let timer = RequestTimer::start();
    let character = resolve_character(&state, &reference).await?;
    let registration = state
        .messenger
        .registration(&character.id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("{} is not registered", character.name)))?;
    Ok(timer.finish(registration))
}

/// PUT /api/v1/characters/{id}/messenger - register or replace settings.
pub async fn register(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(reference): Path<String>,
    body: Option<Json<MessengerSettings>>,
) -> Result<ApiResponse<Registration>, AppError> {
    let timer = RequestTimer::start();
    let settings = body.map(|Json(s)| s).unwrap_or_default();
    let character = resolve_character(&state, &reference).await?;
    Ok(timer.finish(state.messenger.register(&character.id, settings).await?))
}

/// DELETE /api/v1/characters/{id}/messenger
pub async fn unregister(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(reference): Path<String>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();
    let character = resolve_character(&state, &reference).await?;
    state.messenger.unregister(&character.id).await?;
    Ok(timer.finish(serde_json::json!({ "unregistered": character.id })))
}

/// POST /api/v1/characters/{id}/messenger/send - send one right now.
pub async fn send_now(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(reference): Path<String>,
) -> Result<ApiResponse<AutonomousMessage>, AppError> {
    let timer = RequestTimer::start();
    let character = resolve_character(&state, &reference).await?;
    Ok(timer.finish(state.messenger.send_now(&character.id).await?))
}
