//! Anonymous contact handlers for the phone scene.

use axum::Json;
use axum::extract::{Query, State};

use kindred_types::anonymous::{
    AnonymousContactInfo, AnonymousMessage, AnonymousReplyRequest, SummonRequest,
};

use super::{MAX_RESULTS, checked_message};
use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::extractors::query::LimitQuery;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

const DEFAULT_THREAD_LIMIT: u32 = 50;

/// GET /api/v1/anonymous
pub async fn get_contact(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<ApiResponse<AnonymousContactInfo>, AppError> {
    let timer = RequestTimer::start();
    Ok(timer.finish(state.anonymous.info().await?))
}

/// POST /api/v1/anonymous - create the contact or switch its persona.
pub async fn summon(
    State(state): State<AppState>,
    _auth: Authenticated,
    body: Option<Json<SummonRequest>>,
) -> Result<ApiResponse<AnonymousContactInfo>, AppError> {
    let timer = RequestTimer::start();
    let persona = body.and_then(|Json(b)| b.persona);
    Ok(timer.finish(state.anonymous.summon(persona).await?))
}

/// POST /api/v1/anonymous/silence
pub async fn silence(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<ApiResponse<AnonymousContactInfo>, AppError> {
    let timer = RequestTimer::start();
    Ok(timer.finish(state.anonymous.set_active(false).await?))
}

/// POST /api/v1/anonymous/wake
pub async fn wake(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<ApiResponse<AnonymousContactInfo>, AppError> {
    let timer = RequestTimer::start();
    Ok(timer.finish(state.anonymous.set_active(true).await?))
}

/// GET /api/v1/anonymous/messages?limit=
pub async fn thread(
    State(state): State<AppState>,
    _auth: Authenticated,
    Query(query): Query<LimitQuery>,
) -> Result<ApiResponse<Vec<AnonymousMessage>>, AppError> {
    let timer = RequestTimer::start();
    let limit = (query.limit.unwrap_or(DEFAULT_THREAD_LIMIT) as usize).min(MAX_RESULTS);
    Ok(timer.finish(state.anonymous.history(limit).await?))
}

/// POST /api/v1/anonymous/messages - answer the unknown number.
pub async fn reply(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<AnonymousReplyRequest>,
) -> Result<ApiResponse<AnonymousMessage>, AppError> {
    let timer = RequestTimer::start();
    let message = checked_message(&body.message)?;
    Ok(timer.finish(state.anonymous.reply(message).await?))
}

/// POST /api/v1/anonymous/initiate - make the contact write now.
pub async fn initiate(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<ApiResponse<AnonymousMessage>, AppError> {
    let timer = RequestTimer::start();
    Ok(timer.finish(state.anonymous.initiate().await?))
}
