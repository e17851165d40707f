//! Simulated phone call handlers.
//!
//! Only one call runs at a time. A call rings, is answered with a greeting,
//! carries chat turns through `say`, and is logged when it ends.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kindred_types::call::{Call, StartCallRequest};
use kindred_types::chat::{ChatReply, SendMessageRequest};
use kindred_types::interaction::Interaction;

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// POST /api/v1/calls
pub async fn start_call(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<StartCallRequest>,
) -> Result<ApiResponse<Call>, AppError> {
    let timer = RequestTimer::start();
    let call = state.calls.start_call(&body.character_id, body.direction).await?;
    let id = call.id.clone();
    Ok(timer
        .finish(call)
        .created()
        .with_link("answer", format!("/api/v1/calls/{id}/answer")))
}

/// GET /api/v1/calls/current - `null` data when idle.
pub async fn current_call(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> ApiResponse<Option<Call>> {
    RequestTimer::start().finish(state.calls.status().await)
}

#[derive(Debug, Serialize)]
pub struct Answered {
    pub call_id: String,
    pub greeting: String,
}

/// POST /api/v1/calls/{id}/answer
pub async fn answer_call(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(call_id): Path<String>,
) -> Result<ApiResponse<Answered>, AppError> {
    let timer = RequestTimer::start();
    let greeting = state.calls.answer(&call_id).await?;
    Ok(timer.finish(Answered { call_id, greeting }))
}

/// POST /api/v1/calls/{id}/say
pub async fn say(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(call_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<ApiResponse<ChatReply>, AppError> {
    let timer = RequestTimer::start();
    Ok(timer.finish(state.calls.say(&call_id, &body.message).await?))
}

/// POST /api/v1/calls/{id}/end
pub async fn end_call(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(call_id): Path<String>,
) -> Result<ApiResponse<Call>, AppError> {
    let timer = RequestTimer::start();
    Ok(timer.finish(state.calls.end(&call_id).await?))
}

#[derive(Debug, Deserialize, Default)]
pub struct CallHistoryQuery {
    pub character_id: Option<Uuid>,
    pub limit: Option<u32>,
}

/// GET /api/v1/calls?character_id=&limit= - logged calls, newest first.
pub async fn call_history(
    State(state): State<AppState>,
    _auth: Authenticated,
    Query(query): Query<CallHistoryQuery>,
) -> Result<ApiResponse<Vec<Interaction>>, AppError> {
    let timer = RequestTimer::start();
    let history = state
        .calls
        .history(query.character_id.as_ref(), query.limit)
        .await?;
    Ok(timer.finish(history))
}
