//! Conversation and interaction history handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use uuid::Uuid;

use kindred_types::conversation::{Conversation, StartConversationRequest};
use kindred_types::interaction::{Interaction, InteractionKind};

use super::resolve_character;
use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::extractors::query::{KindQuery, LimitQuery};
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

const DEFAULT_INTERACTION_LIMIT: u32 = 50;

/// GET /api/v1/characters/{id}/conversations - newest first.
pub async fn list_conversations(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(reference): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<ApiResponse<Vec<Conversation>>, AppError> {
    let timer = RequestTimer::start();
    let character = resolve_character(&state, &reference).await?;
    let conversations = state.conversations.history(&character.id, query.limit).await?;
    Ok(timer.finish(conversations))
}

/// POST /api/v1/characters/{id}/conversations
pub async fn start_conversation(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(reference): Path<String>,
    Json(body): Json<StartConversationRequest>,
) -> Result<ApiResponse<Conversation>, AppError> {
    let timer = RequestTimer::start();
    let character = resolve_character(&state, &reference).await?;
    let conversation = state.conversations.start(&character.id, body).await?;
    let id = conversation.id;
    Ok(timer
        .finish(conversation)
        .created()
        .with_link("self", format!("/api/v1/conversations/{id}")))
}

/// GET /api/v1/conversations/{id}
pub async fn get_conversation(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Conversation>, AppError> {
    let timer = RequestTimer::start();
    Ok(timer.finish(state.conversations.get(&id).await?))
}

/// POST /api/v1/conversations/{id}/end
pub async fn end_conversation(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Conversation>, AppError> {
    let timer = RequestTimer::start();
    Ok(timer.finish(state.conversations.end(&id).await?))
}

/// GET /api/v1/characters/{id}/interactions?kind=&limit=
pub async fn list_interactions(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(reference): Path<String>,
    Query(query): Query<KindQuery>,
) -> Result<ApiResponse<Vec<Interaction>>, AppError> {
    let timer = RequestTimer::start();
    let character = resolve_character(&state, &reference).await?;
    let kind = query.parsed_kind::<InteractionKind>()?;
    let interactions = state
        .interactions
        .list(
            &character.id,
            kind,
            query.limit.unwrap_or(DEFAULT_INTERACTION_LIMIT),
        )
        .await?;
    Ok(timer.finish(interactions))
}

/// GET /api/v1/interactions?kind=&limit= - across all characters.
pub async fn recent_interactions(
    State(state): State<AppState>,
    _auth: Authenticated,
    Query(query): Query<KindQuery>,
) -> Result<ApiResponse<Vec<Interaction>>, AppError> {
    let timer = RequestTimer::start();
    let kind = query.parsed_kind::<InteractionKind>()?;
    let interactions = state
        .interactions
        .recent(None, kind, query.limit.unwrap_or(DEFAULT_INTERACTION_LIMIT))
        .await?;
    Ok(timer.finish(interactions))
}

/// GET /api/v1/interactions/chains/{chain_id}
pub async fn interaction_chain(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(chain_id): Path<Uuid>,
) -> Result<ApiResponse<Vec<Interaction>>, AppError> {
    let timer = RequestTimer::start();
    Ok(timer.finish(state.interactions.chain(&chain_id).await?))
}
