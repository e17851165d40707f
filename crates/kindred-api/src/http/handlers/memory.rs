//! Memory handlers: store, browse, semantic search and prompt context.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use uuid::Uuid;

use kindred_types::memory::{Memory, MemoryFilter, MemoryHit, MemoryKind, NewMemory};

use super::{MAX_RESULTS, resolve_character};
use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::extractors::query::KindQuery;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: u32 = 20;
const DEFAULT_SEARCH_RESULTS: usize = 5;

/// GET /api/v1/characters/{id}/memories?kind=&limit= - newest first.
pub async fn list_memories(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(reference): Path<String>,
    Query(query): Query<KindQuery>,
) -> Result<ApiResponse<Vec<Memory>>, AppError> {
    let timer = RequestTimer::start();
    let character = resolve_character(&state, &reference).await?;
    let kind = query.parsed_kind::<MemoryKind>()?;
    let limit = (query.limit.unwrap_or(DEFAULT_LIST_LIMIT) as usize).min(MAX_RESULTS);
    let memories = state.memory.recent(&character.id, limit, kind).await?;
    Ok(timer.finish(memories))
}

/// POST /api/v1/characters/{id}/memories
///
/// A near-duplicate reinforces the existing memory, which is returned.
pub async fn add_memory(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(reference): Path<String>,
    Json(body): Json<NewMemory>,
) -> Result<ApiResponse<Memory>, AppError> {
    let timer = RequestTimer::start();
    let character = resolve_character(&state, &reference).await?;
    let memory = state.memory.add(&character.id, body).await?;
    let id = memory.id;
    Ok(timer
        .finish(memory)
        .created()
        .with_link("self", format!("/api/v1/memories/{id}")))
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub n: Option<usize>,
    #[serde(default)]
    pub kind: Option<MemoryKind>,
    #[serde(default)]
    pub min_importance: Option<f64>,
}

/// POST /api/v1/characters/{id}/memories/search
///
/// Empty when semantic memory is disabled.
pub async fn search_memories(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(reference): Path<String>,
    Json(body): Json<SearchRequest>,
) -> Result<ApiResponse<Vec<MemoryHit>>, AppError> {
    let timer = RequestTimer::start();
    let character = resolve_character(&state, &reference).await?;
    let filter = MemoryFilter {
        kind: body.kind,
        min_importance: body.min_importance,
    };
    let hits = state
        .memory
        .query(
            &character.id,
            &body.query,
            body.n.unwrap_or(DEFAULT_SEARCH_RESULTS).min(MAX_RESULTS),
            &filter,
        )
        .await?;
    Ok(timer.finish(hits))
}

#[derive(Debug, Deserialize)]
pub struct ContextQuery {
    #[serde(default)]
    pub query: String,
}

/// GET /api/v1/characters/{id}/memories/context?query=
pub async fn memory_context(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(reference): Path<String>,
    Query(query): Query<ContextQuery>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();
    let character = resolve_character(&state, &reference).await?;
    let context = state.memory.build_context(&character.id, &query.query).await?;
    Ok(timer.finish(serde_json::json!({
        "character_id": character.id,
        "semantic": state.memory.semantic_enabled(),
        "context": context,
    })))
}

/// DELETE /api/v1/characters/{id}/memories - forget everything about them.
pub async fn clear_memories(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(reference): Path<String>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();
    let character = resolve_character(&state, &reference).await?;
    let removed = state.memory.delete_for_character(&character.id).await?;
    Ok(timer.finish(serde_json::json!({ "removed": removed })))
}

/// GET /api/v1/memories/{id}
pub async fn get_memory(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Memory>, AppError> {
    let timer = RequestTimer::start();
    Ok(timer.finish(state.memory.get(&id).await?))
}

/// DELETE /api/v1/memories/{id}
pub async fn delete_memory(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();
    state.memory.delete(&id).await?;
    Ok(timer.finish(serde_json::json!({ "deleted": id })))
}
