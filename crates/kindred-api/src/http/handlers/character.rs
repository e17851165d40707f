//! Character CRUD, state and tag handlers.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;

use kindred_types::character::{
    CharacterState, CharacterView, CreateCharacterRequest, StateUpdate, UpdateCharacterRequest,
};

use super::resolve_character;
use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// POST /api/v1/characters
pub async fn create_character(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<CreateCharacterRequest>,
) -> Result<ApiResponse<CharacterView>, AppError> {
    let timer = RequestTimer::start();
    let character = state.characters.create(body).await?;
    let view = state.characters.get_view(&character.id).await?;

    Ok(timer
        .finish(view)
        .created()
        .with_link("self", format!("/api/v1/characters/{}", character.id))
        .with_link("state", format!("/api/v1/characters/{}/state", character.id)))
}

/// GET /api/v1/characters
pub async fn list_characters(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<ApiResponse<Vec<CharacterView>>, AppError> {
    let timer = RequestTimer::start();
    let mut views = Vec::new();
    for character in state.characters.list().await? {
        let character_state = state.characters.state(&character.id).await?;
        views.push(CharacterView {
            character,
            state: character_state,
        });
    }
    Ok(timer.finish(views).with_link("self", "/api/v1/characters"))
}

/// GET /api/v1/characters/{id} - by UUID or name.
pub async fn get_character(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(reference): Path<String>,
) -> Result<ApiResponse<CharacterView>, AppError> {
    let timer = RequestTimer::start();
    let character = resolve_character(&state, &reference).await?;
    let view = state.characters.get_view(&character.id).await?;

    let id = character.id;
    Ok(timer
        .finish(view)
        .with_link("self", format!("/api/v1/characters/{id}"))
        .with_link("conversations", format!("/api/v1/characters/{id}/conversations"))
        .with_link("memories", format!("/api/v1/characters/{id}/memories"))
        .with_link("media", format!("/api/v1/characters/{id}/media")))
}

/// PUT /api/v1/characters/{id}
pub async fn update_character(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(reference): Path<String>,
    Json(body): Json<UpdateCharacterRequest>,
) -> Result<ApiResponse<CharacterView>, AppError> {
    let timer = RequestTimer::start();
    let character = resolve_character(&state, &reference).await?;
    state.characters.update(&character.id, body).await?;
    let view = state.characters.get_view(&character.id).await?;
    Ok(timer.finish(view))
}

/// DELETE /api/v1/characters/{id}
pub async fn delete_character(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(reference): Path<String>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();
    let character = resolve_character(&state, &reference).await?;
    state.characters.delete(&character.id).await?;

    // Stop unprompted messages to a character that no longer exists.
    if state.messenger.registration(&character.id).await.is_some() {
        state.messenger.unregister(&character.id).await?;
    }
    let mut current = state.current_character.write().await;
    if *current == Some(character.id) {
        *current = None;
    }

    Ok(timer.finish(serde_json::json!({ "deleted": character.id })))
}

/// GET /api/v1/characters/{id}/state
pub async fn get_state(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(reference): Path<String>,
) -> Result<ApiResponse<CharacterState>, AppError> {
    let timer = RequestTimer::start();
    let character = resolve_character(&state, &reference).await?;
    Ok(timer.finish(state.characters.state(&character.id).await?))
}

/// PATCH /api/v1/characters/{id}/state - absolute values, clamped to [0, 1].
pub async fn update_state(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(reference): Path<String>,
    Json(body): Json<StateUpdate>,
) -> Result<ApiResponse<CharacterState>, AppError> {
    let timer = RequestTimer::start();
    let character = resolve_character(&state, &reference).await?;
    Ok(timer.finish(state.characters.update_state(&character.id, body).await?))
}

#[derive(Debug, Deserialize)]
pub struct TagRequest {
    pub tag: String,
}

/// POST /api/v1/characters/{id}/tags
pub async fn add_tag(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(reference): Path<String>,
    Json(body): Json<TagRequest>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();
    let character = resolve_character(&state, &reference).await?;
    let added = state.characters.add_tag(&character.id, &body.tag).await?;
    Ok(timer.finish(serde_json::json!({ "tag": body.tag.trim(), "added": added })))
}

/// DELETE /api/v1/characters/{id}/tags/{tag}
pub async fn remove_tag(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path((reference, tag)): Path<(String, String)>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();
    let character = resolve_character(&state, &reference).await?;
    let removed = state.characters.remove_tag(&character.id, &tag).await?;
    Ok(timer.finish(serde_json::json!({ "tag": tag, "removed": removed })))
}
