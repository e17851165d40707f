//! Unversioned routes kept for the phone and bedroom web pages.
//!
//! These return bare JSON in the shape the pages already parse rather than
//! the `/api/v1` envelope. Errors still use the envelope.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kindred_types::call::CallDirection;
use kindred_types::character::Character;
use kindred_types::chat::ChatReply;

use super::{checked_message, resolve_character};
use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CharacterSummary {
    pub id: Uuid,
    pub name: String,
    pub tags: Vec<String>,
}

impl From<Character> for CharacterSummary {
    fn from(c: Character) -> Self {
        Self {
            id: c.id,
            name: c.name,
            tags: c.tags,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CharacterList {
    pub characters: Vec<CharacterSummary>,
    pub current: Option<Uuid>,
}

/// GET /api/characters/list
pub async fn list_characters(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<Json<CharacterList>, AppError> {
    let characters = state
        .characters
        .list()
        .await?
        .into_iter()
        .map(CharacterSummary::from)
        .collect();
    let current = *state.current_character.read().await;
    Ok(Json(CharacterList { characters, current }))
}

#[derive(Debug, Deserialize)]
pub struct SetCharacterRequest {
    /// UUID or name.
    pub character_id: String,
}

#[derive(Debug, Serialize)]
pub struct SetCharacterResponse {
    pub success: bool,
    pub character: CharacterSummary,
}

/// POST /api/character/set
///
/// Selects the character later legacy calls talk to. When the messenger is
/// running the character is registered with default settings.
pub async fn set_character(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<SetCharacterRequest>,
) -> Result<Json<SetCharacterResponse>, AppError> {
    let reference = body.character_id.trim();
    if reference.is_empty() {
        return Err(AppError::Validation("No character_id provided".to_string()));
    }
    let character = resolve_character(&state, reference).await?;

    *state.current_character.write().await = Some(character.id);
    if state.messenger.is_enabled().await && state.messenger.registration(&character.id).await.is_none() {
        state
            .messenger
            .register(&character.id, Default::default())
            .await?;
    }
    tracing::info!(character = %character.name, "current character set");

    Ok(Json(SetCharacterResponse {
        success: true,
        character: character.into(),
    }))
}

/// Explicit character in the body, else the current selection.
async fn target_character(
    state: &AppState,
    requested: Option<&str>,
) -> Result<Character, AppError> {
    if let Some(reference) = requested {
        return resolve_character(state, reference).await;
    }
    let current = *state.current_character.read().await;
    match current {
        Some(id) => Ok(state.characters.get(&id).await?),
        None => Err(AppError::Validation("No active character".to_string())),
    }
}

#[derive(Debug, Deserialize)]
pub struct LegacyMessageRequest {
    pub message: String,
    pub character_id: Option<String>,
}

/// POST /api/send_message
pub async fn send_message(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<LegacyMessageRequest>,
) -> Result<Json<ChatReply>, AppError> {
    let message = checked_message(&body.message)?;

    let character = target_character(&state, body.character_id.as_deref()).await?;
    Ok(Json(state.chat.send_message(&character.id, message).await?))
}

#[derive(Debug, Deserialize)]
pub struct LegacyCallRequest {
    #[serde(rename = "type", default = "default_direction")]
    pub direction: CallDirection,
    pub character_id: Option<String>,
}

fn default_direction() -> CallDirection {
    CallDirection::Outgoing
}

#[derive(Debug, Serialize)]
pub struct CallStarted {
    pub call_id: String,
    #[serde(rename = "type")]
    pub direction: CallDirection,
    pub character: String,
    /// Present when the call was placed by the user and answered at once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub greeting: Option<String>,
}

/// POST /api/start_call
///
/// Outgoing calls are answered immediately; incoming calls ring until
/// `/api/v1/calls/{id}/answer`.
pub async fn start_call(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<LegacyCallRequest>,
) -> Result<Json<CallStarted>, AppError> {
    let character = target_character(&state, body.character_id.as_deref()).await?;
    let call = state.calls.start_call(&character.id, body.direction).await?;

    let greeting = match body.direction {
        CallDirection::Outgoing => Some(state.calls.answer(&call.id).await?),
        CallDirection::Incoming => None,
    };

    Ok(Json(CallStarted {
        call_id: call.id,
        direction: body.direction,
        character: character.name,
        greeting,
    }))
}
