//! Media handlers: selfies, voice notes, the voicemail inbox and files.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use serde::Deserialize;
use uuid::Uuid;

use kindred_core::media::service::GeneratedMedia;
use kindred_types::interaction::{Media, MediaKind, Voicemail};

use super::resolve_character;
use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::extractors::query::{KindQuery, VoicemailQuery};
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

const DEFAULT_MEDIA_LIMIT: u32 = 50;

/// GET /api/v1/characters/{id}/media?kind=&limit=
pub async fn list_media(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(reference): Path<String>,
    Query(query): Query<KindQuery>,
) -> Result<ApiResponse<Vec<Media>>, AppError> {
    let timer = RequestTimer::start();
    let character = resolve_character(&state, &reference).await?;
    let kind = query.parsed_kind::<MediaKind>()?;
    let media = state
        .media
        .list(&character.id, kind, query.limit.unwrap_or(DEFAULT_MEDIA_LIMIT))
        .await?;
    Ok(timer.finish(media))
}

#[derive(Debug, Default, Deserialize)]
pub struct SelfieRequest {
    pub subject: Option<String>,
}

/// POST /api/v1/characters/{id}/selfie
///
/// Always stores an image; when ComfyUI is off or fails the file is a
/// placeholder and `placeholder` is true.
pub async fn take_selfie(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(reference): Path<String>,
    body: Option<Json<SelfieRequest>>,
) -> Result<ApiResponse<GeneratedMedia>, AppError> {
    let timer = RequestTimer::start();
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let character = resolve_character(&state, &reference).await?;
    let character_state = state.characters.state(&character.id).await?;
    let generated = state
        .media
        .selfie(&character, &character_state, body.subject.as_deref())
        .await?;
    let id = generated.media.id;
    Ok(timer
        .finish(generated)
        .created()
        .with_link("file", format!("/api/v1/media/{id}/file")))
}

#[derive(Debug, Default, Deserialize)]
pub struct VoiceRequest {
    pub text: Option<String>,
    pub emotion: Option<String>,
}

/// POST /api/v1/characters/{id}/voice - leave a voice note in the inbox.
pub async fn leave_voice_message(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(reference): Path<String>,
    body: Option<Json<VoiceRequest>>,
) -> Result<ApiResponse<GeneratedMedia>, AppError> {
    let timer = RequestTimer::start();
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let character = resolve_character(&state, &reference).await?;
    let generated = match body.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(text) => {
            state
                .media
                .voice_message(&character, text, body.emotion.as_deref())
                .await?
        }
        None => state.media.random_voice_message(&character).await?,
    };
    Ok(timer.finish(generated).created())
}

/// GET /api/v1/characters/{id}/voicemails?unheard=true
pub async fn list_voicemails(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(reference): Path<String>,
    Query(query): Query<VoicemailQuery>,
) -> Result<ApiResponse<Vec<Voicemail>>, AppError> {
    let timer = RequestTimer::start();
    let character = resolve_character(&state, &reference).await?;
    let voicemails = state
        .interactions
        .voicemails(&character.id, query.unheard)
        .await?;
    Ok(timer.finish(voicemails))
}

/// POST /api/v1/voicemails/{id}/listened
pub async fn mark_listened(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Voicemail>, AppError> {
    let timer = RequestTimer::start();
    Ok(timer.finish(state.interactions.mark_listened(&id).await?))
}

/// GET /api/v1/media/{id}
pub async fn get_media(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Media>, AppError> {
    let timer = RequestTimer::start();
    let media = find_media(&state, &id).await?;
    Ok(timer
        .finish(media)
        .with_link("file", format!("/api/v1/media/{id}/file")))
}

/// GET /api/v1/media/{id}/file - raw bytes.
pub async fn media_file(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let media = find_media(&state, &id).await?;
    let bytes = tokio::fs::read(&media.filepath).await.map_err(|e| {
        tracing::warn!(media_id = %id, path = %media.filepath, error = %e, "media file unreadable");
        AppError::NotFound(format!("media file missing: {}", media.filepath))
    })?;
    Ok(([(header::CONTENT_TYPE, content_type(&media.filepath))], bytes))
}

/// GET /api/v1/media/status - image generator reachability and checkpoints.
pub async fn media_status(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> ApiResponse<serde_json::Value> {
    let timer = RequestTimer::start();
    let available = state.media.generator_available().await;
    let checkpoints = if available {
        state.media.list_checkpoints().await.unwrap_or_default()
    } else {
        Vec::new()
    };
    timer.finish(serde_json::json!({
        "enabled": state.config.comfyui.enabled,
        "base_url": state.config.comfyui.base_url,
        "available": available,
        "checkpoints": checkpoints,
        "media_dir": state.media.media_dir(),
    }))
}

async fn find_media(state: &AppState, id: &Uuid) -> Result<Media, AppError> {
    state
        .media
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("media not found".to_string()))
}

fn content_type(path: &str) -> &'static str {
    match path.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_by_extension() {
        assert_eq!(content_type("/data/media/images/selfie_happy_1.PNG"), "image/png");
        assert_eq!(content_type("note.wav"), "audio/wav");
        assert_eq!(content_type("no_extension"), "application/octet-stream");
    }
}
