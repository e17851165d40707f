//! Selfies and voice notes.
//!
//! Files land under `<media_dir>/images` and `<media_dir>/voice`. Each one
//! gets a `media` row, an asset registration, and a `media_generated`
//! event. Image generation failures never surface: a 1x1 grey PNG is
//! written instead and the result is flagged as a placeholder.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use kindred_types::asset::{AssetType, SaveAssetRequest};
use kindred_types::character::{Character, CharacterState};
use kindred_types::error::MediaError;
use kindred_types::event::CompanionEvent;
use kindred_types::interaction::{Media, MediaKind};
use serde::Serialize;
use uuid::Uuid;

use super::box_generator::BoxImageGenerator;
use super::generator::ImageRequest;
use super::{prompt, voice};
use crate::asset::AssetManager;
use crate::asset::validation::png_dimensions;
use crate::event::EventBus;
use crate::repository::Backend;
use crate::repository::interaction::MediaRepository;
use crate::service::character::appearance;
use crate::service::fs::FileSystem;
use crate::service::interaction::InteractionService;

const PLACEHOLDER_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

/// A stored media file.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedMedia {
    pub media: Media,
    /// True when the file is a stand-in for a failed generation.
    pub placeholder: bool,
    /// Spoken text of a voice note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

pub struct MediaService<B: Backend> {
    backend: Arc<B>,
    generator: Option<BoxImageGenerator>,
    assets: AssetManager<B>,
    interactions: InteractionService<B>,
    events: EventBus,
    media_dir: PathBuf,
}

impl<B: Backend> MediaService<B> {
    pub fn new(backend: Arc<B>, events: EventBus, media_dir: PathBuf) -> Self {
        Self {
            assets: AssetManager::new(Arc::clone(&backend)),
            interactions: InteractionService::new(Arc::clone(&backend)),
            backend,
            generator: None,
            events,
            media_dir,
        }
    }

    pub fn with_generator(mut self, generator: BoxImageGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    /// Whether an image backend is configured and answering.
    pub async fn generator_available(&self) -> bool {
        match &self.generator {
            Some(generator) => generator.is_available().await,
            None => false,
        }
    }

    pub async fn list_checkpoints(&self) -> Result<Vec<String>, MediaError> {
        match &self.generator {
            Some(generator) => generator.list_checkpoints().await,
            None => Err(MediaError::Unavailable("image generation is disabled".to_string())),
        }
    }

    /// Take a selfie. `subject` (from the chat intent) overrides the
    /// setting of the randomly chosen context.
    pub async fn selfie(
        &self,
        character: &Character,
        state: &CharacterState,
        subject: Option<&str>,
    ) -> Result<GeneratedMedia, MediaError> {
        let mut context = prompt::random_context(state.relationship_level, &mut rand::rng());
        if let Some(subject) = subject.map(str::trim).filter(|s| !s.is_empty()) {
            context.setting = subject.to_lowercase();
        }

        let look = appearance(character);
        let (positive, negative) = prompt::selfie(&look, &context.mood, &context.setting, None);
        let request = ImageRequest {
            positive: positive.clone(),
            negative,
            seed: None,
            filename_prefix: format!("selfie_{}", context.mood),
        };

        let generated = match &self.generator {
            Some(generator) => match generator.generate(&request).await {
                Ok(image) => Some(image),
                Err(e) => {
                    tracing::warn!(generator = generator.name(), error = %e, "image generation failed, writing placeholder");
                    None
                }
            },
            None => {
                tracing::debug!("image generation disabled, writing placeholder");
                None
            }
        };

        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let (bytes, filename, checkpoint, placeholder) = match generated {
            Some(image) => (
                image.bytes,
                format!("{}_{stamp}_{}.{}", request.filename_prefix, short_hex(6), image.extension),
                image.checkpoint,
                false,
            ),
            None => (
                placeholder_png()?,
                format!("{}_placeholder_{stamp}_{}.png", request.filename_prefix, short_hex(6)),
                None,
                true,
            ),
        };

        let path = self.media_dir.join("images").join(filename);
        self.write_file(&path, &bytes).await?;
        let filepath = path.to_string_lossy().to_string();

        let (width, height) = png_dimensions(&bytes).unwrap_or((0, 0));
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png")
            .to_string();
        let asset_id = self
            .register_asset(
                AssetType::Image,
                serde_json::json!({
                    "filepath": filepath,
                    "width": width,
                    "height": height,
                    "format": extension,
                }),
                vec![
                    character.name.clone(),
                    context.mood.clone(),
                    context.setting.clone(),
                    "selfie".to_string(),
                    "generated".to_string(),
                ],
            )
            .await;

        let media = self
            .record(
                character,
                MediaKind::Image,
                filepath,
                serde_json::json!({
                    "mood": context.mood,
                    "setting": context.setting,
                    "prompt": positive,
                    "checkpoint": checkpoint,
                    "placeholder": placeholder,
                    "asset_id": asset_id,
                }),
                placeholder,
            )
            .await?;

        Ok(GeneratedMedia {
            media,
            placeholder,
            text: None,
        })
    }

    /// Store a voice note for `text` and drop it in the voicemail inbox.
    pub async fn voice_message(
        &self,
        character: &Character,
        text: &str,
        emotion: Option<&str>,
    ) -> Result<GeneratedMedia, MediaError> {
        let emotion = emotion.unwrap_or("neutral");
        let wav = voice::silent_wav(voice::PLACEHOLDER_SECS, voice::SAMPLE_RATE);
        let duration = voice::wav_duration(&wav).unwrap_or(voice::PLACEHOLDER_SECS);

        let filename = format!(
            "{}_voice_{}_{}.wav",
            file_stem(&character.name),
            short_hex(8),
            Utc::now().format("%Y%m%d_%H%M%S")
        );
        let path = self.media_dir.join("voice").join(filename);
        self.write_file(&path, &wav).await?;
        let filepath = path.to_string_lossy().to_string();

        let asset_id = self
            .register_asset(
                AssetType::Audio,
                serde_json::json!({
                    "filepath": filepath,
                    "duration": duration,
                    "sample_rate": voice::SAMPLE_RATE,
                    "channels": 1,
                    "format": "wav",
                }),
                vec![
                    character.id.to_string(),
                    character.name.clone(),
                    emotion.to_string(),
                    "voice_message".to_string(),
                ],
            )
            .await;

        let media = self
            .record(
                character,
                MediaKind::Voice,
                filepath.clone(),
                serde_json::json!({
                    "text": text,
                    "duration": duration,
                    "emotion": emotion,
                    "asset_id": asset_id,
                }),
                true,
            )
            .await?;

        self.interactions
            .add_voicemail(&character.id, &filepath, Some(text), duration)
            .await
            .map_err(|e| MediaError::StorageError(e.to_string()))?;

        Ok(GeneratedMedia {
            media,
            placeholder: true,
            text: Some(text.to_string()),
        })
    }

    /// A voice note with a canned line.
    pub async fn random_voice_message(&self, character: &Character) -> Result<GeneratedMedia, MediaError> {
        self.voice_message(character, &voice::random_text(), None).await
    }

    pub async fn get(&self, id: &Uuid) -> Result<Option<Media>, MediaError> {
        self.backend
            .media()
            .get(id)
            .await
            .map_err(|e| MediaError::StorageError(e.to_string()))
    }

    pub async fn list(
        &self,
        character_id: &Uuid,
        kind: Option<MediaKind>,
        limit: u32,
    ) -> Result<Vec<Media>, MediaError> {
        self.backend
            .media()
            .list(character_id, kind, limit)
            .await
            .map_err(|e| MediaError::StorageError(e.to_string()))
    }

    pub async fn count(&self) -> Result<u64, MediaError> {
        self.backend
            .media()
            .count()
            .await
            .map_err(|e| MediaError::StorageError(e.to_string()))
    }

    async fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), MediaError> {
        if let Some(parent) = path.parent() {
            self.backend
                .files()
                .create_dir_all(parent)
                .await
                .map_err(|e| MediaError::Io(e.to_string()))?;
        }
        self.backend
            .files()
            .write_bytes(path, bytes)
            .await
            .map_err(|e| MediaError::Io(e.to_string()))
    }

    async fn register_asset(
        &self,
        asset_type: AssetType,
        data: serde_json::Value,
        tags: Vec<String>,
    ) -> Option<Uuid> {
        let request = SaveAssetRequest {
            id: None,
            asset_type,
            data,
            metadata: None,
            tags,
        };
        match self.assets.save(request).await {
            Ok(asset) => Some(asset.id),
            Err(e) => {
                tracing::warn!(asset_type = %asset_type, error = %e, "failed to register media asset");
                None
            }
        }
    }

    async fn record(
        &self,
        character: &Character,
        kind: MediaKind,
        filepath: String,
        metadata: serde_json::Value,
        placeholder: bool,
    ) -> Result<Media, MediaError> {
        let media = Media {
            id: Uuid::now_v7(),
            character_id: character.id,
            kind,
            filepath,
            thumbnail: None,
            metadata,
            created_at: Utc::now(),
        };
        self.backend
            .media()
            .create(&media)
            .await
            .map_err(|e| MediaError::StorageError(e.to_string()))?;

        tracing::info!(character = %character.name, media_id = %media.id, kind = %kind, placeholder, "media stored");
        self.events.publish(CompanionEvent::MediaGenerated {
            character_id: character.id,
            media_id: media.id,
            kind: kind.to_string(),
            filepath: media.filepath.clone(),
            placeholder,
        });
        Ok(media)
    }
}

/// The 1x1 grey PNG written when generation fails.
pub fn placeholder_png() -> Result<Vec<u8>, MediaError> {
    STANDARD
        .decode(PLACEHOLDER_PNG)
        .map_err(|e| MediaError::Io(format!("placeholder image: {e}")))
}

fn short_hex(len: usize) -> String {
    Uuid::new_v4().simple().to_string()[..len].to_string()
}

/// Lowercase ASCII alphanumerics of a name, for file names.
fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if stem.is_empty() {
        "character".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::asset::validation::detect_image_format;

    #[test]
    fn test_placeholder_is_a_1x1_png() {
        let bytes = placeholder_png().unwrap();
        assert_eq!(detect_image_format(&bytes), Some("png"));
        assert_eq!(png_dimensions(&bytes), Some((1, 1)));
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("Luna Mae!"), "lunamae");
        assert_eq!(file_stem("Zoë"), "zo");
        assert_eq!(file_stem("ジュン"), "character");
    }

    #[test]
    fn test_short_hex_length() {
        assert_eq!(short_hex(6).len(), 6);
        assert!(short_hex(8).chars().all(|c| c.is_ascii_hexdigit()));
    }
}
