//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST
//! API. Services are generic over a storage `Backend`; AppState pins them to
//! the SQLite backend from kindred-infra.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use kindred_core::asset::AssetManager;
use kindred_core::call::CallManager;
use kindred_core::chat::CompanionChat;
use kindred_core::event::EventBus;
use kindred_core::event::bus::DEFAULT_CAPACITY;
use kindred_core::llm::service::LlmService;
use kindred_core::media::box_generator::BoxImageGenerator;
use kindred_core::media::service::MediaService;
use kindred_core::memory::box_embedder::BoxEmbedder;
use kindred_core::memory::box_vector::BoxVectorMemoryStore;
use kindred_core::memory::service::MemoryService;
use kindred_core::messenger::{AnonymousContact, AutonomousMessenger};
use kindred_core::scene::SceneManager;
use kindred_core::service::character::CharacterService;
use kindred_core::service::conversation::ConversationService;
use kindred_core::service::interaction::InteractionService;
use kindred_core::service::personality::PersonalityService;
use kindred_core::service::role::RoleService;
use kindred_infra::comfyui::ComfyUiClient;
use kindred_infra::filesystem::LocalFileSystem;
use kindred_infra::llm::create_provider;
use kindred_infra::sqlite::SqliteBackend;
use kindred_infra::sqlite::api_key::SqliteApiKeyStore;
use kindred_infra::sqlite::pool::DatabasePool;
use kindred_infra::vector::embedder::FastEmbedEmbedder;
use kindred_infra::vector::lance::LanceVectorStore;
use kindred_infra::vector::memory::LanceVectorMemoryStore;
use kindred_types::config::AppConfig;
use kindred_types::memory::ContextLimits;
use kindred_types::anonymous::ANONYMOUS_TAG;
use kindred_types::messenger::MessengerSettings;

/// Service generics pinned to the SQLite backend.
pub type Backend = SqliteBackend;

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
    pub events: EventBus,
    pub characters: Arc<CharacterService<Backend>>,
    pub personalities: Arc<PersonalityService<Backend>>,
    pub roles: Arc<RoleService<Backend>>,
    pub conversations: Arc<ConversationService<Backend>>,
    pub interactions: Arc<InteractionService<Backend>>,
    pub memory: Arc<MemoryService<Backend>>,
    pub media: Arc<MediaService<Backend>>,
    pub assets: Arc<AssetManager<Backend>>,
    pub scenes: Arc<SceneManager<Backend>>,
    pub llm: Arc<LlmService>,
    pub chat: Arc<CompanionChat<Backend>>,
    pub calls: Arc<CallManager<Backend>>,
    pub messenger: Arc<AutonomousMessenger<Backend>>,
    pub anonymous: Arc<AnonymousContact<Backend>>,
    pub api_keys: SqliteApiKeyStore,
    /// Character picked through the legacy `character/set` route.
    pub current_character: Arc<RwLock<Option<Uuid>>>,
}

impl AppState {
    /// Wire services for an explicit data directory and config.
    pub async fn build(data_dir: PathBuf, config: AppConfig) -> anyhow::Result<Self> {
        let db_path = config
            .database
            .path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| LocalFileSystem::db_path(&data_dir));
        let db_pool = DatabasePool::open(&db_path).await?;
        let backend = Arc::new(SqliteBackend::new(db_pool.clone()));
        let events = EventBus::new(DEFAULT_CAPACITY);

        let limits = ContextLimits {
            n_recent: config.memory.n_recent,
            n_semantic: config.memory.n_semantic,
            n_important: config.memory.n_important,
        };
        let mut memory = MemoryService::new(Arc::clone(&backend), events.clone()).with_limits(limits);
        if config.memory.vector_enabled {
            match open_vectors(&data_dir, &config).await {
                Ok((embedder, store)) => memory = memory.with_vectors(embedder, store),
                // SQL-only memory still works; semantic recall is skipped.
                Err(e) => tracing::warn!(error = %e, "vector memory unavailable"),
            }
        }
        let memory = Arc::new(memory);

        let mut media = MediaService::new(
            Arc::clone(&backend),
            events.clone(),
            LocalFileSystem::media_dir(&data_dir),
        );
        if config.comfyui.enabled {
            media = media.with_generator(BoxImageGenerator::new(ComfyUiClient::new(&config.comfyui)));
        }
        let media = Arc::new(media);

        let characters = Arc::new(CharacterService::new(
            Arc::clone(&backend),
            Arc::clone(&memory),
            events.clone(),
        ));
        let conversations = Arc::new(ConversationService::new(Arc::clone(&backend), Arc::clone(&memory)));
        let llm = Arc::new(LlmService::new(create_provider(&config.llm), config.llm.clone()));

        let chat = Arc::new(CompanionChat::new(
            Arc::clone(&characters),
            Arc::clone(&conversations),
            Arc::clone(&memory),
            Arc::clone(&media),
            Arc::clone(&llm),
            events.clone(),
        ));
        let calls = Arc::new(CallManager::new(Arc::clone(&backend), Arc::clone(&chat), events.clone()));
        let messenger = AutonomousMessenger::new(
            Arc::clone(&backend),
            Arc::clone(&characters),
            Arc::clone(&media),
            events.clone(),
        );
        let anonymous = Arc::new(AnonymousContact::new(
            Arc::clone(&backend),
            Arc::clone(&characters),
            Arc::clone(&llm),
            events.clone(),
        ));

        tracing::debug!(data_dir = %data_dir.display(), "application state ready");
        Ok(Self {
            config: Arc::new(config),
            data_dir,
            api_keys: SqliteApiKeyStore::new(db_pool.clone()),
            db_pool,
            characters,
            personalities: Arc::new(PersonalityService::new(Arc::clone(&backend))),
            roles: Arc::new(RoleService::new(Arc::clone(&backend))),
            conversations,
            interactions: Arc::new(InteractionService::new(Arc::clone(&backend))),
            memory,
            media,
            assets: Arc::new(AssetManager::new(Arc::clone(&backend))),
            scenes: Arc::new(SceneManager::new(Arc::clone(&backend), events.clone())),
            llm,
            chat,
            calls,
            messenger,
            anonymous,
            events,
            current_character: Arc::new(RwLock::new(None)),
        })
    }

    /// Start the autonomous messenger if configured, registering every
    /// character when `auto_register` is set.
    pub async fn start_messenger(&self) -> anyhow::Result<()> {
        if !self.config.messenger.enabled {
            return Ok(());
        }
        if self.config.messenger.auto_register {
            for character in self.characters.list().await? {
                if character.tags.iter().any(|t| t == ANONYMOUS_TAG) {
                    continue;
                }
                self.messenger
                    .register(&character.id, MessengerSettings::default())
                    .await?;
            }
        }
        if self.config.messenger.anonymous_contact {
            self.messenger.attach_anonymous(Arc::clone(&self.anonymous)).await?;
        }
        self.messenger.enable().await?;
        Ok(())
    }
}

async fn open_vectors(
    data_dir: &Path,
    config: &AppConfig,
) -> anyhow::Result<(BoxEmbedder, BoxVectorMemoryStore)> {
    let vector_dir = config
        .memory
        .vector_path
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| LocalFileSystem::vector_dir(data_dir));
    let store = LanceVectorStore::new(vector_dir).await?;

    // Loading the model may download it; keep that off the runtime threads.
    let cache_dir = data_dir.join("models");
    let embedder = tokio::task::spawn_blocking(move || FastEmbedEmbedder::new(cache_dir)).await??;

    Ok((
        BoxEmbedder::new(embedder),
        BoxVectorMemoryStore::new(LanceVectorMemoryStore::new(store)),
    ))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// State over a temp directory with every external service off or
    /// unreachable, so replies come from the fallback lines.
    pub(crate) async fn offline_state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.memory.vector_enabled = false;
        config.comfyui.enabled = false;
        config.llm.base_url = "http://127.0.0.1:9/v1".to_string();
        config.llm.timeout_secs = 1;
        let state = AppState::build(dir.path().to_path_buf(), config).await.unwrap();
        (state, dir)
    }

    #[tokio::test]
    async fn test_build_creates_database_in_data_dir() {
        let (state, dir) = offline_state().await;
        assert!(dir.path().join("kindred.db").exists());
        assert!(!state.memory.semantic_enabled());
        assert_eq!(state.characters.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_start_messenger_disabled_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.memory.vector_enabled = false;
        config.messenger.enabled = false;
        let state = AppState::build(dir.path().to_path_buf(), config).await.unwrap();

        state.start_messenger().await.unwrap();
        assert!(!state.messenger.is_enabled().await);
    }
}
