//! Core services running on the SQLite backend and the LanceDB store.
//!
//! The network-facing pieces (embedding model, image backend, LLM) are
//! replaced by small deterministic fakes.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::Stream;
use kindred_core::call::CallManager;
use kindred_core::chat::CompanionChat;
use kindred_core::event::EventBus;
use kindred_core::llm::box_provider::BoxLlmProvider;
use kindred_core::llm::provider::LlmProvider;
use kindred_core::llm::service::LlmService;
use kindred_core::media::box_generator::BoxImageGenerator;
use kindred_core::media::generator::{GeneratedImage, ImageGenerator, ImageRequest};
use kindred_core::media::service::MediaService;
use kindred_core::memory::box_embedder::BoxEmbedder;
use kindred_core::memory::box_vector::BoxVectorMemoryStore;
use kindred_core::memory::embedder::Embedder;
use kindred_core::memory::service::MemoryService;
use kindred_core::messenger::{AnonymousContact, AutonomousMessenger};
use kindred_core::scene::SceneManager;
use kindred_core::service::character::CharacterService;
use kindred_core::service::conversation::ConversationService;
use kindred_core::service::interaction::InteractionService;
use kindred_core::service::personality::PersonalityService;
use kindred_core::service::role::RoleService;
use kindred_types::anonymous::{ANONYMOUS_TAG, Direction, Persona, StoryEvent};
use kindred_types::asset::{AssetType, SaveAssetRequest};
use kindred_types::call::{CallDirection, CallStatus};
use kindred_types::character::{Character, CreateCharacterRequest};
use kindred_types::chat::Intent;
use kindred_types::config::LlmConfig;
use kindred_types::conversation::StartConversationRequest;
use kindred_types::error::{AnonymousError, ConversationError, MediaError, RepositoryError, SceneError};
use kindred_types::event::CompanionEvent;
use kindred_types::interaction::InteractionKind;
use kindred_types::llm::{
    CompletionRequest, MessageRole, CompletionResponse, LlmError, ModelInfo, ProviderCapabilities, StopReason,
    StreamEvent, TokenCount, Usage,
};
use kindred_types::memory::{MemoryFilter, MemoryKind, NewMemory};
use kindred_types::role::CreateRoleRequest;
use kindred_types::scene::{CreateSceneRequest, SceneDefinition, SceneKind, SceneStatus};
use tempfile::TempDir;

use crate::sqlite::SqliteBackend;
use crate::sqlite::pool::DatabasePool;
use crate::vector::lance::LanceVectorStore;
use crate::vector::memory::LanceVectorMemoryStore;
use crate::vector::schema::EMBEDDING_DIMENSION;

/// Bag-of-words hashing embedder: texts sharing words land close together.
struct WordHashEmbedder;

fn word_vector(text: &str) -> Vec<f32> {
    let dim = EMBEDDING_DIMENSION as usize;
    let mut vec = vec![0.0f32; dim];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        // FNV-1a
        let hash = word
            .to_lowercase()
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
                (h ^ b as u64).wrapping_mul(0x0100_0000_01b3)
            });
        vec[(hash % dim as u64) as usize] += 1.0;
    }
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        vec[0] = 1.0;
    } else {
        vec.iter_mut().for_each(|v| *v /= norm);
    }
    vec
}

impl Embedder for WordHashEmbedder {
    fn embed(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, RepositoryError>> + Send {
        let vectors = texts.iter().map(|t| word_vector(t)).collect();
        async move { Ok(vectors) }
    }

    fn model_name(&self) -> &str {
        "word-hash"
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION as usize
    }
}

/// 2x3 PNG header; enough for dimension sniffing.
fn tiny_png() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&2u32.to_be_bytes());
    bytes.extend_from_slice(&3u32.to_be_bytes());
    bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
    bytes
}

struct FakeImages {
    working: bool,
}

impl ImageGenerator for FakeImages {
    fn name(&self) -> &str {
        "fake-images"
    }

    fn is_available(&self) -> impl Future<Output = bool> + Send {
        let working = self.working;
        async move { working }
    }

    fn list_checkpoints(&self) -> impl Future<Output = Result<Vec<String>, MediaError>> + Send {
        async { Ok(vec!["dreamshaper.safetensors".to_string()]) }
    }

    fn generate(
        &self,
        _request: &ImageRequest,
    ) -> impl Future<Output = Result<GeneratedImage, MediaError>> + Send {
        let working = self.working;
        async move {
            if working {
                Ok(GeneratedImage {
                    bytes: tiny_png(),
                    extension: "png".to_string(),
                    checkpoint: Some("dreamshaper.safetensors".to_string()),
                })
            } else {
                Err(MediaError::Generation("queue rejected prompt".to_string()))
            }
        }
    }
}

/// Answers every completion with the same line.
struct ScriptedLlm {
    capabilities: ProviderCapabilities,
    reply: &'static str,
}

impl ScriptedLlm {
    fn new(reply: &'static str) -> Self {
        Self {
            capabilities: ProviderCapabilities {
                streaming: true,
                max_context_tokens: 8192,
                max_output_tokens: 1024,
            },
            reply,
        }
    }
}

impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, LlmError>> + Send {
        let response = CompletionResponse {
            id: "resp-1".to_string(),
            content: self.reply.to_string(),
            model: request.model.clone(),
            stop_reason: StopReason::EndTurn,
            usage: Usage::default(),
        };
        async move { Ok(response) }
    }

    fn stream(
        &self,
        _request: CompletionRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
        let reply = self.reply;
        Box::pin(async_stream::stream! {
            yield Ok(StreamEvent::Connected);
            yield Ok(StreamEvent::TextDelta { text: reply.to_string() });
            yield Ok(StreamEvent::Done);
        })
    }

    fn count_tokens(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<TokenCount, LlmError>> + Send {
        let chars: usize = request.messages.iter().map(|m| m.content.len()).sum();
        async move {
            Ok(TokenCount {
                input_tokens: (chars / 4) as u32,
            })
        }
    }

    fn list_models(&self) -> impl Future<Output = Result<Vec<ModelInfo>, LlmError>> + Send {
        async {
            Ok(vec![ModelInfo {
                id: "llama-3.1-8b".to_string(),
                owned_by: None,
            }])
        }
    }
}

struct Harness {
    backend: Arc<SqliteBackend>,
    events: EventBus,
    memory: Arc<MemoryService<SqliteBackend>>,
    media: Arc<MediaService<SqliteBackend>>,
    characters: Arc<CharacterService<SqliteBackend>>,
    conversations: Arc<ConversationService<SqliteBackend>>,
    llm: Arc<LlmService>,
    chat: Arc<CompanionChat<SqliteBackend>>,
    _dir: TempDir,
}

impl Harness {
    async fn new(images_working: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::open(&dir.path().join("kindred.db")).await.unwrap();
        let backend = Arc::new(SqliteBackend::new(pool));
        let events = EventBus::new(64);

        let store = LanceVectorStore::new(dir.path().join("vectors")).await.unwrap();
        let memory = Arc::new(
            MemoryService::new(Arc::clone(&backend), events.clone()).with_vectors(
                BoxEmbedder::new(WordHashEmbedder),
                BoxVectorMemoryStore::new(LanceVectorMemoryStore::new(store)),
            ),
        );
        let media = Arc::new(
            MediaService::new(Arc::clone(&backend), events.clone(), dir.path().join("media"))
                .with_generator(BoxImageGenerator::new(FakeImages {
                    working: images_working,
                })),
        );
        let characters = Arc::new(CharacterService::new(
            Arc::clone(&backend),
            Arc::clone(&memory),
            events.clone(),
        ));
        let conversations = Arc::new(ConversationService::new(Arc::clone(&backend), Arc::clone(&memory)));
        let llm = Arc::new(LlmService::new(
            BoxLlmProvider::new(ScriptedLlm::new("I was just thinking about you!")),
            LlmConfig::default(),
        ));
        let chat = Arc::new(CompanionChat::new(
            Arc::clone(&characters),
            Arc::clone(&conversations),
            Arc::clone(&memory),
            Arc::clone(&media),
            Arc::clone(&llm),
            events.clone(),
        ));

        Self {
            backend,
            events,
            memory,
            media,
            characters,
            conversations,
            llm,
            chat,
            _dir: dir,
        }
    }

    async fn character(&self, name: &str) -> Character {
        self.characters
            .create(CreateCharacterRequest {
                name: name.to_string(),
                age: Some(24),
                hair_color: Some("silver".to_string()),
                ..Default::default()
            })
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_memory_query_ranks_by_shared_words() {
    let h = Harness::new(true).await;
    let luna = h.character("Luna").await;

    for (content, kind) in [
        ("user loves strong black coffee", MemoryKind::Preference),
        ("user has a dog named Biscuit", MemoryKind::Fact),
        ("we watched the meteor shower together", MemoryKind::Event),
    ] {
        h.memory
            .add(&luna.id, NewMemory::new(content, kind, 0.6))
            .await
            .unwrap();
    }

    let hits = h
        .memory
        .query(&luna.id, "coffee black", 3, &MemoryFilter::default())
        .await
        .unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].memory.content, "user loves strong black coffee");
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));

    let facts = h
        .memory
        .query(
            &luna.id,
            "coffee black",
            3,
            &MemoryFilter {
                kind: Some(MemoryKind::Fact),
                min_importance: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].memory.content, "user has a dog named Biscuit");
}

#[tokio::test]
async fn test_filtered_query_looks_past_closer_rows() {
    let h = Harness::new(true).await;
    let luna = h.character("Luna").await;

    for i in 0..6 {
        h.memory
            .add(
                &luna.id,
                NewMemory::new(format!("coffee a{i}"), MemoryKind::Conversation, 0.5),
            )
            .await
            .unwrap();
    }
    h.memory
        .add(
            &luna.id,
            NewMemory::new("coffee beans roasted dark today", MemoryKind::Fact, 0.5),
        )
        .await
        .unwrap();

    let facts = h
        .memory
        .query(
            &luna.id,
            "coffee",
            1,
            &MemoryFilter {
                kind: Some(MemoryKind::Fact),
                min_importance: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].memory.content, "coffee beans roasted dark today");

    let huge = h
        .memory
        .query(
            &luna.id,
            "coffee",
            usize::MAX,
            &MemoryFilter {
                kind: Some(MemoryKind::Fact),
                min_importance: Some(0.1),
            },
        )
        .await;
    assert!(huge.is_ok());
}

#[tokio::test]
async fn test_memory_duplicate_is_reinforced() {
    let h = Harness::new(true).await;
    let luna = h.character("Luna").await;
    let mut rx = h.events.subscribe();

    let first = h
        .memory
        .add(&luna.id, NewMemory::new("user works night shifts", MemoryKind::Fact, 0.4))
        .await
        .unwrap();
    let second = h
        .memory
        .add(&luna.id, NewMemory::new("user works night shifts", MemoryKind::Fact, 0.4))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(h.memory.count(Some(&luna.id)).await.unwrap(), 1);

    let mut reinforced = false;
    while let Ok(event) = rx.try_recv() {
        if let CompanionEvent::MemoryStored { reinforced: true, .. } = event {
            reinforced = true;
        }
    }
    assert!(reinforced);
}

#[tokio::test]
async fn test_memory_context_mentions_relevant_memory() {
    let h = Harness::new(true).await;
    let luna = h.character("Luna").await;
    h.memory
        .add(&luna.id, NewMemory::new("user's birthday is in March", MemoryKind::Fact, 0.9))
        .await
        .unwrap();

    let context = h.memory.build_context(&luna.id, "birthday plans").await.unwrap();
    assert!(context.contains("birthday is in March"));
}

#[tokio::test]
async fn test_memories_follow_character_delete() {
    let h = Harness::new(true).await;
    let luna = h.character("Luna").await;
    h.memory
        .add(&luna.id, NewMemory::new("user plays the cello", MemoryKind::Fact, 0.5))
        .await
        .unwrap();

    h.characters.delete(&luna.id).await.unwrap();
    assert_eq!(h.memory.count(Some(&luna.id)).await.unwrap(), 0);
}

#[tokio::test]
async fn test_selfie_writes_generated_image() {
    let h = Harness::new(true).await;
    let luna = h.character("Luna").await;
    let state = h.characters.state(&luna.id).await.unwrap();

    let generated = h.media.selfie(&luna, &state, Some("beach")).await.unwrap();
    assert!(!generated.placeholder);
    assert_eq!(generated.media.metadata["setting"], "beach");
    assert_eq!(
        generated.media.metadata["checkpoint"],
        "dreamshaper.safetensors"
    );

    let bytes = tokio::fs::read(&generated.media.filepath).await.unwrap();
    assert_eq!(bytes, tiny_png());
    assert_eq!(h.media.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_selfie_falls_back_to_placeholder() {
    let h = Harness::new(false).await;
    let luna = h.character("Luna").await;
    let state = h.characters.state(&luna.id).await.unwrap();

    let generated = h.media.selfie(&luna, &state, None).await.unwrap();
    assert!(generated.placeholder);
    assert!(generated.media.filepath.contains("placeholder"));
    assert!(tokio::fs::metadata(&generated.media.filepath).await.is_ok());
}

#[tokio::test]
async fn test_chat_turn_uses_llm_reply() {
    let h = Harness::new(true).await;
    let luna = h.character("Luna").await;
    let before = h.characters.state(&luna.id).await.unwrap();

    let reply = h.chat.send_message(&luna.id, "how was your day?").await.unwrap();
    assert_eq!(reply.content, "I was just thinking about you!");
    assert_eq!(reply.intent, Intent::Text);
    assert!(!reply.fallback);

    let after = h.characters.state(&luna.id).await.unwrap();
    assert!(after.relationship_level > before.relationship_level);
}

#[tokio::test]
async fn test_chat_selfie_request_returns_photo() {
    let h = Harness::new(true).await;
    let luna = h.character("Luna").await;

    let reply = h.chat.send_message(&luna.id, "send me a selfie").await.unwrap();
    assert!(matches!(reply.intent, Intent::Selfie { .. }));
    let path = reply.media_path.expect("photo path");
    assert!(tokio::fs::metadata(&path).await.is_ok());
}

#[tokio::test]
async fn test_call_lifecycle_is_logged() {
    let h = Harness::new(true).await;
    let luna = h.character("Luna").await;
    let calls = CallManager::new(Arc::clone(&h.backend), Arc::clone(&h.chat), h.events.clone());

    let call = calls.start_call(&luna.id, CallDirection::Outgoing).await.unwrap();
    assert_eq!(call.status, CallStatus::Ringing);
    assert!(calls.start_call(&luna.id, CallDirection::Incoming).await.is_err());
    assert!(calls.say(&call.id, "hello?").await.is_err());

    let greeting = calls.answer(&call.id).await.unwrap();
    assert!(!greeting.is_empty());

    let reply = calls.say(&call.id, "how was your day?").await.unwrap();
    assert_eq!(reply.content, "I was just thinking about you!");

    let ended = calls.end(&call.id).await.unwrap();
    assert_eq!(ended.status, CallStatus::Ended);
    assert!(calls.status().await.is_none());

    let history = calls.history(Some(&luna.id), None).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, InteractionKind::VoiceCall);
    assert_eq!(history[0].metadata["direction"], "outgoing");
}

#[tokio::test]
async fn test_messenger_send_now_logs_autonomous_message() {
    let h = Harness::new(true).await;
    let luna = h.character("Luna").await;
    let messenger = AutonomousMessenger::new(
        Arc::clone(&h.backend),
        Arc::clone(&h.characters),
        Arc::clone(&h.media),
        h.events.clone(),
    );
    let mut rx = h.events.subscribe();

    let sent = messenger.send_now(&luna.id).await.unwrap();
    assert_eq!(sent.character_id, luna.id);
    assert!(!sent.content.is_empty());

    let interactions = InteractionService::new(Arc::clone(&h.backend));
    let logged = interactions
        .recent(Some(&luna.id), Some(InteractionKind::Message), 10)
        .await
        .unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].metadata["autonomous"], true);
    assert_eq!(logged[0].content, sent.content);

    let mut announced = false;
    while let Ok(event) = rx.try_recv() {
        if let CompanionEvent::MessageReceived { autonomous: true, .. } = event {
            announced = true;
        }
    }
    assert!(announced);
}

#[tokio::test]
async fn test_concurrent_relationship_bumps_all_count() {
    let h = Harness::new(true).await;
    let luna = h.character("Luna").await;

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let characters = Arc::clone(&h.characters);
            let id = luna.id;
            tokio::spawn(async move { characters.adjust_relationship(&id, 0.01).await.unwrap() })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let state = h.characters.state(&luna.id).await.unwrap();
    assert!((state.relationship_level - 0.20).abs() < 1e-9);

    let capped = h.characters.adjust_relationship(&luna.id, 5.0).await.unwrap();
    assert_eq!(capped.relationship_level, 1.0);
    let floored = h.characters.adjust_energy(&luna.id, f64::NAN).await.unwrap();
    assert!((floored.energy - state.energy).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_ended_conversation_is_closed() {
    let h = Harness::new(true).await;
    let luna = h.character("Luna").await;
    let conversation = h
        .conversations
        .start(&luna.id, StartConversationRequest::default())
        .await
        .unwrap();

    h.conversations
        .add_message(&conversation.id, MessageRole::User, "good morning", None)
        .await
        .unwrap();
    let ended = h.conversations.end(&conversation.id).await.unwrap();
    assert!(ended.is_ended());
    assert_eq!(ended.messages.len(), 1);

    let late = h
        .conversations
        .add_message(&conversation.id, MessageRole::Assistant, "still there?", None)
        .await;
    assert!(matches!(late, Err(ConversationError::AlreadyEnded)));
    assert!(matches!(
        h.conversations.end(&conversation.id).await,
        Err(ConversationError::AlreadyEnded)
    ));

    // The late message never reopened it.
    let stored = h.conversations.get(&conversation.id).await.unwrap();
    assert!(stored.is_ended());
    assert_eq!(stored.messages.len(), 1);
    assert!(h.conversations.active_for(&luna.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_templates_materialise_once() {
    let h = Harness::new(true).await;
    let personalities = PersonalityService::new(Arc::clone(&h.backend));
    let roles = RoleService::new(Arc::clone(&h.backend));

    let first = personalities.create_from_template("playful").await.unwrap();
    let again = personalities.create_from_template("playful").await.unwrap();
    assert_eq!(first.id, again.id);
    assert_eq!(personalities.list().await.unwrap().len(), 1);

    let role = roles.create_from_template("study_buddy").await.unwrap();
    assert_eq!(roles.create_from_template("study_buddy").await.unwrap().id, role.id);
    assert_eq!(roles.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_find_suitable_accepts_exactly_half() {
    let h = Harness::new(true).await;
    let roles = RoleService::new(Arc::clone(&h.backend));
    roles
        .create_custom(CreateRoleRequest {
            name: "Hiking partner".to_string(),
            description: "Weekend trails".to_string(),
            required_traits: vec!["adventurous".to_string(), "patient".to_string()],
            context: String::new(),
            scenario: String::new(),
        })
        .await
        .unwrap();

    let half = roles.find_suitable(&["Adventurous".to_string()]).await.unwrap();
    assert_eq!(half.len(), 1);
    assert_eq!(half[0].name, "Hiking partner");

    let none = roles.find_suitable(&["shy".to_string()]).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_scene_lifecycle_publishes_events() {
    let h = Harness::new(true).await;
    let scenes = SceneManager::with_kinds(Arc::clone(&h.backend), h.events.clone(), [SceneKind::Phone]);
    let mut rx = h.events.subscribe();

    let unregistered = scenes
        .create(CreateSceneRequest {
            kind: SceneKind::Bedroom,
            name: "night".to_string(),
            characters: Vec::new(),
            config: serde_json::Value::Null,
        })
        .await;
    assert!(matches!(unregistered, Err(SceneError::UnregisteredKind(k)) if k == "bedroom"));

    let phone = scenes
        .create(CreateSceneRequest {
            kind: SceneKind::Phone,
            name: "  ".to_string(),
            characters: Vec::new(),
            config: serde_json::Value::Null,
        })
        .await
        .unwrap();
    assert_eq!(phone.name, "phone");
    assert_eq!(phone.config, serde_json::json!({}));
    match rx.recv().await.unwrap() {
        CompanionEvent::SceneStarted { scene_id, kind, .. } => {
            assert_eq!(scene_id, phone.id);
            assert_eq!(kind, SceneKind::Phone);
        }
        other => panic!("unexpected event {other:?}"),
    }

    let stopped = scenes.stop(&phone.id).await.unwrap();
    assert_eq!(stopped.status, SceneStatus::Stopped);
    assert!(stopped.stopped_at.is_some());
    assert!(matches!(
        rx.recv().await.unwrap(),
        CompanionEvent::SceneStopped { scene_id } if scene_id == phone.id
    ));
    assert!(matches!(scenes.stop(&phone.id).await, Err(SceneError::NotFound)));

    scenes.register(SceneKind::Hub).await;
    for name in ["a", "b"] {
        scenes
            .create(CreateSceneRequest {
                kind: SceneKind::Hub,
                name: name.to_string(),
                characters: Vec::new(),
                config: serde_json::Value::Null,
            })
            .await
            .unwrap();
    }
    assert_eq!(scenes.list_active().await.len(), 2);
    assert_eq!(scenes.stop_all().await, 2);
    assert!(scenes.list_active().await.is_empty());
    assert_eq!(scenes.stop_all().await, 0);
}

#[tokio::test]
async fn test_scene_load_checks_asset_type() {
    let h = Harness::new(true).await;
    let scenes = SceneManager::new(Arc::clone(&h.backend), h.events.clone());

    let saved = scenes
        .save_definition(
            &SceneDefinition {
                name: "Evening call".to_string(),
                scene_type: SceneKind::Phone,
                config: serde_json::json!({ "ringtone": "soft" }),
                characters: Vec::new(),
                assets: serde_json::Map::new(),
                server_config: serde_json::Value::Null,
                ui_config: serde_json::Value::Null,
            },
            vec!["evening".to_string()],
        )
        .await
        .unwrap();
    let loaded = scenes.load(&saved.id).await.unwrap();
    assert_eq!(loaded.name, "Evening call");
    assert_eq!(loaded.asset_id, Some(saved.id));

    let message = kindred_core::asset::AssetManager::new(Arc::clone(&h.backend))
        .save(SaveAssetRequest {
            id: None,
            asset_type: AssetType::Message,
            data: serde_json::json!({ "conversation_id": "c1", "sender": "user" }),
            metadata: None,
            tags: Vec::new(),
        })
        .await
        .unwrap();
    assert!(matches!(
        scenes.load(&message.id).await,
        Err(SceneError::InvalidDefinition(_))
    ));
}

#[tokio::test]
async fn test_anonymous_contact_thread() {
    let h = Harness::new(true).await;
    let contact = AnonymousContact::new(
        Arc::clone(&h.backend),
        Arc::clone(&h.characters),
        Arc::clone(&h.llm),
        h.events.clone(),
    );
    assert!(matches!(contact.info().await, Err(AnonymousError::NoContact)));
    assert!(contact.check().await.unwrap().is_none());

    let info = contact.summon(Some(Persona::Hacker)).await.unwrap();
    assert_eq!(info.display_name, "Unknown");
    assert_eq!(info.message_count, 0);
    let stored = h.characters.get(&info.character_id).await.unwrap();
    assert!(stored.tags.iter().any(|t| t == ANONYMOUS_TAG));

    // Summoning again with no persona keeps the same contact.
    assert_eq!(contact.summon(None).await.unwrap().thread_id, info.thread_id);

    let mut rx = h.events.subscribe();
    let first = contact.initiate().await.unwrap();
    assert_eq!(first.direction, Direction::Outgoing);
    assert!(!first.content.is_empty());
    let mut announced = false;
    while let Ok(event) = rx.try_recv() {
        if let CompanionEvent::MessageReceived { character_id, kind, autonomous, .. } = event {
            assert_eq!(character_id, info.character_id);
            assert_eq!(kind, "anonymous");
            assert!(autonomous);
            announced = true;
        }
    }
    assert!(announced);

    let answer = contact.reply("  who are you?  ").await.unwrap();
    assert_eq!(answer.content, "I was just thinking about you!");
    assert!(!answer.fallback);
    assert!(matches!(contact.reply("   ").await, Err(AnonymousError::EmptyMessage)));

    let thread = contact.history(10).await.unwrap();
    assert_eq!(thread.len(), 3);
    assert_eq!(thread[1].direction, Direction::Incoming);
    assert_eq!(thread[1].content, "who are you?");
    assert_eq!(contact.history(1).await.unwrap()[0].content, answer.content);
    assert_eq!(contact.info().await.unwrap().message_count, 2);

    let interactions = InteractionService::new(Arc::clone(&h.backend));
    let logged = interactions.chain(&info.thread_id).await.unwrap();
    assert_eq!(logged.len(), 3);
    assert!(logged.iter().all(|i| i.metadata["anonymous"] == true));

    // A new persona starts a new thread under the same character.
    let switched = contact.summon(Some(Persona::AiEntity)).await.unwrap();
    assert_eq!(switched.character_id, info.character_id);
    assert_ne!(switched.thread_id, info.thread_id);
    assert_eq!(switched.display_name, "SYSTEM");
    assert!(contact.history(10).await.unwrap().is_empty());

    contact.set_active(false).await.unwrap();
    assert!(matches!(contact.initiate().await, Err(AnonymousError::Inactive)));
    assert!(contact.check().await.unwrap().is_none());
}

#[tokio::test]
async fn test_anonymous_story_events_fire_once() {
    let h = Harness::new(true).await;
    let contact = AnonymousContact::new(
        Arc::clone(&h.backend),
        Arc::clone(&h.characters),
        Arc::clone(&h.llm),
        h.events.clone(),
    );
    contact.summon(Some(Persona::MysteryStranger)).await.unwrap();

    let mut first_contacts = 0;
    for _ in 0..40 {
        let sent = contact.initiate().await.unwrap();
        if sent.event == Some(StoryEvent::FirstContact) {
            first_contacts += 1;
        }
    }
    assert!(first_contacts <= 1);

    let thread = contact.history(100).await.unwrap();
    let mut fired: Vec<StoryEvent> = thread.iter().filter_map(|m| m.event).collect();
    let total = fired.len();
    fired.dedup();
    assert_eq!(fired.len(), total);
}

#[tokio::test]
async fn test_messenger_schedules_anonymous_contact() {
    let h = Harness::new(true).await;
    let messenger = AutonomousMessenger::new(
        Arc::clone(&h.backend),
        Arc::clone(&h.characters),
        Arc::clone(&h.media),
        h.events.clone(),
    );
    let contact = Arc::new(AnonymousContact::new(
        Arc::clone(&h.backend),
        Arc::clone(&h.characters),
        Arc::clone(&h.llm),
        h.events.clone(),
    ));

    messenger.attach_anonymous(Arc::clone(&contact)).await.unwrap();
    assert!(!messenger.anonymous_scheduled().await);

    messenger.enable().await.unwrap();
    assert!(messenger.anonymous_scheduled().await);

    // Re-attaching while running replaces the job rather than stacking one.
    messenger.attach_anonymous(contact).await.unwrap();
    assert!(messenger.anonymous_scheduled().await);

    messenger.disable().await.unwrap();
    assert!(!messenger.anonymous_scheduled().await);
}
