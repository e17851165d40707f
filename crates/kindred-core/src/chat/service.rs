//! Companion chat orchestration.
//!
//! A turn loads the character with its personality and state, appends the
//! user message to the open conversation, works out what the user asked
//! for, and answers with text, a selfie or a voice note. The reply is
//! appended to the same conversation and announced on the event bus.

use std::sync::Arc;

use kindred_types::character::{Character, CharacterState};
use kindred_types::chat::{ChatReply, Intent};
use kindred_types::conversation::{ChatMessage, Conversation};
use kindred_types::error::{CharacterError, ChatError};
use kindred_types::event::CompanionEvent;
use kindred_types::llm::{CompletionRequest, MessageRole};
use rand::seq::IndexedRandom;
use uuid::Uuid;

use crate::event::EventBus;
use crate::llm::intent::parse_intent;
use crate::llm::service::{CharacterPrompt, LlmService};
use crate::media::service::MediaService;
use crate::memory::service::MemoryService;
use crate::repository::Backend;
use crate::service::character::{CharacterService, system_prompt};
use crate::service::conversation::ConversationService;

/// Relationship gained per exchanged message.
const RELATIONSHIP_STEP: f64 = 0.01;

const PHOTO_CAPTIONS: &[&str] = &[
    "Here's a pic for you! 📸",
    "Just took this for you 😊",
    "How do I look?",
    "Snapped this just now!",
    "Thought you might like this one 💕",
];

/// Everything gathered before the character answers.
#[derive(Debug, Clone)]
pub struct Turn {
    pub character: Character,
    pub state: CharacterState,
    pub conversation: Conversation,
    /// Conversation messages before this turn's user message.
    pub history: Vec<ChatMessage>,
    pub user_message: String,
    pub intent: Intent,
    pub prompt: CharacterPrompt,
}

/// What the character answers with.
struct Answer {
    content: String,
    kind: &'static str,
    media_path: Option<String>,
    fallback: bool,
}

pub struct CompanionChat<B: Backend> {
    characters: Arc<CharacterService<B>>,
    conversations: Arc<ConversationService<B>>,
    memory: Arc<MemoryService<B>>,
    media: Arc<MediaService<B>>,
    llm: Arc<LlmService>,
    events: EventBus,
}

impl<B: Backend> CompanionChat<B> {
    pub fn new(
        characters: Arc<CharacterService<B>>,
        conversations: Arc<ConversationService<B>>,
        memory: Arc<MemoryService<B>>,
        media: Arc<MediaService<B>>,
        llm: Arc<LlmService>,
        events: EventBus,
    ) -> Self {
        Self {
            characters,
            conversations,
            memory,
            media,
            llm,
            events,
        }
    }

    pub fn llm(&self) -> &LlmService {
        &self.llm
    }

    /// Run a full chat turn.
    pub async fn send_message(&self, character_id: &Uuid, text: &str) -> Result<ChatReply, ChatError> {
        let turn = self.prepare_turn(character_id, text).await?;

        let answer = match &turn.intent {
            Intent::Selfie { subject } => self.answer_with_selfie(&turn, subject).await,
            Intent::VoiceMessage { .. } => self.answer_with_voice(&turn).await,
            Intent::VideoMessage { .. } | Intent::Text => self.answer_with_text(&turn).await,
        };

        self.finish_turn(turn, answer).await
    }

    /// Load the character, append the user message and build the prompt.
    /// Pair with [`CompanionChat::complete_turn`] when the reply is
    /// produced elsewhere (for example streamed).
    pub async fn prepare_turn(&self, character_id: &Uuid, text: &str) -> Result<Turn, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let character = self.characters.get(character_id).await.map_err(not_found)?;
        let personality = self.characters.personality_of(&character).await?;
        let state = self.characters.state(character_id).await.map_err(not_found)?;

        let conversation = self.conversations.active_or_start(character_id).await?;
        let history = conversation.messages.clone();
        let conversation = self
            .conversations
            .add_message(&conversation.id, MessageRole::User, text, None)
            .await?;

        let intent = parse_intent(text);
        let memory_context = match self.memory.build_context(character_id, text).await {
            Ok(context) => context,
            Err(e) => {
                tracing::warn!(character = %character.name, error = %e, "memory context unavailable");
                String::new()
            }
        };

        let prompt = CharacterPrompt {
            name: character.name.clone(),
            system_prompt: Some(system_prompt(&character, personality.as_ref(), &state)),
            memory_context,
            mood: state.mood,
        };

        tracing::debug!(character = %character.name, intent = ?intent, "chat turn prepared");
        Ok(Turn {
            character,
            state,
            conversation,
            history,
            user_message: text.to_string(),
            intent,
            prompt,
        })
    }

    /// The LLM request for a prepared turn.
    pub async fn request_for(&self, turn: &Turn) -> CompletionRequest {
        self.llm
            .character_request(&turn.prompt, &turn.user_message, &turn.history, None)
            .await
    }

    /// Record a reply produced outside [`CompanionChat::send_message`].
    pub async fn complete_turn(
        &self,
        turn: Turn,
        content: String,
        fallback: bool,
    ) -> Result<ChatReply, ChatError> {
        let answer = Answer {
            content,
            kind: "text",
            media_path: None,
            fallback,
        };
        self.finish_turn(turn, answer).await
    }

    async fn answer_with_text(&self, turn: &Turn) -> Answer {
        let reply = self
            .llm
            .generate_character_response(&turn.prompt, &turn.user_message, &turn.history, None)
            .await;
        Answer {
            content: reply.content,
            kind: "text",
            media_path: None,
            fallback: reply.fallback,
        }
    }

    async fn answer_with_selfie(&self, turn: &Turn, subject: &str) -> Answer {
        match self.media.selfie(&turn.character, &turn.state, Some(subject)).await {
            Ok(generated) => Answer {
                content: photo_caption(),
                kind: "photo",
                media_path: Some(generated.media.filepath),
                fallback: false,
            },
            Err(e) => {
                tracing::warn!(character = %turn.character.name, error = %e, "selfie failed, answering with text");
                self.answer_with_text(turn).await
            }
        }
    }

    async fn answer_with_voice(&self, turn: &Turn) -> Answer {
        let text = self.answer_with_text(turn).await;
        let emotion = turn.state.mood.to_string();
        match self
            .media
            .voice_message(&turn.character, &text.content, Some(&emotion))
            .await
        {
            Ok(generated) => Answer {
                kind: "voice",
                media_path: Some(generated.media.filepath),
                ..text
            },
            Err(e) => {
                tracing::warn!(character = %turn.character.name, error = %e, "voice note failed, answering with text");
                text
            }
        }
    }

    async fn finish_turn(&self, turn: Turn, answer: Answer) -> Result<ChatReply, ChatError> {
        let metadata = serde_json::json!({
            "intent": turn.intent,
            "kind": answer.kind,
            "media_path": answer.media_path,
            "fallback": answer.fallback,
        });
        let conversation = self
            .conversations
            .add_message(
                &turn.conversation.id,
                MessageRole::Assistant,
                &answer.content,
                Some(metadata),
            )
            .await?;

        let character_id = turn.character.id;
        self.characters.touch_interaction(&character_id).await?;
        self.characters
            .adjust_relationship(&character_id, RELATIONSHIP_STEP)
            .await?;

        self.events.publish(CompanionEvent::MessageReceived {
            character_id,
            character_name: turn.character.name.clone(),
            content: answer.content.clone(),
            kind: answer.kind.to_string(),
            media_path: answer.media_path.clone(),
            autonomous: false,
        });

        tracing::info!(
            character = %turn.character.name,
            kind = answer.kind,
            fallback = answer.fallback,
            "chat reply sent"
        );
        Ok(ChatReply {
            conversation_id: conversation.id,
            character_id,
            content: answer.content,
            intent: turn.intent,
            media_path: answer.media_path,
            fallback: answer.fallback,
        })
    }
}

fn photo_caption() -> String {
    PHOTO_CAPTIONS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(PHOTO_CAPTIONS[0])
        .to_string()
}

fn not_found(e: CharacterError) -> ChatError {
    match e {
        CharacterError::NotFound => ChatError::CharacterNotFound,
        other => ChatError::Character(other),
    }
}
