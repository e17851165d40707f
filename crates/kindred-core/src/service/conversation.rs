//! Conversation service.
//!
//! A conversation collects the messages exchanged with one character. Every
//! appended message is also written to the interaction log under the
//! conversation's chain id, and user messages (or any message flagged
//! important) become memories.

use std::sync::Arc;

use chrono::Utc;
use kindred_types::conversation::{ChatMessage, Conversation, StartConversationRequest};
use kindred_types::error::{ConversationError, RepositoryError};
use kindred_types::interaction::{Interaction, InteractionKind};
use kindred_types::llm::MessageRole;
use kindred_types::memory::{MemoryKind, NewMemory};
use uuid::Uuid;

use crate::memory::service::MemoryService;
use crate::repository::Backend;
use crate::repository::catalog::RoleRepository;
use crate::repository::character::CharacterRepository;
use crate::repository::conversation::ConversationRepository;
use crate::repository::interaction::InteractionRepository;

pub const DEFAULT_HISTORY_LIMIT: u32 = 10;

pub struct ConversationService<B: Backend> {
    backend: Arc<B>,
    memory: Arc<MemoryService<B>>,
}

impl<B: Backend> ConversationService<B> {
    pub fn new(backend: Arc<B>, memory: Arc<MemoryService<B>>) -> Self {
        Self { backend, memory }
    }

    pub async fn start(
        &self,
        character_id: &Uuid,
        request: StartConversationRequest,
    ) -> Result<Conversation, ConversationError> {
        self.backend
            .characters()
            .get(character_id)
            .await
            .map_err(|e| ConversationError::StorageError(e.to_string()))?
            .ok_or(ConversationError::CharacterNotFound)?;

        if let Some(role_id) = &request.role_id {
            self.backend
                .roles()
                .get(role_id)
                .await
                .map_err(|e| ConversationError::StorageError(e.to_string()))?
                .ok_or(ConversationError::RoleNotFound)?;
        }

        let conversation = Conversation {
            id: Uuid::now_v7(),
            character_id: *character_id,
            role_id: request.role_id,
            chain_id: request.chain_id.unwrap_or_else(Uuid::new_v4),
            messages: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
            metadata: serde_json::json!({}),
        };

        self.backend
            .conversations()
            .create(&conversation)
            .await
            .map_err(|e| ConversationError::StorageError(e.to_string()))?;

        tracing::debug!(conversation_id = %conversation.id, character_id = %character_id, chain_id = %conversation.chain_id, "conversation started");
        Ok(conversation)
    }

    pub async fn get(&self, id: &Uuid) -> Result<Conversation, ConversationError> {
        self.backend
            .conversations()
            .get(id)
            .await
            .map_err(|e| ConversationError::StorageError(e.to_string()))?
            .ok_or(ConversationError::NotFound)
    }

    /// Append a message, log it, and remember it when it matters.
    pub async fn add_message(
        &self,
        conversation_id: &Uuid,
        role: MessageRole,
        content: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<Conversation, ConversationError> {
        if content.trim().is_empty() {
            return Err(ConversationError::EmptyMessage);
        }
        let mut message = ChatMessage::new(role, content);
        message.metadata = metadata.clone();
        let remember = role == MessageRole::User || message.is_flagged_important();
        let importance = message.importance();

        let conversation = self
            .backend
            .conversations()
            .append_message(conversation_id, &message)
            .await
            .map_err(conversation_error)?;

        let mut log_meta = serde_json::json!({ "role": role.to_string() });
        if let (Some(obj), Some(serde_json::Value::Object(extra))) = (log_meta.as_object_mut(), metadata) {
            obj.extend(extra);
        }
        let interaction = Interaction::new(
            InteractionKind::Message,
            conversation.character_id,
            content,
            log_meta,
            Some(conversation.chain_id),
        );
        self.backend
            .interactions()
            .create(&interaction)
            .await
            .map_err(|e| ConversationError::StorageError(e.to_string()))?;

        if remember {
            let new = NewMemory::new(format!("{role}: {content}"), MemoryKind::Conversation, importance);
            if let Err(e) = self.memory.add(&conversation.character_id, new).await {
                tracing::warn!(conversation_id = %conversation.id, error = %e, "failed to remember message");
            }
        }

        Ok(conversation)
    }

    pub async fn end(&self, id: &Uuid) -> Result<Conversation, ConversationError> {
        let conversation = self
            .backend
            .conversations()
            .end(id, Utc::now())
            .await
            .map_err(conversation_error)?;
        tracing::debug!(conversation_id = %id, messages = conversation.messages.len(), "conversation ended");
        Ok(conversation)
    }

    /// Most recent conversations first.
    pub async fn history(
        &self,
        character_id: &Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<Conversation>, ConversationError> {
        self.backend
            .conversations()
            .list_for_character(character_id, limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
            .await
            .map_err(|e| ConversationError::StorageError(e.to_string()))
    }

    pub async fn active_for(&self, character_id: &Uuid) -> Result<Option<Conversation>, ConversationError> {
        self.backend
            .conversations()
            .latest_open(character_id)
            .await
            .map_err(|e| ConversationError::StorageError(e.to_string()))
    }

    /// The open conversation for a character, starting one if needed.
    pub async fn active_or_start(&self, character_id: &Uuid) -> Result<Conversation, ConversationError> {
        match self.active_for(character_id).await? {
            Some(conversation) => Ok(conversation),
            None => self.start(character_id, StartConversationRequest::default()).await,
        }
    }

    pub async fn count(&self) -> Result<u64, ConversationError> {
        self.backend
            .conversations()
            .count()
            .await
            .map_err(|e| ConversationError::StorageError(e.to_string()))
    }
}

fn conversation_error(e: RepositoryError) -> ConversationError {
    match e {
        RepositoryError::NotFound => ConversationError::NotFound,
        RepositoryError::Conflict(_) => ConversationError::AlreadyEnded,
        other => ConversationError::StorageError(other.to_string()),
    }
}
