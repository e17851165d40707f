//! Conversation repository trait definition.

use chrono::{DateTime, Utc};
use kindred_types::conversation::{ChatMessage, Conversation};
use kindred_types::error::RepositoryError;
use uuid::Uuid;

pub trait ConversationRepository: Send + Sync {
    fn create(
        &self,
        conversation: &Conversation,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Conversation>, RepositoryError>> + Send;

    /// Append one message to an open conversation and return the updated
    /// row. `Conflict` when the conversation has ended.
    fn append_message(
        &self,
        id: &Uuid,
        message: &ChatMessage,
    ) -> impl std::future::Future<Output = Result<Conversation, RepositoryError>> + Send;

    /// Close an open conversation. `Conflict` when it already ended.
    fn end(
        &self,
        id: &Uuid,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Conversation, RepositoryError>> + Send;

    /// Conversations of a character, most recently started first.
    fn list_for_character(
        &self,
        character_id: &Uuid,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<Conversation>, RepositoryError>> + Send;

    /// The most recently started conversation that has not ended.
    fn latest_open(
        &self,
        character_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Conversation>, RepositoryError>> + Send;

    fn count(&self) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
