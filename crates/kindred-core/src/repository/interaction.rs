//! Interaction log and media repositories.

use kindred_types::error::RepositoryError;
use kindred_types::interaction::{Interaction, InteractionKind, Media, MediaKind};
use uuid::Uuid;

pub trait InteractionRepository: Send + Sync {
    fn create(
        &self,
        interaction: &Interaction,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Interaction>, RepositoryError>> + Send;

    /// Replace the metadata blob of one interaction.
    fn update_metadata(
        &self,
        id: &Uuid,
        metadata: &serde_json::Value,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Every interaction sharing `chain_id`, oldest first.
    fn chain(
        &self,
        chain_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Interaction>, RepositoryError>> + Send;

    /// Interactions, newest first. `None` spans every character.
    fn list(
        &self,
        character_id: Option<&Uuid>,
        kind: Option<InteractionKind>,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<Interaction>, RepositoryError>> + Send;

    fn count(&self) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}

pub trait MediaRepository: Send + Sync {
    fn create(
        &self,
        media: &Media,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Media>, RepositoryError>> + Send;

    /// Media of a character, newest first.
    fn list(
        &self,
        character_id: &Uuid,
        kind: Option<MediaKind>,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<Media>, RepositoryError>> + Send;

    fn count(&self) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
