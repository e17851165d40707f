//! Character repository trait definition.

use chrono::{DateTime, Utc};
use kindred_types::character::{Character, CharacterState, StateChange};
use kindred_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for characters and their state rows.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait CharacterRepository: Send + Sync {
    /// Insert a character together with its initial state row.
    fn create(
        &self,
        character: &Character,
        state: &CharacterState,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Character>, RepositoryError>> + Send;

    /// Case-sensitive lookup of the first character with this name.
    fn get_by_name(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<Character>, RepositoryError>> + Send;

    /// All characters, newest first.
    fn list(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Character>, RepositoryError>> + Send;

    /// Overwrite identity columns, tags and metadata.
    fn update(
        &self,
        character: &Character,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a character. Dependent rows go with it (foreign-key cascade).
    fn delete(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_state(
        &self,
        character_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<CharacterState>, RepositoryError>> + Send;

    /// Apply `change` to the state row in one statement and return the
    /// row as written. `None` when the character has no state row.
    fn apply_state_change(
        &self,
        character_id: &Uuid,
        change: &StateChange,
        updated_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Option<CharacterState>, RepositoryError>> + Send;

    fn count(&self) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
