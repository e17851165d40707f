//! Memory row repository.
//!
//! The relational half of character memory. Embeddings live in the
//! vector store (see [`crate::memory::vector`]) keyed by the same id.

use kindred_types::error::RepositoryError;
use kindred_types::memory::{Memory, MemoryKind};
use uuid::Uuid;

pub trait MemoryRepository: Send + Sync {
    fn create(
        &self,
        memory: &Memory,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Memory>, RepositoryError>> + Send;

    /// Fetch several memories; missing ids are skipped. Order is unspecified.
    fn get_many(
        &self,
        ids: &[Uuid],
    ) -> impl std::future::Future<Output = Result<Vec<Memory>, RepositoryError>> + Send;

    /// Bump `access_count` and raise `importance` to at least `importance`.
    fn reinforce(
        &self,
        id: &Uuid,
        importance: f64,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Newest first.
    fn recent(
        &self,
        character_id: &Uuid,
        limit: u32,
        kind: Option<MemoryKind>,
    ) -> impl std::future::Future<Output = Result<Vec<Memory>, RepositoryError>> + Send;

    /// Memories at or above `min_importance`, highest importance first.
    fn important(
        &self,
        character_id: &Uuid,
        limit: u32,
        min_importance: f64,
    ) -> impl std::future::Future<Output = Result<Vec<Memory>, RepositoryError>> + Send;

    fn delete(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete every memory of a character. Returns the number removed.
    fn delete_for_character(
        &self,
        character_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Count memories, optionally for one character.
    fn count(
        &self,
        character_id: Option<&Uuid>,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Remove all memories of all characters.
    fn reset(&self) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
