//! Vector memory store trait.
//!
//! Defines the interface for semantic vector search over character memories.
//! The LanceDB implementation lives in kindred-infra. The store only keeps
//! ids, vectors and a copy of the text; the relational row is authoritative.

use kindred_types::error::RepositoryError;
use kindred_types::memory::Memory;
use uuid::Uuid;

/// One nearest-neighbour result.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub memory_id: Uuid,
    /// Cosine distance (0 = identical, 2 = opposite).
    pub distance: f32,
}

/// Trait for vector-indexed memory storage with semantic search.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait VectorMemoryStore: Send + Sync {
    /// Add a memory with its embedding vector.
    fn add(
        &self,
        memory: &Memory,
        embedding: &[f32],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Nearest memories of one character, closest first.
    fn search(
        &self,
        character_id: &Uuid,
        query_embedding: &[f32],
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<VectorHit>, RepositoryError>> + Send;

    fn delete(
        &self,
        character_id: &Uuid,
        memory_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete all vectors of a character. Returns the count removed.
    fn delete_all(
        &self,
        character_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    fn count(
        &self,
        character_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Drop every character table.
    fn reset(&self) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
