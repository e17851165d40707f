//! BoxVectorMemoryStore -- object-safe dynamic dispatch wrapper for
//! VectorMemoryStore, following the same blanket-impl pattern as
//! `BoxEmbedder`.

use std::future::Future;
use std::pin::Pin;

use kindred_types::error::RepositoryError;
use kindred_types::memory::Memory;
use uuid::Uuid;

use super::vector::{VectorHit, VectorMemoryStore};

type BoxFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, RepositoryError>> + Send + 'a>>;

/// Object-safe version of [`VectorMemoryStore`] with boxed futures.
pub trait VectorMemoryStoreDyn: Send + Sync {
    fn add_boxed<'a>(&'a self, memory: &'a Memory, embedding: &'a [f32]) -> BoxFut<'a, ()>;

    fn search_boxed<'a>(
        &'a self,
        character_id: &'a Uuid,
        query_embedding: &'a [f32],
        limit: usize,
    ) -> BoxFut<'a, Vec<VectorHit>>;

    fn delete_boxed<'a>(&'a self, character_id: &'a Uuid, memory_id: &'a Uuid) -> BoxFut<'a, ()>;

    fn delete_all_boxed<'a>(&'a self, character_id: &'a Uuid) -> BoxFut<'a, u64>;

    fn count_boxed<'a>(&'a self, character_id: &'a Uuid) -> BoxFut<'a, u64>;

    fn reset_boxed(&self) -> BoxFut<'_, ()>;
}

impl<T: VectorMemoryStore> VectorMemoryStoreDyn for T {
    fn add_boxed<'a>(&'a self, memory: &'a Memory, embedding: &'a [f32]) -> BoxFut<'a, ()> {
        Box::pin(self.add(memory, embedding))
    }

    fn search_boxed<'a>(
        &'a self,
        character_id: &'a Uuid,
        query_embedding: &'a [f32],
        limit: usize,
    ) -> BoxFut<'a, Vec<VectorHit>> {
        Box::pin(self.search(character_id, query_embedding, limit))
    }

    fn delete_boxed<'a>(&'a self, character_id: &'a Uuid, memory_id: &'a Uuid) -> BoxFut<'a, ()> {
        Box::pin(self.delete(character_id, memory_id))
    }

    fn delete_all_boxed<'a>(&'a self, character_id: &'a Uuid) -> BoxFut<'a, u64> {
        Box::pin(self.delete_all(character_id))
    }

    fn count_boxed<'a>(&'a self, character_id: &'a Uuid) -> BoxFut<'a, u64> {
        Box::pin(self.count(character_id))
    }

    fn reset_boxed(&self) -> BoxFut<'_, ()> {
        Box::pin(self.reset())
    }
}

/// Type-erased vector memory store.
pub struct BoxVectorMemoryStore {
    inner: Box<dyn VectorMemoryStoreDyn + Send + Sync>,
}

impl BoxVectorMemoryStore {
    pub fn new<T: VectorMemoryStore + 'static>(store: T) -> Self {
        Self {
            inner: Box::new(store),
        }
    }

    pub async fn add(&self, memory: &Memory, embedding: &[f32]) -> Result<(), RepositoryError> {
        self.inner.add_boxed(memory, embedding).await
    }

    pub async fn search(
        &self,
        character_id: &Uuid,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<VectorHit>, RepositoryError> {
        self.inner
            .search_boxed(character_id, query_embedding, limit)
            .await
    }

    pub async fn delete(&self, character_id: &Uuid, memory_id: &Uuid) -> Result<(), RepositoryError> {
        self.inner.delete_boxed(character_id, memory_id).await
    }

    pub async fn delete_all(&self, character_id: &Uuid) -> Result<u64, RepositoryError> {
        self.inner.delete_all_boxed(character_id).await
    }

    pub async fn count(&self, character_id: &Uuid) -> Result<u64, RepositoryError> {
        self.inner.count_boxed(character_id).await
    }

    pub async fn reset(&self) -> Result<(), RepositoryError> {
        self.inner.reset_boxed().await
    }
}
