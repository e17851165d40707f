//! Memory service: store, reinforce, search and assemble prompt context.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use kindred_types::character::clamp_unit;
use kindred_types::error::{MemoryError, RepositoryError};
use kindred_types::event::CompanionEvent;
use kindred_types::memory::{
    ContextLimits, IMPORTANT_THRESHOLD, Memory, MemoryFilter, MemoryHit, MemoryKind, NewMemory,
};
use uuid::Uuid;

use super::box_embedder::BoxEmbedder;
use super::box_vector::BoxVectorMemoryStore;
use crate::event::EventBus;
use crate::repository::Backend;
use crate::repository::memory::MemoryRepository;

/// Cosine distance under which new content counts as a repeat of an
/// existing memory.
pub const DUPLICATE_DISTANCE: f32 = 0.15;

/// Initial over-fetch factor for filtered semantic search.
const FILTER_OVERFETCH: usize = 4;

pub struct MemoryService<B: Backend> {
    backend: Arc<B>,
    semantic: Option<Semantic>,
    events: EventBus,
    limits: ContextLimits,
}

struct Semantic {
    embedder: BoxEmbedder,
    store: BoxVectorMemoryStore,
}

impl<B: Backend> MemoryService<B> {
    /// SQL-only memory. Semantic search returns nothing until
    /// [`with_vectors`](Self::with_vectors) is applied.
    pub fn new(backend: Arc<B>, events: EventBus) -> Self {
        Self {
            backend,
            semantic: None,
            events,
            limits: ContextLimits::default(),
        }
    }

    pub fn with_vectors(mut self, embedder: BoxEmbedder, store: BoxVectorMemoryStore) -> Self {
        self.semantic = Some(Semantic { embedder, store });
        self
    }

    pub fn with_limits(mut self, limits: ContextLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn semantic_enabled(&self) -> bool {
        self.semantic.is_some()
    }

    pub fn embedding_model(&self) -> Option<&str> {
        self.semantic.as_ref().map(|s| s.embedder.model_name())
    }

    /// Store a memory, or reinforce a near-identical one.
    pub async fn add(&self, character_id: &Uuid, new: NewMemory) -> Result<Memory, MemoryError> {
        let content = new.content.trim().to_string();
        if content.is_empty() {
            return Err(MemoryError::EmptyContent);
        }
        let importance = clamp_unit(new.importance);

        let embedding = match &self.semantic {
            Some(sem) => match sem.embedder.embed_one(&content).await {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!(character_id = %character_id, error = %e, "embedding failed, storing without vector");
                    None
                }
            },
            None => None,
        };

        if let Some(embedding) = &embedding
            && let Some(existing) = self.find_duplicate(character_id, embedding).await
        {
            return self.reinforce(existing, importance).await;
        }

        let memory = Memory {
            id: Uuid::now_v7(),
            character_id: *character_id,
            content,
            kind: new.kind,
            importance,
            emotion: new.emotion,
            metadata: new.metadata.unwrap_or_else(|| serde_json::json!({})),
            access_count: 0,
            created_at: Utc::now(),
        };

        self.backend
            .memories()
            .create(&memory)
            .await
            .map_err(|e| MemoryError::StorageError(e.to_string()))?;

        if let (Some(sem), Some(embedding)) = (&self.semantic, &embedding)
            && let Err(e) = sem.store.add(&memory, embedding).await
        {
            tracing::warn!(memory_id = %memory.id, error = %e, "failed to index memory vector");
        }

        tracing::debug!(character_id = %character_id, memory_id = %memory.id, kind = %memory.kind, "memory stored");
        self.events.publish(CompanionEvent::MemoryStored {
            character_id: *character_id,
            memory_id: memory.id,
            reinforced: false,
        });
        Ok(memory)
    }

    /// Store several memories in order. An empty batch does nothing.
    pub async fn add_batch(
        &self,
        character_id: &Uuid,
        batch: Vec<NewMemory>,
    ) -> Result<Vec<Memory>, MemoryError> {
        let mut stored = Vec::with_capacity(batch.len());
        for new in batch {
            stored.push(self.add(character_id, new).await?);
        }
        Ok(stored)
    }

    async fn find_duplicate(&self, character_id: &Uuid, embedding: &[f32]) -> Option<Memory> {
        let sem = self.semantic.as_ref()?;
        let nearest = match sem.store.search(character_id, embedding, 1).await {
            Ok(hits) => hits.into_iter().next()?,
            Err(e) => {
                tracing::warn!(character_id = %character_id, error = %e, "duplicate check failed");
                return None;
            }
        };
        if nearest.distance >= DUPLICATE_DISTANCE {
            return None;
        }
        self.backend.memories().get(&nearest.memory_id).await.ok().flatten()
    }

    async fn reinforce(&self, mut existing: Memory, importance: f64) -> Result<Memory, MemoryError> {
        let importance = existing.importance.max(importance);
        self.backend
            .memories()
            .reinforce(&existing.id, importance)
            .await
            .map_err(|e| MemoryError::StorageError(e.to_string()))?;

        existing.importance = importance;
        existing.access_count += 1;
        tracing::debug!(memory_id = %existing.id, access_count = existing.access_count, "memory reinforced");
        self.events.publish(CompanionEvent::MemoryStored {
            character_id: existing.character_id,
            memory_id: existing.id,
            reinforced: true,
        });
        Ok(existing)
    }

    /// Semantic search. Returns an empty list when vectors are disabled.
    pub async fn query(
        &self,
        character_id: &Uuid,
        text: &str,
        n: usize,
        filter: &MemoryFilter,
    ) -> Result<Vec<MemoryHit>, MemoryError> {
        let Some(sem) = &self.semantic else {
            return Ok(Vec::new());
        };
        if n == 0 || text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let embedding = sem
            .embedder
            .embed_one(text)
            .await
            .map_err(|e| MemoryError::Embedding(e.to_string()))?;

        let indexed = sem
            .store
            .count(character_id)
            .await
            .map_err(|e| MemoryError::VectorStore(e.to_string()))?;
        let indexed = usize::try_from(indexed).unwrap_or(usize::MAX);
        if indexed == 0 {
            return Ok(Vec::new());
        }

        let filtered = filter.kind.is_some() || filter.min_importance.is_some();
        let wanted = if filtered { n.saturating_mul(FILTER_OVERFETCH) } else { n };
        let mut fetch = wanted.min(indexed);

        // The relational row is authoritative for kind and importance, so
        // filtering happens here. Widen the window until enough rows match
        // or the store runs out of neighbours.
        loop {
            let hits = sem
                .store
                .search(character_id, &embedding, fetch)
                .await
                .map_err(|e| MemoryError::VectorStore(e.to_string()))?;
            let exhausted = hits.len() < fetch || fetch >= indexed;

            let ids: Vec<Uuid> = hits.iter().map(|h| h.memory_id).collect();
            let mut rows: HashMap<Uuid, Memory> = self
                .backend
                .memories()
                .get_many(&ids)
                .await
                .map_err(|e| MemoryError::StorageError(e.to_string()))?
                .into_iter()
                .map(|m| (m.id, m))
                .collect();

            let matched: Vec<MemoryHit> = hits
                .into_iter()
                .filter_map(|hit| {
                    rows.remove(&hit.memory_id).map(|memory| MemoryHit {
                        memory,
                        distance: hit.distance,
                    })
                })
                .filter(|hit| filter.matches(&hit.memory))
                .take(n)
                .collect();

            if matched.len() >= n || exhausted {
                return Ok(matched);
            }
            tracing::trace!(character_id = %character_id, fetch, matched = matched.len(), "widening memory search");
            fetch = fetch.saturating_mul(2).min(indexed);
        }
    }

    pub async fn recent(
        &self,
        character_id: &Uuid,
        n: usize,
        kind: Option<MemoryKind>,
    ) -> Result<Vec<Memory>, MemoryError> {
        self.backend
            .memories()
            .recent(character_id, n as u32, kind)
            .await
            .map_err(|e| MemoryError::StorageError(e.to_string()))
    }

    pub async fn important(
        &self,
        character_id: &Uuid,
        n: usize,
        min_importance: Option<f64>,
    ) -> Result<Vec<Memory>, MemoryError> {
        self.backend
            .memories()
            .important(character_id, n as u32, min_importance.unwrap_or(IMPORTANT_THRESHOLD))
            .await
            .map_err(|e| MemoryError::StorageError(e.to_string()))
    }

    pub async fn get(&self, id: &Uuid) -> Result<Memory, MemoryError> {
        self.backend
            .memories()
            .get(id)
            .await
            .map_err(|e| MemoryError::StorageError(e.to_string()))?
            .ok_or(MemoryError::NotFound)
    }

    pub async fn delete(&self, id: &Uuid) -> Result<(), MemoryError> {
        let memory = self.get(id).await?;
        self.backend
            .memories()
            .delete(id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => MemoryError::NotFound,
                other => MemoryError::StorageError(other.to_string()),
            })?;

        if let Some(sem) = &self.semantic
            && let Err(e) = sem.store.delete(&memory.character_id, id).await
        {
            tracing::warn!(memory_id = %id, error = %e, "failed to delete memory vector");
        }
        Ok(())
    }

    /// Delete every memory of a character. Returns the number of rows removed.
    pub async fn delete_for_character(&self, character_id: &Uuid) -> Result<u64, MemoryError> {
        let removed = self
            .backend
            .memories()
            .delete_for_character(character_id)
            .await
            .map_err(|e| MemoryError::StorageError(e.to_string()))?;
        self.forget_vectors(character_id).await?;
        Ok(removed)
    }

    /// Drop only the vector side of a character's memories (the rows are
    /// removed by the character delete cascade).
    pub async fn forget_vectors(&self, character_id: &Uuid) -> Result<u64, MemoryError> {
        match &self.semantic {
            Some(sem) => sem
                .store
                .delete_all(character_id)
                .await
                .map_err(|e| MemoryError::VectorStore(e.to_string())),
            None => Ok(0),
        }
    }

    pub async fn count(&self, character_id: Option<&Uuid>) -> Result<u64, MemoryError> {
        self.backend
            .memories()
            .count(character_id)
            .await
            .map_err(|e| MemoryError::StorageError(e.to_string()))
    }

    /// Wipe all memories of all characters.
    pub async fn reset(&self) -> Result<u64, MemoryError> {
        let removed = self
            .backend
            .memories()
            .reset()
            .await
            .map_err(|e| MemoryError::StorageError(e.to_string()))?;
        if let Some(sem) = &self.semantic {
            sem.store
                .reset()
                .await
                .map_err(|e| MemoryError::VectorStore(e.to_string()))?;
        }
        tracing::warn!(removed, "memory store reset");
        Ok(removed)
    }

    /// Context block for a prompt using the configured limits.
    pub async fn build_context(&self, character_id: &Uuid, query: &str) -> Result<String, MemoryError> {
        self.build_context_with(character_id, query, self.limits).await
    }

    pub async fn build_context_with(
        &self,
        character_id: &Uuid,
        query: &str,
        limits: ContextLimits,
    ) -> Result<String, MemoryError> {
        let important = self.important(character_id, limits.n_important, None).await?;

        let relevant = match self
            .query(character_id, query, limits.n_semantic, &MemoryFilter::default())
            .await
        {
            Ok(hits) => hits.into_iter().map(|h| h.memory).collect(),
            Err(e) => {
                tracing::warn!(character_id = %character_id, error = %e, "semantic recall failed, using SQL memories only");
                Vec::new()
            }
        };

        let recent = self.recent(character_id, limits.n_recent, None).await?;

        Ok(format_context(&important, &relevant, &recent))
    }
}

/// Render the three memory sections, skipping empty ones.
pub fn format_context(important: &[Memory], relevant: &[Memory], recent: &[Memory]) -> String {
    [
        ("=== Important Memories ===", important),
        ("=== Relevant Memories ===", relevant),
        ("=== Recent Context ===", recent),
    ]
    .into_iter()
    .filter(|(_, memories)| !memories.is_empty())
    .map(|(header, memories)| {
        let lines: Vec<String> = memories.iter().map(|m| format!("- {}", m.content)).collect();
        format!("{header}\n{}", lines.join("\n"))
    })
    .collect::<Vec<_>>()
    .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(content: &str) -> Memory {
        Memory {
            id: Uuid::now_v7(),
            character_id: Uuid::nil(),
            content: content.to_string(),
            kind: MemoryKind::Fact,
            importance: 0.9,
            emotion: None,
            metadata: serde_json::json!({}),
            access_count: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_format_context_orders_sections() {
        let text = format_context(
            &[memory("likes tea")],
            &[memory("went hiking"), memory("has a cat")],
            &[memory("user: hi")],
        );
        assert_eq!(
            text,
            "=== Important Memories ===\n- likes tea\n\n\
             === Relevant Memories ===\n- went hiking\n- has a cat\n\n\
             === Recent Context ===\n- user: hi"
        );
    }

    #[test]
    fn test_format_context_skips_empty_sections() {
        let text = format_context(&[], &[], &[memory("user: hello")]);
        assert_eq!(text, "=== Recent Context ===\n- user: hello");
        assert_eq!(format_context(&[], &[], &[]), "");
    }
}
