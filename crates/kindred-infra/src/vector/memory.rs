//! LanceDB-backed vector memory store.
//!
//! Implements `VectorMemoryStore` from `kindred-core`. Each character gets
//! an isolated table (`character_memory_{id}`) of 384-dimensional
//! BGESmallENV15 embeddings searched by cosine distance.

use std::sync::Arc;

use arrow_array::{
    FixedSizeListArray, Float32Array, Float64Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field};
use futures_util::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use uuid::Uuid;

use kindred_core::memory::vector::{VectorHit, VectorMemoryStore};
use kindred_types::error::RepositoryError;
use kindred_types::memory::Memory;

use super::lance::LanceVectorStore;
use super::schema::{EMBEDDING_DIMENSION, character_memory_schema};

pub struct LanceVectorMemoryStore {
    store: LanceVectorStore,
}

impl LanceVectorMemoryStore {
    pub fn new(store: LanceVectorStore) -> Self {
        Self { store }
    }

    async fn ensure_character_table(&self, character_id: &Uuid) -> Result<lancedb::Table, RepositoryError> {
        let table_name = LanceVectorStore::character_table_name(character_id);
        self.store
            .ensure_table(&table_name, Arc::new(character_memory_schema()))
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to ensure memory table: {e}")))
    }

    fn build_record_batch(memory: &Memory, embedding: &[f32]) -> Result<RecordBatch, RepositoryError> {
        if embedding.len() != EMBEDDING_DIMENSION as usize {
            return Err(RepositoryError::Query(format!(
                "embedding has {} dimensions, expected {EMBEDDING_DIMENSION}",
                embedding.len()
            )));
        }

        let values = Float32Array::from(embedding.to_vec());
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array = FixedSizeListArray::new(field, EMBEDDING_DIMENSION, Arc::new(values), None);

        RecordBatch::try_new(
            Arc::new(character_memory_schema()),
            vec![
                Arc::new(StringArray::from(vec![memory.id.to_string()])),
                Arc::new(StringArray::from(vec![memory.character_id.to_string()])),
                Arc::new(StringArray::from(vec![memory.content.clone()])),
                Arc::new(StringArray::from(vec![memory.kind.to_string()])),
                Arc::new(Float64Array::from(vec![memory.importance])),
                Arc::new(StringArray::from(vec![memory.created_at.to_rfc3339()])),
                Arc::new(vector_array),
            ],
        )
        .map_err(|e| RepositoryError::Query(format!("Failed to build record batch: {e}")))
    }

    /// Pull `(id, _distance)` pairs out of search result batches.
    fn hits_from_batches(batches: &[RecordBatch]) -> Vec<VectorHit> {
        let mut hits = Vec::new();
        for batch in batches {
            let ids = batch
                .column_by_name("id")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>());
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>());
            let (Some(ids), Some(distances)) = (ids, distances) else {
                continue;
            };

            for i in 0..batch.num_rows() {
                match Uuid::parse_str(ids.value(i)) {
                    Ok(memory_id) => hits.push(VectorHit {
                        memory_id,
                        distance: distances.value(i),
                    }),
                    Err(e) => tracing::warn!(id = ids.value(i), error = %e, "skipping vector row with bad id"),
                }
            }
        }
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }
}

impl VectorMemoryStore for LanceVectorMemoryStore {
    async fn add(&self, memory: &Memory, embedding: &[f32]) -> Result<(), RepositoryError> {
        let table = self.ensure_character_table(&memory.character_id).await?;
        let batch = Self::build_record_batch(memory, embedding)?;
        let schema = batch.schema();

        table
            .add(RecordBatchIterator::new(vec![Ok(batch)], schema))
            .execute()
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to add memory vector: {e}")))?;
        Ok(())
    }

    async fn search(
        &self,
        character_id: &Uuid,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<VectorHit>, RepositoryError> {
        let table_name = LanceVectorStore::character_table_name(character_id);
        let Some(table) = self.store.open_table(&table_name).await else {
            return Ok(Vec::new());
        };

        let results = table
            .vector_search(query_embedding)
            .map_err(|e| RepositoryError::Query(format!("Vector search setup failed: {e}")))?
            .distance_type(lancedb::DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| RepositoryError::Query(format!("Vector search failed: {e}")))?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to collect results: {e}")))?;

        let mut hits = Self::hits_from_batches(&batches);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete(&self, character_id: &Uuid, memory_id: &Uuid) -> Result<(), RepositoryError> {
        let table_name = LanceVectorStore::character_table_name(character_id);
        let Some(table) = self.store.open_table(&table_name).await else {
            return Ok(());
        };

        table
            .delete(&format!("id = '{memory_id}'"))
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to delete memory vector: {e}")))?;
        Ok(())
    }

    async fn delete_all(&self, character_id: &Uuid) -> Result<u64, RepositoryError> {
        let count = self.count(character_id).await?;
        self.store
            .drop_table(&LanceVectorStore::character_table_name(character_id))
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to drop memory table: {e}")))?;
        Ok(count)
    }

    async fn count(&self, character_id: &Uuid) -> Result<u64, RepositoryError> {
        let table_name = LanceVectorStore::character_table_name(character_id);
        let Some(table) = self.store.open_table(&table_name).await else {
            return Ok(0);
        };

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to count rows: {e}")))?;
        Ok(count as u64)
    }

    async fn reset(&self) -> Result<(), RepositoryError> {
        let tables = self
            .store
            .character_tables()
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to list tables: {e}")))?;

        for name in &tables {
            self.store
                .drop_table(name)
                .await
                .map_err(|e| RepositoryError::Query(format!("Failed to drop {name}: {e}")))?;
        }
        tracing::info!(tables = tables.len(), "vector memory reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use kindred_types::memory::MemoryKind;

    fn make_memory(character_id: Uuid, content: &str) -> Memory {
        Memory {
            id: Uuid::now_v7(),
            character_id,
            content: content.to_string(),
            kind: MemoryKind::Fact,
            importance: 0.5,
            emotion: None,
            metadata: serde_json::json!({}),
            access_count: 0,
            created_at: Utc::now(),
        }
    }

    /// Deterministic unit vector; nearby seeds give nearby vectors.
    fn make_embedding(seed: f32) -> Vec<f32> {
        let mut vec: Vec<f32> = (0..EMBEDDING_DIMENSION as usize)
            .map(|i| ((i as f32 + seed) * 0.01).sin())
            .collect();
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        for val in vec.iter_mut() {
            *val /= norm;
        }
        vec
    }

    async fn setup_store() -> (LanceVectorMemoryStore, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let lance = LanceVectorStore::new(temp_dir.path().to_path_buf()).await.unwrap();
        (LanceVectorMemoryStore::new(lance), temp_dir)
    }

    #[tokio::test]
    async fn test_add_search_closest_first() {
        let (store, _tmp) = setup_store().await;
        let character_id = Uuid::now_v7();

        let mut ids = Vec::new();
        for i in 0..4 {
            let m = make_memory(character_id, &format!("fact {i}"));
            store.add(&m, &make_embedding(i as f32 * 50.0)).await.unwrap();
            ids.push(m.id);
        }
        assert_eq!(store.count(&character_id).await.unwrap(), 4);

        let hits = store.search(&character_id, &make_embedding(0.0), 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].memory_id, ids[0]);
        assert!(hits[0].distance < 0.01);
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[tokio::test]
    async fn test_search_unknown_character_is_empty() {
        let (store, _tmp) = setup_store().await;
        let hits = store.search(&Uuid::now_v7(), &make_embedding(1.0), 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_dimension_rejected() {
        let (store, _tmp) = setup_store().await;
        let m = make_memory(Uuid::now_v7(), "short");
        assert!(store.add(&m, &[0.1, 0.2]).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_and_reset() {
        let (store, _tmp) = setup_store().await;
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();

        let keep = make_memory(a, "keep");
        let drop = make_memory(a, "drop");
        store.add(&keep, &make_embedding(1.0)).await.unwrap();
        store.add(&drop, &make_embedding(2.0)).await.unwrap();
        store.add(&make_memory(b, "other"), &make_embedding(3.0)).await.unwrap();

        store.delete(&a, &drop.id).await.unwrap();
        assert_eq!(store.count(&a).await.unwrap(), 1);

        assert_eq!(store.delete_all(&a).await.unwrap(), 1);
        assert_eq!(store.count(&a).await.unwrap(), 0);

        store.reset().await.unwrap();
        assert_eq!(store.count(&b).await.unwrap(), 0);
    }
}
