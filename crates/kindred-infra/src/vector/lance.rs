//! LanceDB connection wrapper and table lifecycle helpers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_schema::Schema;
use uuid::Uuid;

const TABLE_PREFIX: &str = "character_memory_";

/// One LanceDB connection rooted at a directory (`<data_dir>/vectors`).
pub struct LanceVectorStore {
    db: lancedb::Connection,
    base_path: PathBuf,
}

impl LanceVectorStore {
    /// Open or create a LanceDB vector store at the given path.
    pub async fn new(base_path: PathBuf) -> Result<Self, lancedb::Error> {
        std::fs::create_dir_all(&base_path).map_err(|e| lancedb::Error::CreateDir {
            path: base_path.display().to_string(),
            source: e,
        })?;

        let uri = base_path.to_str().ok_or_else(|| lancedb::Error::InvalidInput {
            message: format!("Path contains invalid UTF-8: {}", base_path.display()),
        })?;

        let db = lancedb::connect(uri).execute().await?;
        tracing::debug!(path = %base_path.display(), "vector store opened");

        Ok(Self { db, base_path })
    }

    /// Open the table, creating it empty with `schema` when missing.
    pub async fn ensure_table(
        &self,
        table_name: &str,
        schema: Arc<Schema>,
    ) -> Result<lancedb::Table, lancedb::Error> {
        match self.db.open_table(table_name).execute().await {
            Ok(table) => Ok(table),
            Err(lancedb::Error::TableNotFound { .. }) => {
                self.db.create_empty_table(table_name, schema).execute().await
            }
            Err(e) => Err(e),
        }
    }

    pub async fn open_table(&self, table_name: &str) -> Option<lancedb::Table> {
        self.db.open_table(table_name).execute().await.ok()
    }

    /// Drop a table. Missing tables are not an error.
    pub async fn drop_table(&self, table_name: &str) -> Result<(), lancedb::Error> {
        match self.db.drop_table(table_name, &[]).await {
            Ok(()) | Err(lancedb::Error::TableNotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn table_names(&self) -> Result<Vec<String>, lancedb::Error> {
        self.db.table_names().execute().await
    }

    /// Names of every per-character memory table.
    pub async fn character_tables(&self) -> Result<Vec<String>, lancedb::Error> {
        Ok(self
            .table_names()
            .await?
            .into_iter()
            .filter(|name| name.starts_with(TABLE_PREFIX))
            .collect())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn character_table_name(character_id: &Uuid) -> String {
        format!("{TABLE_PREFIX}{}", character_id.simple())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::schema::character_memory_schema;

    async fn store() -> (LanceVectorStore, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LanceVectorStore::new(temp_dir.path().join("vectors")).await.unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_ensure_table_creates_and_reopens() {
        let (store, _tmp) = store().await;
        let schema = Arc::new(character_memory_schema());

        let table = store.ensure_table("t", schema.clone()).await.unwrap();
        assert_eq!(table.count_rows(None).await.unwrap(), 0);
        store.ensure_table("t", schema).await.unwrap();
        assert!(store.open_table("t").await.is_some());
    }

    #[tokio::test]
    async fn test_drop_table_idempotent() {
        let (store, _tmp) = store().await;
        store
            .ensure_table("gone", Arc::new(character_memory_schema()))
            .await
            .unwrap();

        store.drop_table("gone").await.unwrap();
        assert!(store.open_table("gone").await.is_none());
        store.drop_table("gone").await.unwrap();
    }

    #[tokio::test]
    async fn test_character_tables_filters_prefix() {
        let (store, _tmp) = store().await;
        let schema = Arc::new(character_memory_schema());
        let id = Uuid::now_v7();
        store
            .ensure_table(&LanceVectorStore::character_table_name(&id), schema.clone())
            .await
            .unwrap();
        store.ensure_table("scratch", schema).await.unwrap();

        let tables = store.character_tables().await.unwrap();
        assert_eq!(tables, vec![LanceVectorStore::character_table_name(&id)]);
    }

    #[test]
    fn test_table_name_generation() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(
            LanceVectorStore::character_table_name(&id),
            "character_memory_550e8400e29b41d4a716446655440000"
        );
    }
}
