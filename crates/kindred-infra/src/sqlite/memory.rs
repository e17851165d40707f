//! SQLite memory repository: the relational half of character memory.

use kindred_core::repository::memory::MemoryRepository;
use kindred_types::error::RepositoryError;
use kindred_types::memory::{Memory, MemoryKind};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{db_error, format_datetime, parse_datetime, parse_json, parse_uuid, to_json};

pub struct SqliteMemoryRepository {
    pool: DatabasePool,
}

impl SqliteMemoryRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn memory_from_row(row: &SqliteRow) -> Result<Memory, RepositoryError> {
    let get = |e: sqlx::Error| RepositoryError::Query(e.to_string());
    let id: String = row.try_get("id").map_err(get)?;
    let character_id: String = row.try_get("character_id").map_err(get)?;
    let kind: String = row.try_get("kind").map_err(get)?;
    let metadata: String = row.try_get("metadata").map_err(get)?;
    let access_count: i64 = row.try_get("access_count").map_err(get)?;
    let created_at: String = row.try_get("created_at").map_err(get)?;

    Ok(Memory {
        id: parse_uuid(&id, "memory id")?,
        character_id: parse_uuid(&character_id, "character id")?,
        content: row.try_get("content").map_err(get)?,
        kind: kind.parse().unwrap_or_default(),
        importance: row.try_get("importance").map_err(get)?,
        emotion: row.try_get("emotion").map_err(get)?,
        metadata: parse_json(&metadata, "memory metadata")?,
        access_count: access_count.max(0) as u32,
        created_at: parse_datetime(&created_at)?,
    })
}

impl MemoryRepository for SqliteMemoryRepository {
    async fn create(&self, memory: &Memory) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO memories (id, character_id, content, kind, importance, emotion, metadata, access_count, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(memory.id.to_string())
        .bind(memory.character_id.to_string())
        .bind(&memory.content)
        .bind(memory.kind.to_string())
        .bind(memory.importance)
        .bind(&memory.emotion)
        .bind(to_json(&memory.metadata)?)
        .bind(memory.access_count as i64)
        .bind(format_datetime(&memory.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Memory>, RepositoryError> {
        sqlx::query("SELECT * FROM memories WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(db_error)?
            .as_ref()
            .map(memory_from_row)
            .transpose()
    }

    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Memory>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT * FROM memories WHERE id IN ({placeholders})");
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id.to_string());
        }
        query
            .fetch_all(&self.pool.reader)
            .await
            .map_err(db_error)?
            .iter()
            .map(memory_from_row)
            .collect()
    }

    async fn reinforce(&self, id: &Uuid, importance: f64) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE memories SET access_count = access_count + 1, importance = MAX(importance, ?)
             WHERE id = ?",
        )
        .bind(importance)
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn recent(
        &self,
        character_id: &Uuid,
        limit: u32,
        kind: Option<MemoryKind>,
    ) -> Result<Vec<Memory>, RepositoryError> {
        let rows = match kind {
            Some(kind) => {
                sqlx::query(
                    "SELECT * FROM memories WHERE character_id = ? AND kind = ?
                     ORDER BY created_at DESC LIMIT ?",
                )
                .bind(character_id.to_string())
                .bind(kind.to_string())
                .bind(limit as i64)
                .fetch_all(&self.pool.reader)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT * FROM memories WHERE character_id = ? ORDER BY created_at DESC LIMIT ?",
                )
                .bind(character_id.to_string())
                .bind(limit as i64)
                .fetch_all(&self.pool.reader)
                .await
            }
        }
        .map_err(db_error)?;

        rows.iter().map(memory_from_row).collect()
    }

    async fn important(
        &self,
        character_id: &Uuid,
        limit: u32,
        min_importance: f64,
    ) -> Result<Vec<Memory>, RepositoryError> {
        sqlx::query(
            "SELECT * FROM memories WHERE character_id = ? AND importance >= ?
             ORDER BY importance DESC, created_at DESC LIMIT ?",
        )
        .bind(character_id.to_string())
        .bind(min_importance)
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(db_error)?
        .iter()
        .map(memory_from_row)
        .collect()
    }

    async fn delete(&self, id: &Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM memories WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_for_character(&self, character_id: &Uuid) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM memories WHERE character_id = ?")
            .bind(character_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected())
    }

    async fn count(&self, character_id: Option<&Uuid>) -> Result<u64, RepositoryError> {
        let (count,): (i64,) = match character_id {
            Some(id) => {
                sqlx::query_as("SELECT COUNT(*) FROM memories WHERE character_id = ?")
                    .bind(id.to_string())
                    .fetch_one(&self.pool.reader)
                    .await
            }
            None => {
                sqlx::query_as("SELECT COUNT(*) FROM memories")
                    .fetch_one(&self.pool.reader)
                    .await
            }
        }
        .map_err(db_error)?;
        Ok(count as u64)
    }

    async fn reset(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM memories")
            .execute(&self.pool.writer)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected())
    }
}
