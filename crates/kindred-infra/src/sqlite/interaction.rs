//! SQLite interaction log and media repositories.

use kindred_core::repository::interaction::{InteractionRepository, MediaRepository};
use kindred_types::error::RepositoryError;
use kindred_types::interaction::{Interaction, InteractionKind, Media, MediaKind};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{db_error, format_datetime, parse_datetime, parse_json, parse_uuid, to_json};

pub struct SqliteInteractionRepository {
    pool: DatabasePool,
}

impl SqliteInteractionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn interaction_from_row(row: &SqliteRow) -> Result<Interaction, RepositoryError> {
    let get = |e: sqlx::Error| RepositoryError::Query(e.to_string());
    let id: String = row.try_get("id").map_err(get)?;
    let kind: String = row.try_get("kind").map_err(get)?;
    let character_id: String = row.try_get("character_id").map_err(get)?;
    let metadata: String = row.try_get("metadata").map_err(get)?;
    let chain_id: Option<String> = row.try_get("chain_id").map_err(get)?;
    let created_at: String = row.try_get("created_at").map_err(get)?;

    Ok(Interaction {
        id: parse_uuid(&id, "interaction id")?,
        kind: kind.parse().map_err(RepositoryError::Query)?,
        character_id: parse_uuid(&character_id, "character id")?,
        content: row.try_get("content").map_err(get)?,
        metadata: parse_json(&metadata, "interaction metadata")?,
        chain_id: chain_id.as_deref().map(|c| parse_uuid(c, "chain id")).transpose()?,
        created_at: parse_datetime(&created_at)?,
    })
}

impl InteractionRepository for SqliteInteractionRepository {
    async fn create(&self, interaction: &Interaction) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO interactions (id, kind, character_id, content, metadata, chain_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(interaction.id.to_string())
        .bind(interaction.kind.to_string())
        .bind(interaction.character_id.to_string())
        .bind(&interaction.content)
        .bind(to_json(&interaction.metadata)?)
        .bind(interaction.chain_id.map(|id| id.to_string()))
        .bind(format_datetime(&interaction.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Interaction>, RepositoryError> {
        sqlx::query("SELECT * FROM interactions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(db_error)?
            .as_ref()
            .map(interaction_from_row)
            .transpose()
    }

    async fn update_metadata(&self, id: &Uuid, metadata: &serde_json::Value) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE interactions SET metadata = ? WHERE id = ?")
            .bind(to_json(metadata)?)
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn chain(&self, chain_id: &Uuid) -> Result<Vec<Interaction>, RepositoryError> {
        sqlx::query("SELECT * FROM interactions WHERE chain_id = ? ORDER BY created_at ASC, id ASC")
            .bind(chain_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(db_error)?
            .iter()
            .map(interaction_from_row)
            .collect()
    }

    async fn list(
        &self,
        character_id: Option<&Uuid>,
        kind: Option<InteractionKind>,
        limit: u32,
    ) -> Result<Vec<Interaction>, RepositoryError> {
        let mut sql = String::from("SELECT * FROM interactions");
        let mut conditions: Vec<&str> = Vec::new();
        if character_id.is_some() {
            conditions.push("character_id = ?");
        }
        if kind.is_some() {
            conditions.push("kind = ?");
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ?");

        let mut query = sqlx::query(&sql);
        if let Some(id) = character_id {
            query = query.bind(id.to_string());
        }
        if let Some(kind) = kind {
            query = query.bind(kind.to_string());
        }

        query
            .bind(limit as i64)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(db_error)?
            .iter()
            .map(interaction_from_row)
            .collect()
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM interactions")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(db_error)?;
        Ok(count as u64)
    }
}

pub struct SqliteMediaRepository {
    pool: DatabasePool,
}

impl SqliteMediaRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn media_from_row(row: &SqliteRow) -> Result<Media, RepositoryError> {
    let get = |e: sqlx::Error| RepositoryError::Query(e.to_string());
    let id: String = row.try_get("id").map_err(get)?;
    let character_id: String = row.try_get("character_id").map_err(get)?;
    let kind: String = row.try_get("kind").map_err(get)?;
    let metadata: String = row.try_get("metadata").map_err(get)?;
    let created_at: String = row.try_get("created_at").map_err(get)?;

    Ok(Media {
        id: parse_uuid(&id, "media id")?,
        character_id: parse_uuid(&character_id, "character id")?,
        kind: kind.parse().map_err(RepositoryError::Query)?,
        filepath: row.try_get("filepath").map_err(get)?,
        thumbnail: row.try_get("thumbnail").map_err(get)?,
        metadata: parse_json(&metadata, "media metadata")?,
        created_at: parse_datetime(&created_at)?,
    })
}

impl MediaRepository for SqliteMediaRepository {
    async fn create(&self, media: &Media) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO media (id, character_id, kind, filepath, thumbnail, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(media.id.to_string())
        .bind(media.character_id.to_string())
        .bind(media.kind.to_string())
        .bind(&media.filepath)
        .bind(&media.thumbnail)
        .bind(to_json(&media.metadata)?)
        .bind(format_datetime(&media.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Media>, RepositoryError> {
        sqlx::query("SELECT * FROM media WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(db_error)?
            .as_ref()
            .map(media_from_row)
            .transpose()
    }

    async fn list(
        &self,
        character_id: &Uuid,
        kind: Option<MediaKind>,
        limit: u32,
    ) -> Result<Vec<Media>, RepositoryError> {
        let rows = match kind {
            Some(kind) => {
                sqlx::query(
                    "SELECT * FROM media WHERE character_id = ? AND kind = ? ORDER BY created_at DESC LIMIT ?",
                )
                .bind(character_id.to_string())
                .bind(kind.to_string())
                .bind(limit as i64)
                .fetch_all(&self.pool.reader)
                .await
            }
            None => {
                sqlx::query("SELECT * FROM media WHERE character_id = ? ORDER BY created_at DESC LIMIT ?")
                    .bind(character_id.to_string())
                    .bind(limit as i64)
                    .fetch_all(&self.pool.reader)
                    .await
            }
        }
        .map_err(db_error)?;

        rows.iter().map(media_from_row).collect()
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM media")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(db_error)?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration, Utc};
    use kindred_core::repository::character::CharacterRepository;
    use kindred_types::character::{Character, CharacterProfile, CharacterState};

    use crate::sqlite::character::SqliteCharacterRepository;

    async fn setup() -> (DatabasePool, Uuid, Uuid, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::open(&dir.path().join("test.db")).await.unwrap();
        let characters = SqliteCharacterRepository::new(pool.clone());
        let mut ids = Vec::new();
        for name in ["Iris", "June"] {
            let now = Utc::now();
            let c = Character {
                id: Uuid::now_v7(),
                name: name.to_string(),
                age: None,
                sex: None,
                hair_color: None,
                eye_color: None,
                height: None,
                body_type: None,
                personality_id: None,
                tags: Vec::new(),
                profile: CharacterProfile::default(),
                created_at: now,
                updated_at: now,
            };
            characters.create(&c, &CharacterState::initial(c.id)).await.unwrap();
            ids.push(c.id);
        }
        (pool, ids[0], ids[1], dir)
    }

    fn interaction(kind: InteractionKind, character_id: Uuid, minutes_ago: i64) -> Interaction {
        let mut i = Interaction::new(kind, character_id, "content", serde_json::json!({}), None);
        i.created_at = Utc::now() - Duration::minutes(minutes_ago);
        i
    }

    #[tokio::test]
    async fn test_list_filters_compose() {
        let (pool, iris, june, _dir) = setup().await;
        let repo = SqliteInteractionRepository::new(pool);

        repo.create(&interaction(InteractionKind::Message, iris, 3)).await.unwrap();
        repo.create(&interaction(InteractionKind::VoiceCall, iris, 2)).await.unwrap();
        repo.create(&interaction(InteractionKind::VoiceCall, june, 1)).await.unwrap();

        assert_eq!(repo.list(Some(&iris), None, 10).await.unwrap().len(), 2);

        let calls = repo.list(None, Some(InteractionKind::VoiceCall), 10).await.unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].character_id, june, "newest first");

        assert_eq!(repo.list(None, None, 1).await.unwrap().len(), 1);
        assert_eq!(repo.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_chain_and_metadata_update() {
        let (pool, iris, _june, _dir) = setup().await;
        let repo = SqliteInteractionRepository::new(pool);

        let chain = Uuid::now_v7();
        let mut first = interaction(InteractionKind::Message, iris, 2);
        first.chain_id = Some(chain);
        let mut second = interaction(InteractionKind::Message, iris, 1);
        second.chain_id = Some(chain);
        repo.create(&second).await.unwrap();
        repo.create(&first).await.unwrap();

        let ids: Vec<Uuid> = repo.chain(&chain).await.unwrap().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);

        repo.update_metadata(&first.id, &serde_json::json!({"listened": true}))
            .await
            .unwrap();
        let loaded = repo.get(&first.id).await.unwrap().unwrap();
        assert_eq!(loaded.metadata["listened"], true);

        let err = repo
            .update_metadata(&Uuid::now_v7(), &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_media_list_by_kind() {
        let (pool, iris, _june, _dir) = setup().await;
        let repo = SqliteMediaRepository::new(pool);

        for (kind, path) in [(MediaKind::Image, "a.png"), (MediaKind::Voice, "b.wav")] {
            repo.create(&Media {
                id: Uuid::now_v7(),
                character_id: iris,
                kind,
                filepath: path.to_string(),
                thumbnail: None,
                metadata: serde_json::json!({"mood": "happy"}),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        }

        let images = repo.list(&iris, Some(MediaKind::Image), 10).await.unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].filepath, "a.png");
        assert_eq!(repo.list(&iris, None, 10).await.unwrap().len(), 2);
        assert_eq!(repo.count().await.unwrap(), 2);
    }
}
