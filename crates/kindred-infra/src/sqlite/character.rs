//! SQLite character repository implementation.
//!
//! A character and its state row are written in one transaction, so a
//! character never exists without state.

use chrono::{DateTime, Utc};
use kindred_core::repository::character::CharacterRepository;
use kindred_types::character::{Character, CharacterProfile, CharacterState, Mood, StateChange};
use kindred_types::error::RepositoryError;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{db_error, format_datetime, parse_datetime, parse_json, parse_uuid, to_json};

pub struct SqliteCharacterRepository {
    pool: DatabasePool,
}

impl SqliteCharacterRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain Character.
struct CharacterRow {
    id: String,
    name: String,
    age: Option<i64>,
    sex: Option<String>,
    hair_color: Option<String>,
    eye_color: Option<String>,
    height: Option<String>,
    body_type: Option<String>,
    personality_id: Option<String>,
    tags: String,
    metadata: String,
    created_at: String,
    updated_at: String,
}

impl CharacterRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            age: row.try_get("age")?,
            sex: row.try_get("sex")?,
            hair_color: row.try_get("hair_color")?,
            eye_color: row.try_get("eye_color")?,
            height: row.try_get("height")?,
            body_type: row.try_get("body_type")?,
            personality_id: row.try_get("personality_id")?,
            tags: row.try_get("tags")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_character(self) -> Result<Character, RepositoryError> {
        let profile: CharacterProfile = parse_json(&self.metadata, "character metadata")?;
        Ok(Character {
            id: parse_uuid(&self.id, "character id")?,
            name: self.name,
            age: self.age.map(|a| a.max(0) as u32),
            sex: self.sex,
            hair_color: self.hair_color,
            eye_color: self.eye_color,
            height: self.height,
            body_type: self.body_type,
            personality_id: self
                .personality_id
                .as_deref()
                .map(|id| parse_uuid(id, "personality id"))
                .transpose()?,
            tags: parse_json(&self.tags, "character tags")?,
            profile,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn state_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<CharacterState, RepositoryError> {
    let get = |e: sqlx::Error| RepositoryError::Query(e.to_string());
    let character_id: String = row.try_get("character_id").map_err(get)?;
    let mood: String = row.try_get("mood").map_err(get)?;
    let last_interaction: Option<String> = row.try_get("last_interaction").map_err(get)?;
    let metadata: String = row.try_get("metadata").map_err(get)?;
    let updated_at: String = row.try_get("updated_at").map_err(get)?;

    Ok(CharacterState {
        character_id: parse_uuid(&character_id, "character id")?,
        // Rows written by older builds may carry moods we no longer know.
        mood: mood.parse::<Mood>().unwrap_or_default(),
        energy: row.try_get("energy").map_err(get)?,
        relationship_level: row.try_get("relationship_level").map_err(get)?,
        affection: row.try_get("affection").map_err(get)?,
        last_interaction: last_interaction.as_deref().map(parse_datetime).transpose()?,
        metadata: parse_json(&metadata, "state metadata")?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

impl CharacterRepository for SqliteCharacterRepository {
    async fn create(&self, character: &Character, state: &CharacterState) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(db_error)?;

        sqlx::query(
            "INSERT INTO characters (id, name, age, sex, hair_color, eye_color, height, body_type, personality_id, tags, metadata, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(character.id.to_string())
        .bind(&character.name)
        .bind(character.age.map(i64::from))
        .bind(&character.sex)
        .bind(&character.hair_color)
        .bind(&character.eye_color)
        .bind(&character.height)
        .bind(&character.body_type)
        .bind(character.personality_id.map(|id| id.to_string()))
        .bind(to_json(&character.tags)?)
        .bind(to_json(&character.profile)?)
        .bind(format_datetime(&character.created_at))
        .bind(format_datetime(&character.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        sqlx::query(
            "INSERT INTO character_states (id, character_id, mood, energy, relationship_level, affection, last_interaction, metadata, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::now_v7().to_string())
        .bind(state.character_id.to_string())
        .bind(state.mood.to_string())
        .bind(state.energy)
        .bind(state.relationship_level)
        .bind(state.affection)
        .bind(state.last_interaction.as_ref().map(format_datetime))
        .bind(to_json(&state.metadata)?)
        .bind(format_datetime(&state.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Character>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM characters WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(db_error)?;

        row.map(|row| {
            CharacterRow::from_row(&row)
                .map_err(db_error)?
                .into_character()
        })
        .transpose()
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Character>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM characters WHERE name = ? ORDER BY created_at LIMIT 1")
            .bind(name)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(db_error)?;

        row.map(|row| {
            CharacterRow::from_row(&row)
                .map_err(db_error)?
                .into_character()
        })
        .transpose()
    }

    async fn list(&self) -> Result<Vec<Character>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM characters ORDER BY created_at DESC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(db_error)?;

        rows.iter()
            .map(|row| {
                CharacterRow::from_row(row)
                    .map_err(db_error)?
                    .into_character()
            })
            .collect()
    }

    async fn update(&self, character: &Character) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE characters SET name = ?, age = ?, sex = ?, hair_color = ?, eye_color = ?, height = ?, body_type = ?,
             personality_id = ?, tags = ?, metadata = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&character.name)
        .bind(character.age.map(i64::from))
        .bind(&character.sex)
        .bind(&character.hair_color)
        .bind(&character.eye_color)
        .bind(&character.height)
        .bind(&character.body_type)
        .bind(character.personality_id.map(|id| id.to_string()))
        .bind(to_json(&character.tags)?)
        .bind(to_json(&character.profile)?)
        .bind(format_datetime(&character.updated_at))
        .bind(character.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: &Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM characters WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn get_state(&self, character_id: &Uuid) -> Result<Option<CharacterState>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM character_states WHERE character_id = ?")
            .bind(character_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(db_error)?;

        row.as_ref().map(state_from_row).transpose()
    }

    async fn apply_state_change(
        &self,
        character_id: &Uuid,
        change: &StateChange,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<CharacterState>, RepositoryError> {
        let row = sqlx::query(
            "UPDATE character_states SET
                mood = COALESCE(?, mood),
                energy = MIN(1.0, MAX(0.0, COALESCE(?, energy) + ?)),
                relationship_level = MIN(1.0, MAX(0.0, COALESCE(?, relationship_level) + ?)),
                affection = MIN(1.0, MAX(0.0, COALESCE(?, affection) + ?)),
                last_interaction = COALESCE(?, last_interaction),
                updated_at = ?
             WHERE character_id = ?
             RETURNING *",
        )
        .bind(change.mood.map(|m| m.to_string()))
        .bind(change.energy)
        .bind(change.energy_delta)
        .bind(change.relationship_level)
        .bind(change.relationship_delta)
        .bind(change.affection)
        .bind(change.affection_delta)
        .bind(change.last_interaction.as_ref().map(format_datetime))
        .bind(format_datetime(&updated_at))
        .bind(character_id.to_string())
        .fetch_optional(&self.pool.writer)
        .await
        .map_err(db_error)?;

        row.as_ref().map(state_from_row).transpose()
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM characters")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(db_error)?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use kindred_types::interaction::{Interaction, InteractionKind};
    use kindred_core::repository::interaction::InteractionRepository;

    use crate::sqlite::interaction::SqliteInteractionRepository;

    async fn test_pool() -> (DatabasePool, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::open(&dir.path().join("test.db")).await.unwrap();
        (pool, dir)
    }

    fn character(name: &str) -> Character {
        let now = Utc::now();
        Character {
            id: Uuid::now_v7(),
            name: name.to_string(),
            age: Some(24),
            sex: Some("female".to_string()),
            hair_color: Some("black".to_string()),
            eye_color: None,
            height: None,
            body_type: None,
            personality_id: None,
            tags: vec!["bookish".to_string()],
            profile: CharacterProfile {
                occupation: Some("librarian".to_string()),
                ..Default::default()
            },
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_with_state() {
        let (pool, _dir) = test_pool().await;
        let repo = SqliteCharacterRepository::new(pool);

        let c = character("Mira");
        repo.create(&c, &CharacterState::initial(c.id)).await.unwrap();

        let loaded = repo.get(&c.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Mira");
        assert_eq!(loaded.tags, vec!["bookish"]);
        assert_eq!(loaded.profile.occupation.as_deref(), Some("librarian"));

        let state = repo.get_state(&c.id).await.unwrap().unwrap();
        assert_eq!(state.mood, Mood::Neutral);
        assert!((state.energy - 0.8).abs() < f64::EPSILON);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_state_change_roundtrip() {
        let (pool, _dir) = test_pool().await;
        let repo = SqliteCharacterRepository::new(pool);
        let c = character("Mira");
        repo.create(&c, &CharacterState::initial(c.id)).await.unwrap();

        let change = StateChange {
            mood: Some(Mood::Playful),
            relationship_level: Some(0.42),
            energy_delta: 0.5,
            last_interaction: Some(Utc::now()),
            ..Default::default()
        };
        let written = repo.apply_state_change(&c.id, &change, Utc::now()).await.unwrap().unwrap();
        assert_eq!(written.mood, Mood::Playful);
        // 0.8 + 0.5 clamps at the top.
        assert_eq!(written.energy, 1.0);

        let loaded = repo.get_state(&c.id).await.unwrap().unwrap();
        assert_eq!(loaded.mood, Mood::Playful);
        assert!((loaded.relationship_level - 0.42).abs() < f64::EPSILON);
        assert!(loaded.last_interaction.is_some());

        let missing = repo
            .apply_state_change(&Uuid::now_v7(), &change, Utc::now())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_deltas_accumulate() {
        let (pool, _dir) = test_pool().await;
        let repo = std::sync::Arc::new(SqliteCharacterRepository::new(pool));
        let c = character("Ivy");
        repo.create(&c, &CharacterState::initial(c.id)).await.unwrap();

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let repo = std::sync::Arc::clone(&repo);
                let id = c.id;
                tokio::spawn(async move {
                    let change = StateChange {
                        relationship_delta: 0.01,
                        ..Default::default()
                    };
                    repo.apply_state_change(&id, &change, Utc::now()).await.unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let state = repo.get_state(&c.id).await.unwrap().unwrap();
        assert!((state.relationship_level - 0.20).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_get_by_name_and_list_order() {
        let (pool, _dir) = test_pool().await;
        let repo = SqliteCharacterRepository::new(pool);
        let first = character("Ava");
        repo.create(&first, &CharacterState::initial(first.id)).await.unwrap();
        let mut second = character("Bea");
        second.created_at = first.created_at + chrono::Duration::seconds(1);
        repo.create(&second, &CharacterState::initial(second.id)).await.unwrap();

        assert_eq!(repo.get_by_name("Ava").await.unwrap().unwrap().id, first.id);
        assert!(repo.get_by_name("ava").await.unwrap().is_none());

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Bea", "Ava"]);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let (pool, _dir) = test_pool().await;
        let repo = SqliteCharacterRepository::new(pool);
        let err = repo.update(&character("Ghost")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_dependents() {
        let (pool, _dir) = test_pool().await;
        let repo = SqliteCharacterRepository::new(pool.clone());
        let interactions = SqliteInteractionRepository::new(pool);

        let c = character("Mira");
        repo.create(&c, &CharacterState::initial(c.id)).await.unwrap();
        interactions
            .create(&Interaction::new(
                InteractionKind::Message,
                c.id,
                "hello",
                serde_json::json!({}),
                None,
            ))
            .await
            .unwrap();

        repo.delete(&c.id).await.unwrap();
        assert!(repo.get_state(&c.id).await.unwrap().is_none());
        assert!(interactions.list(Some(&c.id), None, 10).await.unwrap().is_empty());
        assert!(matches!(repo.delete(&c.id).await, Err(RepositoryError::NotFound)));
    }
}
