//! SQLite conversation repository.
//!
//! Messages are stored inline as a JSON array on the conversation row.

use kindred_core::repository::conversation::ConversationRepository;
use chrono::{DateTime, Utc};
use kindred_types::conversation::{ChatMessage, Conversation};
use kindred_types::error::RepositoryError;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{db_error, format_datetime, parse_datetime, parse_json, parse_uuid, to_json};

pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn conversation_from_row(row: &SqliteRow) -> Result<Conversation, RepositoryError> {
    let get = |e: sqlx::Error| RepositoryError::Query(e.to_string());
    let id: String = row.try_get("id").map_err(get)?;
    let character_id: String = row.try_get("character_id").map_err(get)?;
    let role_id: Option<String> = row.try_get("role_id").map_err(get)?;
    let chain_id: String = row.try_get("chain_id").map_err(get)?;
    let messages: String = row.try_get("messages").map_err(get)?;
    let started_at: String = row.try_get("started_at").map_err(get)?;
    let ended_at: Option<String> = row.try_get("ended_at").map_err(get)?;
    let metadata: String = row.try_get("metadata").map_err(get)?;

    Ok(Conversation {
        id: parse_uuid(&id, "conversation id")?,
        character_id: parse_uuid(&character_id, "character id")?,
        role_id: role_id.as_deref().map(|r| parse_uuid(r, "role id")).transpose()?,
        chain_id: parse_uuid(&chain_id, "chain id")?,
        messages: parse_json(&messages, "conversation messages")?,
        started_at: parse_datetime(&started_at)?,
        ended_at: ended_at.as_deref().map(parse_datetime).transpose()?,
        metadata: parse_json(&metadata, "conversation metadata")?,
    })
}

impl SqliteConversationRepository {
    /// Read back a row after a conditional update. Zero affected rows on an
    /// existing row means it had already ended.
    async fn reload(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        id: &Uuid,
        rows_affected: u64,
    ) -> Result<Conversation, RepositoryError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_error)?
            .ok_or(RepositoryError::NotFound)?;
        if rows_affected == 0 {
            return Err(RepositoryError::Conflict("conversation has ended".to_string()));
        }
        conversation_from_row(&row)
    }
}

impl ConversationRepository for SqliteConversationRepository {
    async fn create(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO conversations (id, character_id, role_id, chain_id, messages, started_at, ended_at, metadata)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(conversation.id.to_string())
        .bind(conversation.character_id.to_string())
        .bind(conversation.role_id.map(|id| id.to_string()))
        .bind(conversation.chain_id.to_string())
        .bind(to_json(&conversation.messages)?)
        .bind(format_datetime(&conversation.started_at))
        .bind(conversation.ended_at.as_ref().map(format_datetime))
        .bind(to_json(&conversation.metadata)?)
        .execute(&self.pool.writer)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Conversation>, RepositoryError> {
        sqlx::query("SELECT * FROM conversations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(db_error)?
            .as_ref()
            .map(conversation_from_row)
            .transpose()
    }

    async fn append_message(
        &self,
        id: &Uuid,
        message: &ChatMessage,
    ) -> Result<Conversation, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(db_error)?;

        let result = sqlx::query(
            "UPDATE conversations SET messages = json_insert(messages, '$[#]', json(?))
             WHERE id = ? AND ended_at IS NULL",
        )
        .bind(to_json(message)?)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        let conversation = self.reload(&mut tx, id, result.rows_affected()).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(conversation)
    }

    async fn end(&self, id: &Uuid, at: DateTime<Utc>) -> Result<Conversation, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(db_error)?;

        let result = sqlx::query(
            "UPDATE conversations SET ended_at = ? WHERE id = ? AND ended_at IS NULL",
        )
        .bind(format_datetime(&at))
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        let conversation = self.reload(&mut tx, id, result.rows_affected()).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(conversation)
    }

    async fn list_for_character(
        &self,
        character_id: &Uuid,
        limit: u32,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        sqlx::query(
            "SELECT * FROM conversations WHERE character_id = ? ORDER BY started_at DESC LIMIT ?",
        )
        .bind(character_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(db_error)?
        .iter()
        .map(conversation_from_row)
        .collect()
    }

    async fn latest_open(&self, character_id: &Uuid) -> Result<Option<Conversation>, RepositoryError> {
        sqlx::query(
            "SELECT * FROM conversations WHERE character_id = ? AND ended_at IS NULL
             ORDER BY started_at DESC LIMIT 1",
        )
        .bind(character_id.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(db_error)?
        .as_ref()
        .map(conversation_from_row)
        .transpose()
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversations")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(db_error)?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use kindred_core::repository::character::CharacterRepository;
    use kindred_types::character::{Character, CharacterProfile, CharacterState};
    use kindred_types::conversation::ChatMessage;
    use kindred_types::llm::MessageRole;

    use crate::sqlite::character::SqliteCharacterRepository;

    async fn setup() -> (SqliteConversationRepository, Uuid, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::open(&dir.path().join("test.db")).await.unwrap();
        let now = Utc::now();
        let character = Character {
            id: Uuid::now_v7(),
            name: "Nova".to_string(),
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
        SqliteCharacterRepository::new(pool.clone())
            .create(&character, &CharacterState::initial(character.id))
            .await
            .unwrap();
        (SqliteConversationRepository::new(pool), character.id, dir)
    }

    fn conversation(character_id: Uuid, started_at: chrono::DateTime<Utc>) -> Conversation {
        Conversation {
            id: Uuid::now_v7(),
            character_id,
            role_id: None,
            chain_id: Uuid::now_v7(),
            messages: Vec::new(),
            started_at,
            ended_at: None,
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn test_messages_append_in_order() {
        let (repo, character_id, _dir) = setup().await;
        let conv = conversation(character_id, Utc::now());
        repo.create(&conv).await.unwrap();

        repo.append_message(&conv.id, &ChatMessage::new(MessageRole::User, "hi"))
            .await
            .unwrap();
        let loaded = repo
            .append_message(&conv.id, &ChatMessage::new(MessageRole::Assistant, "hey you"))
            .await
            .unwrap();

        assert_eq!(loaded.messages.len(), 2);
        assert_eq!(loaded.messages[1].content, "hey you");
        assert_eq!(repo.get(&conv.id).await.unwrap().unwrap().messages.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_appends_all_land() {
        let (repo, character_id, _dir) = setup().await;
        let conv = conversation(character_id, Utc::now());
        repo.create(&conv).await.unwrap();
        let repo = std::sync::Arc::new(repo);

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let repo = std::sync::Arc::clone(&repo);
                let id = conv.id;
                tokio::spawn(async move {
                    let msg = ChatMessage::new(MessageRole::Assistant, format!("reply {i}"));
                    repo.append_message(&id, &msg).await.unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let loaded = repo.get(&conv.id).await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 10);
    }

    #[tokio::test]
    async fn test_end_is_one_shot_and_blocks_appends() {
        let (repo, character_id, _dir) = setup().await;
        let conv = conversation(character_id, Utc::now());
        repo.create(&conv).await.unwrap();

        let ended = repo.end(&conv.id, Utc::now()).await.unwrap();
        assert!(ended.ended_at.is_some());

        let again = repo.end(&conv.id, Utc::now()).await.unwrap_err();
        assert!(matches!(again, RepositoryError::Conflict(_)));

        let late = repo
            .append_message(&conv.id, &ChatMessage::new(MessageRole::User, "still there?"))
            .await
            .unwrap_err();
        assert!(matches!(late, RepositoryError::Conflict(_)));
        assert!(repo.get(&conv.id).await.unwrap().unwrap().messages.is_empty());

        let missing = repo.end(&Uuid::now_v7(), Utc::now()).await.unwrap_err();
        assert!(matches!(missing, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_latest_open_skips_ended() {
        let (repo, character_id, _dir) = setup().await;
        let now = Utc::now();

        let older = conversation(character_id, now - Duration::minutes(10));
        repo.create(&older).await.unwrap();
        let mut newer = conversation(character_id, now);
        newer.ended_at = Some(now);
        repo.create(&newer).await.unwrap();

        let open = repo.latest_open(&character_id).await.unwrap().unwrap();
        assert_eq!(open.id, older.id);

        let all = repo.list_for_character(&character_id, 10).await.unwrap();
        assert_eq!(all[0].id, newer.id);
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unknown_character_rejected() {
        let (repo, _character_id, _dir) = setup().await;
        let err = repo.create(&conversation(Uuid::now_v7(), Utc::now())).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }
}
