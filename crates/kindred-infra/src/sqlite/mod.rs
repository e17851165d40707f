//! SQLite storage layer.
//!
//! Repository implementations backed by SQLite with WAL mode and split
//! read/write connection pools. Timestamps are stored as fixed-width
//! RFC 3339 text so that `ORDER BY` on them is chronological; JSON
//! columns hold serialized `serde_json` values.

pub mod api_key;
pub mod asset;
pub mod catalog;
pub mod character;
pub mod conversation;
pub mod interaction;
pub mod memory;
pub mod pool;

use chrono::{DateTime, SecondsFormat, Utc};
use kindred_core::repository::Backend;
use kindred_types::error::RepositoryError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::filesystem::LocalFileSystem;

use self::asset::SqliteAssetRepository;
use self::catalog::{SqlitePersonalityRepository, SqliteRoleRepository};
use self::character::SqliteCharacterRepository;
use self::conversation::SqliteConversationRepository;
use self::interaction::{SqliteInteractionRepository, SqliteMediaRepository};
use self::memory::SqliteMemoryRepository;
use self::pool::DatabasePool;

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_uuid(s: &str, what: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::Query(format!("invalid {what}: {e}")))
}

pub(crate) fn parse_json<T: DeserializeOwned>(s: &str, what: &str) -> Result<T, RepositoryError> {
    serde_json::from_str(s).map_err(|e| RepositoryError::Query(format!("invalid {what} JSON: {e}")))
}

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Query(e.to_string()))
}

/// Map a driver error onto the repository taxonomy.
///
/// Unique violations become `Conflict`; foreign key violations mean the
/// referenced row is missing and become `NotFound`.
pub(crate) fn db_error(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &e {
        let message = db.message();
        if message.contains("UNIQUE") {
            return RepositoryError::Conflict(message.to_string());
        }
        if message.contains("FOREIGN KEY") {
            return RepositoryError::NotFound;
        }
    }
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => RepositoryError::Connection,
        other => RepositoryError::Query(other.to_string()),
    }
}

/// Every repository over one shared pool, plus the local filesystem.
pub struct SqliteBackend {
    pool: DatabasePool,
    characters: SqliteCharacterRepository,
    personalities: SqlitePersonalityRepository,
    roles: SqliteRoleRepository,
    conversations: SqliteConversationRepository,
    interactions: SqliteInteractionRepository,
    media: SqliteMediaRepository,
    memories: SqliteMemoryRepository,
    assets: SqliteAssetRepository,
    files: LocalFileSystem,
}

impl SqliteBackend {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            characters: SqliteCharacterRepository::new(pool.clone()),
            personalities: SqlitePersonalityRepository::new(pool.clone()),
            roles: SqliteRoleRepository::new(pool.clone()),
            conversations: SqliteConversationRepository::new(pool.clone()),
            interactions: SqliteInteractionRepository::new(pool.clone()),
            media: SqliteMediaRepository::new(pool.clone()),
            memories: SqliteMemoryRepository::new(pool.clone()),
            assets: SqliteAssetRepository::new(pool.clone()),
            files: LocalFileSystem::new(),
            pool,
        }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}

impl Backend for SqliteBackend {
    type Characters = SqliteCharacterRepository;
    type Personalities = SqlitePersonalityRepository;
    type Roles = SqliteRoleRepository;
    type Conversations = SqliteConversationRepository;
    type Interactions = SqliteInteractionRepository;
    type Media = SqliteMediaRepository;
    type Memories = SqliteMemoryRepository;
    type Assets = SqliteAssetRepository;
    type Files = LocalFileSystem;

    fn characters(&self) -> &Self::Characters {
        &self.characters
    }

    fn personalities(&self) -> &Self::Personalities {
        &self.personalities
    }

    fn roles(&self) -> &Self::Roles {
        &self.roles
    }

    fn conversations(&self) -> &Self::Conversations {
        &self.conversations
    }

    fn interactions(&self) -> &Self::Interactions {
        &self.interactions
    }

    fn media(&self) -> &Self::Media {
        &self.media
    }

    fn memories(&self) -> &Self::Memories {
        &self.memories
    }

    fn assets(&self) -> &Self::Assets {
        &self.assets
    }

    fn files(&self) -> &Self::Files {
        &self.files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datetime_format_is_fixed_width() {
        let a = DateTime::parse_from_rfc3339("2026-01-01T10:00:00Z").unwrap().with_timezone(&Utc);
        let b = DateTime::parse_from_rfc3339("2026-01-01T10:00:00.5Z").unwrap().with_timezone(&Utc);
        let (fa, fb) = (format_datetime(&a), format_datetime(&b));
        assert_eq!(fa.len(), fb.len());
        assert!(fa < fb);
        assert_eq!(parse_datetime(&fb).unwrap(), b);
    }

    #[test]
    fn test_parse_helpers_report_context() {
        let err = parse_uuid("nope", "character id").unwrap_err();
        assert!(err.to_string().contains("invalid character id"));

        let err = parse_json::<Vec<String>>("{", "tags").unwrap_err();
        assert!(err.to_string().contains("invalid tags JSON"));
    }

    #[test]
    fn test_db_error_fallback_is_query() {
        assert!(matches!(db_error(sqlx::Error::RowNotFound), RepositoryError::Query(_)));
        assert!(matches!(db_error(sqlx::Error::PoolTimedOut), RepositoryError::Connection));
    }
}
