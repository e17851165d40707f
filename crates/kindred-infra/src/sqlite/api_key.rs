//! API keys for the REST surface.
//!
//! Keys are shown once at creation. Only the lowercase-hex SHA-256 hash and
//! a short display prefix are stored.

use chrono::{DateTime, Utc};
use kindred_types::error::RepositoryError;
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{db_error, format_datetime, parse_datetime, parse_uuid};

const KEY_PREFIX: &str = "kdr_";

/// A stored key, without its secret.
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyInfo {
    pub id: Uuid,
    pub name: String,
    pub key_prefix: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct SqliteApiKeyStore {
    pool: DatabasePool,
}

/// Compute SHA-256 hash of an API key (lowercase hex).
pub fn hash_api_key(key: &str) -> String {
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

fn generate_key() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("{KEY_PREFIX}{hex}")
}

impl SqliteApiKeyStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Create a named key. Returns the plaintext key and its record.
    pub async fn create(&self, name: &str) -> Result<(String, ApiKeyInfo), RepositoryError> {
        let key = generate_key();
        let info = ApiKeyInfo {
            id: Uuid::now_v7(),
            name: name.to_string(),
            key_prefix: key.chars().take(KEY_PREFIX.len() + 8).collect(),
            created_at: Utc::now(),
            last_used_at: None,
        };

        sqlx::query(
            "INSERT INTO api_keys (id, name, key_hash, key_prefix, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(info.id.to_string())
        .bind(&info.name)
        .bind(hash_api_key(&key))
        .bind(&info.key_prefix)
        .bind(format_datetime(&info.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(db_error)?;

        tracing::info!(key_id = %info.id, name = %info.name, "api key created");
        Ok((key, info))
    }

    /// Check a presented key. A match bumps `last_used_at`.
    pub async fn verify(&self, key: &str) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT id FROM api_keys WHERE key_hash = ?")
            .bind(hash_api_key(key))
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(db_error)?;

        let Some(row) = row else {
            return Ok(false);
        };
        let id: String = row.try_get("id").map_err(db_error)?;

        // Best effort; a failed timestamp update does not reject the key.
        if let Err(e) = sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
            .bind(format_datetime(&Utc::now()))
            .bind(&id)
            .execute(&self.pool.writer)
            .await
        {
            tracing::warn!(key_id = %id, error = %e, "failed to record api key use");
        }
        Ok(true)
    }

    pub async fn list(&self) -> Result<Vec<ApiKeyInfo>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM api_keys ORDER BY created_at")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(db_error)?;

        rows.iter()
            .map(|row| {
                let id: String = row.try_get("id").map_err(db_error)?;
                let created_at: String = row.try_get("created_at").map_err(db_error)?;
                let last_used_at: Option<String> = row.try_get("last_used_at").map_err(db_error)?;
                Ok(ApiKeyInfo {
                    id: parse_uuid(&id, "api key id")?,
                    name: row.try_get("name").map_err(db_error)?,
                    key_prefix: row.try_get("key_prefix").map_err(db_error)?,
                    created_at: parse_datetime(&created_at)?,
                    last_used_at: last_used_at.as_deref().map(parse_datetime).transpose()?,
                })
            })
            .collect()
    }

    pub async fn count(&self) -> Result<u64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM api_keys")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(db_error)?;
        Ok(count as u64)
    }
}
