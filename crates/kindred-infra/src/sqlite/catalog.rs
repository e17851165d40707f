//! SQLite personality and role catalogues.

use kindred_core::repository::catalog::{PersonalityRepository, RoleRepository};
use kindred_types::error::RepositoryError;
use kindred_types::personality::Personality;
use kindred_types::role::Role;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{db_error, format_datetime, parse_datetime, parse_json, parse_uuid, to_json};

pub struct SqlitePersonalityRepository {
    pool: DatabasePool,
}

impl SqlitePersonalityRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn personality_from_row(row: &SqliteRow) -> Result<Personality, RepositoryError> {
    let get = |e: sqlx::Error| RepositoryError::Query(e.to_string());
    let id: String = row.try_get("id").map_err(get)?;
    let traits: String = row.try_get("traits").map_err(get)?;
    let style: String = row.try_get("communication_style").map_err(get)?;
    let values: String = row.try_get("personality_values").map_err(get)?;
    let created_at: String = row.try_get("created_at").map_err(get)?;

    Ok(Personality {
        id: parse_uuid(&id, "personality id")?,
        name: row.try_get("name").map_err(get)?,
        system_prompt: row.try_get("system_prompt").map_err(get)?,
        traits: parse_json(&traits, "personality traits")?,
        communication_style: parse_json(&style, "communication style")?,
        openness: row.try_get("openness").map_err(get)?,
        values: parse_json(&values, "personality values")?,
        created_at: parse_datetime(&created_at)?,
    })
}

impl PersonalityRepository for SqlitePersonalityRepository {
    async fn create(&self, personality: &Personality) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO personalities (id, name, system_prompt, traits, communication_style, openness, personality_values, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(personality.id.to_string())
        .bind(&personality.name)
        .bind(&personality.system_prompt)
        .bind(to_json(&personality.traits)?)
        .bind(to_json(&personality.communication_style)?)
        .bind(personality.openness)
        .bind(to_json(&personality.values)?)
        .bind(format_datetime(&personality.created_at))
        .execute(&self.pool.writer)
        .await
        .map(|_| ())
        .map_err(|e| match db_error(e) {
            RepositoryError::Conflict(_) => {
                RepositoryError::Conflict(format!("personality '{}' already exists", personality.name))
            }
            other => other,
        })
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Personality>, RepositoryError> {
        sqlx::query("SELECT * FROM personalities WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(db_error)?
            .as_ref()
            .map(personality_from_row)
            .transpose()
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Personality>, RepositoryError> {
        sqlx::query("SELECT * FROM personalities WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(db_error)?
            .as_ref()
            .map(personality_from_row)
            .transpose()
    }

    async fn list(&self) -> Result<Vec<Personality>, RepositoryError> {
        sqlx::query("SELECT * FROM personalities ORDER BY name")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(db_error)?
            .iter()
            .map(personality_from_row)
            .collect()
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM personalities")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(db_error)?;
        Ok(count as u64)
    }
}

pub struct SqliteRoleRepository {
    pool: DatabasePool,
}

impl SqliteRoleRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn role_from_row(row: &SqliteRow) -> Result<Role, RepositoryError> {
    let get = |e: sqlx::Error| RepositoryError::Query(e.to_string());
    let id: String = row.try_get("id").map_err(get)?;
    let required: String = row.try_get("required_traits").map_err(get)?;
    let created_at: String = row.try_get("created_at").map_err(get)?;

    Ok(Role {
        id: parse_uuid(&id, "role id")?,
        name: row.try_get("name").map_err(get)?,
        description: row.try_get("description").map_err(get)?,
        required_traits: parse_json(&required, "required traits")?,
        context: row.try_get("context").map_err(get)?,
        scenario: row.try_get("scenario").map_err(get)?,
        created_at: parse_datetime(&created_at)?,
    })
}

impl RoleRepository for SqliteRoleRepository {
    async fn create(&self, role: &Role) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO roles (id, name, description, required_traits, context, scenario, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(role.id.to_string())
        .bind(&role.name)
        .bind(&role.description)
        .bind(to_json(&role.required_traits)?)
        .bind(&role.context)
        .bind(&role.scenario)
        .bind(format_datetime(&role.created_at))
        .execute(&self.pool.writer)
        .await
        .map(|_| ())
        .map_err(|e| match db_error(e) {
            RepositoryError::Conflict(_) => {
                RepositoryError::Conflict(format!("role '{}' already exists", role.name))
            }
            other => other,
        })
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Role>, RepositoryError> {
        sqlx::query("SELECT * FROM roles WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(db_error)?
            .as_ref()
            .map(role_from_row)
            .transpose()
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Role>, RepositoryError> {
        sqlx::query("SELECT * FROM roles WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(db_error)?
            .as_ref()
            .map(role_from_row)
            .transpose()
    }

    async fn list(&self) -> Result<Vec<Role>, RepositoryError> {
        sqlx::query("SELECT * FROM roles ORDER BY name")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(db_error)?
            .iter()
            .map(role_from_row)
            .collect()
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM roles")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(db_error)?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use kindred_types::personality::CommunicationStyle;

    async fn test_pool() -> (DatabasePool, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::open(&dir.path().join("test.db")).await.unwrap();
        (pool, dir)
    }

    fn personality(name: &str) -> Personality {
        Personality {
            id: Uuid::now_v7(),
            name: name.to_string(),
            system_prompt: "You are cheerful.".to_string(),
            traits: vec!["cheerful".to_string(), "curious".to_string()],
            communication_style: CommunicationStyle {
                tone: Some("warm".to_string()),
                ..Default::default()
            },
            openness: 0.7,
            values: vec!["honesty".to_string()],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_personality_roundtrip_and_conflict() {
        let (pool, _dir) = test_pool().await;
        let repo = SqlitePersonalityRepository::new(pool);

        let p = personality("Sunny");
        repo.create(&p).await.unwrap();

        let loaded = repo.get_by_name("Sunny").await.unwrap().unwrap();
        assert_eq!(loaded.id, p.id);
        assert_eq!(loaded.traits, p.traits);
        assert_eq!(loaded.communication_style.tone.as_deref(), Some("warm"));
        assert_eq!(loaded.values, vec!["honesty"]);

        let err = repo.create(&personality("Sunny")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(msg) if msg.contains("Sunny")));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_roles_listed_by_name() {
        let (pool, _dir) = test_pool().await;
        let repo = SqliteRoleRepository::new(pool);

        for name in ["Mentor", "Best Friend"] {
            repo.create(&Role {
                id: Uuid::now_v7(),
                name: name.to_string(),
                description: String::new(),
                required_traits: vec!["supportive".to_string()],
                context: "ctx".to_string(),
                scenario: "scn".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        }

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Best Friend", "Mentor"]);
        assert!(repo.get(&Uuid::now_v7()).await.unwrap().is_none());
    }
}
