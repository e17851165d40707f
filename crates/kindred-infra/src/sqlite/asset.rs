//! SQLite asset repository.
//!
//! Live rows sit in `assets`; superseded versions are copied to
//! `asset_versions` before the live row is overwritten. Tags and
//! dependency edges cascade with the asset.

use std::collections::{BTreeMap, BTreeSet};

use kindred_core::repository::asset::AssetRepository;
use kindred_types::asset::{
    Asset, AssetDependency, AssetSearch, AssetStats, AssetType, AssetVersion,
};
use kindred_types::error::RepositoryError;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{db_error, format_datetime, parse_datetime, parse_json, parse_uuid, to_json};

/// Columns of `assets` plus the tag list folded into a JSON array.
const ASSET_COLUMNS: &str = "a.id, a.asset_type, a.data, a.metadata, a.checksum, a.version,
    a.created_at, a.updated_at,
    (SELECT json_group_array(tag) FROM
        (SELECT tag FROM asset_tags WHERE asset_id = a.id ORDER BY tag)) AS tags";

pub struct SqliteAssetRepository {
    pool: DatabasePool,
}

impl SqliteAssetRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn asset_from_row(row: &SqliteRow) -> Result<Asset, RepositoryError> {
    let get = |e: sqlx::Error| RepositoryError::Query(e.to_string());
    let id: String = row.try_get("id").map_err(get)?;
    let asset_type: String = row.try_get("asset_type").map_err(get)?;
    let data: String = row.try_get("data").map_err(get)?;
    let metadata: String = row.try_get("metadata").map_err(get)?;
    let tags: Option<String> = row.try_get("tags").map_err(get)?;
    let version: i64 = row.try_get("version").map_err(get)?;
    let created_at: String = row.try_get("created_at").map_err(get)?;
    let updated_at: String = row.try_get("updated_at").map_err(get)?;

    Ok(Asset {
        id: parse_uuid(&id, "asset id")?,
        asset_type: asset_type.parse().map_err(RepositoryError::Query)?,
        data: parse_json(&data, "asset data")?,
        metadata: parse_json(&metadata, "asset metadata")?,
        tags: match tags {
            Some(tags) => parse_json(&tags, "asset tags")?,
            None => Vec::new(),
        },
        checksum: row.try_get("checksum").map_err(get)?,
        version: version.max(1) as u32,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

fn dependency_from_row(row: &SqliteRow) -> Result<AssetDependency, RepositoryError> {
    let get = |e: sqlx::Error| RepositoryError::Query(e.to_string());
    let source: String = row.try_get("source_id").map_err(get)?;
    let target: String = row.try_get("target_id").map_err(get)?;
    Ok(AssetDependency {
        source_id: parse_uuid(&source, "source asset id")?,
        target_id: parse_uuid(&target, "target asset id")?,
        dependency_type: row.try_get("dependency_type").map_err(get)?,
    })
}

/// Tags are stored trimmed and deduplicated.
fn normalized_tags(tags: &[String]) -> BTreeSet<&str> {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect()
}

async fn write_tags(
    conn: &mut sqlx::SqliteConnection,
    id: &Uuid,
    tags: &[String],
) -> Result<(), RepositoryError> {
    for tag in normalized_tags(tags) {
        sqlx::query("INSERT OR IGNORE INTO asset_tags (asset_id, tag) VALUES (?, ?)")
            .bind(id.to_string())
            .bind(tag)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
    }
    Ok(())
}

impl AssetRepository for SqliteAssetRepository {
    async fn insert(&self, asset: &Asset) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(db_error)?;

        sqlx::query(
            "INSERT INTO assets (id, asset_type, data, metadata, checksum, version, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(asset.id.to_string())
        .bind(asset.asset_type.to_string())
        .bind(to_json(&asset.data)?)
        .bind(to_json(&asset.metadata)?)
        .bind(&asset.checksum)
        .bind(asset.version as i64)
        .bind(format_datetime(&asset.created_at))
        .bind(format_datetime(&asset.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        write_tags(&mut *tx, &asset.id, &asset.tags).await?;
        tx.commit().await.map_err(db_error)
    }

    async fn replace(&self, previous: &Asset, asset: &Asset) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(db_error)?;

        sqlx::query(
            "INSERT INTO asset_versions (asset_id, version, data, metadata, checksum, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(previous.id.to_string())
        .bind(previous.version as i64)
        .bind(to_json(&previous.data)?)
        .bind(to_json(&previous.metadata)?)
        .bind(&previous.checksum)
        .bind(format_datetime(&previous.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        let result = sqlx::query(
            "UPDATE assets SET data = ?, metadata = ?, checksum = ?, version = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(to_json(&asset.data)?)
        .bind(to_json(&asset.metadata)?)
        .bind(&asset.checksum)
        .bind(asset.version as i64)
        .bind(format_datetime(&asset.updated_at))
        .bind(asset.id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query("DELETE FROM asset_tags WHERE asset_id = ?")
            .bind(asset.id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        write_tags(&mut *tx, &asset.id, &asset.tags).await?;

        tx.commit().await.map_err(db_error)
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Asset>, RepositoryError> {
        let sql = format!("SELECT {ASSET_COLUMNS} FROM assets a WHERE a.id = ?");
        sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(db_error)?
            .as_ref()
            .map(asset_from_row)
            .transpose()
    }

    async fn get_version(&self, id: &Uuid, version: u32) -> Result<Option<AssetVersion>, RepositoryError> {
        let row = sqlx::query(
            "SELECT * FROM asset_versions WHERE asset_id = ? AND version = ?
             ORDER BY id DESC LIMIT 1",
        )
        .bind(id.to_string())
        .bind(version as i64)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(db_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let get = |e: sqlx::Error| RepositoryError::Query(e.to_string());
        let data: String = row.try_get("data").map_err(get)?;
        let metadata: String = row.try_get("metadata").map_err(get)?;
        let created_at: String = row.try_get("created_at").map_err(get)?;
        Ok(Some(AssetVersion {
            asset_id: *id,
            version,
            data: parse_json(&data, "asset version data")?,
            metadata: parse_json(&metadata, "asset version metadata")?,
            checksum: row.try_get("checksum").map_err(get)?,
            created_at: parse_datetime(&created_at)?,
        }))
    }

    async fn delete(&self, id: &Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM assets WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn search(&self, query: &AssetSearch) -> Result<Vec<Asset>, RepositoryError> {
        let tags = normalized_tags(&query.tags);
        let mut sql = format!("SELECT {ASSET_COLUMNS} FROM assets a WHERE 1 = 1");
        if query.asset_type.is_some() {
            sql.push_str(" AND a.asset_type = ?");
        }
        if !tags.is_empty() {
            let placeholders = vec!["?"; tags.len()].join(", ");
            sql.push_str(&format!(
                " AND a.id IN (SELECT asset_id FROM asset_tags WHERE tag IN ({placeholders})
                   GROUP BY asset_id HAVING COUNT(DISTINCT tag) = ?)"
            ));
        }
        sql.push_str(" ORDER BY a.created_at DESC LIMIT ? OFFSET ?");

        let mut q = sqlx::query(&sql);
        if let Some(asset_type) = query.asset_type {
            q = q.bind(asset_type.to_string());
        }
        if !tags.is_empty() {
            for tag in &tags {
                q = q.bind(*tag);
            }
            q = q.bind(tags.len() as i64);
        }

        q.bind(query.limit as i64)
            .bind(query.offset as i64)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(db_error)?
            .iter()
            .map(asset_from_row)
            .collect()
    }

    async fn add_tag(&self, id: &Uuid, tag: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("INSERT OR IGNORE INTO asset_tags (asset_id, tag) VALUES (?, ?)")
            .bind(id.to_string())
            .bind(tag.trim())
            .execute(&self.pool.writer)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_tag(&self, id: &Uuid, tag: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM asset_tags WHERE asset_id = ? AND tag = ?")
            .bind(id.to_string())
            .bind(tag.trim())
            .execute(&self.pool.writer)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_dependency(&self, dependency: &AssetDependency) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO asset_dependencies (source_id, target_id, dependency_type) VALUES (?, ?, ?)
             ON CONFLICT(source_id, target_id) DO UPDATE SET dependency_type = excluded.dependency_type",
        )
        .bind(dependency.source_id.to_string())
        .bind(dependency.target_id.to_string())
        .bind(&dependency.dependency_type)
        .execute(&self.pool.writer)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn dependencies_of(&self, source_id: &Uuid) -> Result<Vec<AssetDependency>, RepositoryError> {
        sqlx::query("SELECT * FROM asset_dependencies WHERE source_id = ? ORDER BY target_id")
            .bind(source_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(db_error)?
            .iter()
            .map(dependency_from_row)
            .collect()
    }

    async fn dependents_of(&self, target_id: &Uuid) -> Result<Vec<AssetDependency>, RepositoryError> {
        sqlx::query("SELECT * FROM asset_dependencies WHERE target_id = ? ORDER BY source_id")
            .bind(target_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(db_error)?
            .iter()
            .map(dependency_from_row)
            .collect()
    }

    async fn orphans(&self, asset_type: Option<AssetType>) -> Result<Vec<Asset>, RepositoryError> {
        let mut sql = format!(
            "SELECT {ASSET_COLUMNS} FROM assets a
             WHERE a.id NOT IN (SELECT DISTINCT target_id FROM asset_dependencies)"
        );
        if asset_type.is_some() {
            sql.push_str(" AND a.asset_type = ?");
        }
        sql.push_str(" ORDER BY a.created_at DESC");

        let mut q = sqlx::query(&sql);
        if let Some(asset_type) = asset_type {
            q = q.bind(asset_type.to_string());
        }
        q.fetch_all(&self.pool.reader)
            .await
            .map_err(db_error)?
            .iter()
            .map(asset_from_row)
            .collect()
    }

    async fn stats(&self) -> Result<AssetStats, RepositoryError> {
        let by_type: Vec<(String, i64)> =
            sqlx::query_as("SELECT asset_type, COUNT(*) FROM assets GROUP BY asset_type")
                .fetch_all(&self.pool.reader)
                .await
                .map_err(db_error)?;

        Ok(AssetStats {
            total_assets: self.scalar("SELECT COUNT(*) FROM assets").await?,
            by_type: by_type
                .into_iter()
                .map(|(t, n)| (t, n as u64))
                .collect::<BTreeMap<_, _>>(),
            total_tags: self.scalar("SELECT COUNT(DISTINCT tag) FROM asset_tags").await?,
            total_dependencies: self.scalar("SELECT COUNT(*) FROM asset_dependencies").await?,
            total_versions: self.scalar("SELECT COUNT(*) FROM asset_versions").await?,
        })
    }
}

impl SqliteAssetRepository {
    async fn scalar(&self, sql: &str) -> Result<u64, RepositoryError> {
        let (n,): (i64,) = sqlx::query_as(sql)
            .fetch_one(&self.pool.reader)
            .await
            .map_err(db_error)?;
        Ok(n as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration, Utc};
    use kindred_types::asset::DEFAULT_DEPENDENCY_TYPE;

    async fn setup() -> (SqliteAssetRepository, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::open(&dir.path().join("test.db")).await.unwrap();
        (SqliteAssetRepository::new(pool), dir)
    }

    fn asset(asset_type: AssetType, tags: &[&str], minutes_ago: i64) -> Asset {
        let at = Utc::now() - Duration::minutes(minutes_ago);
        Asset {
            id: Uuid::now_v7(),
            asset_type,
            data: serde_json::json!({"text": "hello"}),
            metadata: serde_json::json!({}),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            checksum: "abc".to_string(),
            version: 1,
            created_at: at,
            updated_at: at,
        }
    }

    fn edge(source: &Asset, target: &Asset) -> AssetDependency {
        AssetDependency {
            source_id: source.id,
            target_id: target.id,
            dependency_type: DEFAULT_DEPENDENCY_TYPE.to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_with_sorted_tags() {
        let (repo, _dir) = setup().await;
        let a = asset(AssetType::Message, &["greeting", "cozy", "greeting"], 0);
        repo.insert(&a).await.unwrap();

        let loaded = repo.get(&a.id).await.unwrap().unwrap();
        assert_eq!(loaded.tags, vec!["cozy", "greeting"]);
        assert_eq!(loaded.data, a.data);
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    async fn test_replace_archives_previous_version() {
        let (repo, _dir) = setup().await;
        let original = asset(AssetType::Scene, &["beach"], 0);
        repo.insert(&original).await.unwrap();

        let mut next = original.clone();
        next.data = serde_json::json!({"text": "updated"});
        next.tags = vec!["sunset".to_string()];
        next.checksum = "def".to_string();
        next.version = 2;
        next.updated_at = Utc::now();
        repo.replace(&original, &next).await.unwrap();

        let live = repo.get(&original.id).await.unwrap().unwrap();
        assert_eq!(live.version, 2);
        assert_eq!(live.tags, vec!["sunset"]);

        let v1 = repo.get_version(&original.id, 1).await.unwrap().unwrap();
        assert_eq!(v1.data["text"], "hello");
        assert_eq!(v1.checksum, "abc");
        assert!(repo.get_version(&original.id, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_requires_all_tags() {
        let (repo, _dir) = setup().await;
        let both = asset(AssetType::Image, &["beach", "sunset"], 2);
        let one = asset(AssetType::Image, &["beach"], 1);
        let other = asset(AssetType::Audio, &["beach", "sunset"], 0);
        for a in [&both, &one, &other] {
            repo.insert(a).await.unwrap();
        }

        let found = repo
            .search(&AssetSearch {
                asset_type: Some(AssetType::Image),
                tags: vec!["beach".into(), "sunset".into()],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, both.id);

        let all = repo.search(&AssetSearch::default()).await.unwrap();
        assert_eq!(all[0].id, other.id, "newest first");

        let page = repo
            .search(&AssetSearch { limit: 1, offset: 1, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(page[0].id, one.id);
    }

    #[tokio::test]
    async fn test_tags_add_remove() {
        let (repo, _dir) = setup().await;
        let a = asset(AssetType::Message, &[], 0);
        repo.insert(&a).await.unwrap();

        assert!(repo.add_tag(&a.id, "late-night").await.unwrap());
        assert!(!repo.add_tag(&a.id, "late-night").await.unwrap());
        assert!(repo.remove_tag(&a.id, "late-night").await.unwrap());
        assert!(!repo.remove_tag(&a.id, "late-night").await.unwrap());
    }

    #[tokio::test]
    async fn test_dependencies_orphans_and_stats() {
        let (repo, _dir) = setup().await;
        let scene = asset(AssetType::Scene, &["intro"], 2);
        let image = asset(AssetType::Image, &["intro", "bg"], 1);
        let audio = asset(AssetType::Audio, &[], 0);
        for a in [&scene, &image, &audio] {
            repo.insert(a).await.unwrap();
        }

        repo.upsert_dependency(&edge(&scene, &image)).await.unwrap();
        repo.upsert_dependency(&edge(&scene, &audio)).await.unwrap();
        repo.upsert_dependency(&AssetDependency {
            dependency_type: "optional".into(),
            ..edge(&scene, &audio)
        })
        .await
        .unwrap();

        let deps = repo.dependencies_of(&scene.id).await.unwrap();
        assert_eq!(deps.len(), 2);
        assert!(deps.iter().any(|d| d.dependency_type == "optional"));
        assert_eq!(repo.dependents_of(&image.id).await.unwrap()[0].source_id, scene.id);

        let orphans: Vec<Uuid> = repo.orphans(None).await.unwrap().iter().map(|a| a.id).collect();
        assert_eq!(orphans, vec![scene.id]);
        assert!(repo.orphans(Some(AssetType::Image)).await.unwrap().is_empty());

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.total_assets, 3);
        assert_eq!(stats.by_type.get("scene"), Some(&1));
        assert_eq!(stats.total_tags, 2);
        assert_eq!(stats.total_dependencies, 2);
        assert_eq!(stats.total_versions, 0);

        repo.delete(&image.id).await.unwrap();
        assert_eq!(repo.dependencies_of(&scene.id).await.unwrap().len(), 1);
        assert!(matches!(repo.delete(&image.id).await, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_dependency_on_missing_asset_rejected() {
        let (repo, _dir) = setup().await;
        let a = asset(AssetType::Scene, &[], 0);
        repo.insert(&a).await.unwrap();
        let ghost = asset(AssetType::Image, &[], 0);

        let err = repo.upsert_dependency(&edge(&a, &ghost)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }
}
