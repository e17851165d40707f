//! Versioned asset registry.
//!
//! Every save is validated against the asset type's rules and checksummed.
//! Re-saving an existing id bumps the version and archives the previous
//! payload; dependency edges guard deletes unless the caller cascades.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use kindred_types::asset::{
    Asset, AssetDependency, AssetSearch, AssetStats, AssetType, DEFAULT_DEPENDENCY_TYPE,
    SaveAssetRequest,
};
use kindred_types::error::{AssetError, RepositoryError};
use uuid::Uuid;

use super::validation;
use crate::repository::Backend;
use crate::repository::asset::AssetRepository;

pub struct AssetManager<B: Backend> {
    backend: Arc<B>,
}

impl<B: Backend> AssetManager<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Validate and store an asset. An `id` that already exists produces a
    /// new version; an unknown or absent `id` produces version 1.
    pub async fn save(&self, request: SaveAssetRequest) -> Result<Asset, AssetError> {
        validation::validate(self.backend.files(), request.asset_type, &request.data).await?;

        let metadata = request.metadata.unwrap_or_else(|| serde_json::json!({}));
        let checksum = validation::checksum(&request.data, &metadata);
        let tags = normalize_tags(request.tags);
        let now = Utc::now();

        let existing = match &request.id {
            Some(id) => self.find(id).await?,
            None => None,
        };

        match existing {
            Some(previous) => {
                if previous.asset_type != request.asset_type {
                    return Err(AssetError::Validation(format!(
                        "asset {} is a {}, not a {}",
                        previous.id, previous.asset_type, request.asset_type
                    )));
                }
                let asset = Asset {
                    id: previous.id,
                    asset_type: previous.asset_type,
                    data: request.data,
                    metadata,
                    tags,
                    checksum,
                    version: previous.version + 1,
                    created_at: previous.created_at,
                    updated_at: now,
                };
                self.backend
                    .assets()
                    .replace(&previous, &asset)
                    .await
                    .map_err(|e| AssetError::StorageError(e.to_string()))?;
                tracing::info!(asset_id = %asset.id, version = asset.version, "asset updated");
                Ok(asset)
            }
            None => {
                let asset = Asset {
                    id: request.id.unwrap_or_else(Uuid::now_v7),
                    asset_type: request.asset_type,
                    data: request.data,
                    metadata,
                    tags,
                    checksum,
                    version: 1,
                    created_at: now,
                    updated_at: now,
                };
                self.backend
                    .assets()
                    .insert(&asset)
                    .await
                    .map_err(|e| AssetError::StorageError(e.to_string()))?;
                tracing::info!(asset_id = %asset.id, asset_type = %asset.asset_type, "asset created");
                Ok(asset)
            }
        }
    }

    /// The live asset, or one archived version of it.
    pub async fn load(&self, id: &Uuid, version: Option<u32>) -> Result<Asset, AssetError> {
        let current = self.find(id).await?.ok_or(AssetError::NotFound)?;
        let Some(wanted) = version else {
            return Ok(current);
        };
        if wanted == current.version {
            return Ok(current);
        }

        let archived = self
            .backend
            .assets()
            .get_version(id, wanted)
            .await
            .map_err(|e| AssetError::StorageError(e.to_string()))?
            .ok_or(AssetError::VersionNotFound(wanted))?;

        Ok(Asset {
            id: current.id,
            asset_type: current.asset_type,
            data: archived.data,
            metadata: archived.metadata,
            tags: current.tags,
            checksum: archived.checksum,
            version: archived.version,
            created_at: current.created_at,
            updated_at: archived.created_at,
        })
    }

    /// Delete an asset. Assets that depend on it block the delete unless
    /// `cascade` is set, in which case they (and their own dependents) go
    /// first. Returns every deleted id.
    pub async fn delete(&self, id: &Uuid, cascade: bool) -> Result<Vec<Uuid>, AssetError> {
        self.find(id).await?.ok_or(AssetError::NotFound)?;

        let direct = self.dependents(id).await?;
        if !direct.is_empty() && !cascade {
            return Err(AssetError::HasDependents(direct.len()));
        }

        // breadth-first over dependents; delete the farthest first
        let mut order = vec![*id];
        let mut seen: HashSet<Uuid> = HashSet::from([*id]);
        let mut queue: VecDeque<Uuid> = VecDeque::from([*id]);
        while let Some(current) = queue.pop_front() {
            for edge in self.dependents(&current).await? {
                if seen.insert(edge.source_id) {
                    order.push(edge.source_id);
                    queue.push_back(edge.source_id);
                }
            }
        }

        let mut deleted = Vec::with_capacity(order.len());
        for asset_id in order.into_iter().rev() {
            match self.backend.assets().delete(&asset_id).await {
                Ok(()) => deleted.push(asset_id),
                Err(RepositoryError::NotFound) => {}
                Err(e) => return Err(AssetError::StorageError(e.to_string())),
            }
        }
        tracing::info!(asset_id = %id, deleted = deleted.len(), cascade, "asset deleted");
        Ok(deleted)
    }

    pub async fn search(&self, query: &AssetSearch) -> Result<Vec<Asset>, AssetError> {
        let mut query = query.clone();
        query.tags = normalize_tags(query.tags);
        self.backend
            .assets()
            .search(&query)
            .await
            .map_err(|e| AssetError::StorageError(e.to_string()))
    }

    pub async fn add_tag(&self, id: &Uuid, tag: &str) -> Result<bool, AssetError> {
        let tag = clean_tag(tag)?;
        self.find(id).await?.ok_or(AssetError::NotFound)?;
        self.backend
            .assets()
            .add_tag(id, &tag)
            .await
            .map_err(|e| AssetError::StorageError(e.to_string()))
    }

    pub async fn remove_tag(&self, id: &Uuid, tag: &str) -> Result<bool, AssetError> {
        let tag = clean_tag(tag)?;
        self.find(id).await?.ok_or(AssetError::NotFound)?;
        self.backend
            .assets()
            .remove_tag(id, &tag)
            .await
            .map_err(|e| AssetError::StorageError(e.to_string()))
    }

    /// Record that `source` needs `target`. Re-adding an edge updates its type.
    pub async fn add_dependency(
        &self,
        source: &Uuid,
        target: &Uuid,
        dependency_type: Option<&str>,
    ) -> Result<AssetDependency, AssetError> {
        if source == target {
            return Err(AssetError::SelfDependency);
        }
        self.find(source).await?.ok_or(AssetError::NotFound)?;
        self.find(target).await?.ok_or(AssetError::NotFound)?;

        let dependency = AssetDependency {
            source_id: *source,
            target_id: *target,
            dependency_type: dependency_type
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(DEFAULT_DEPENDENCY_TYPE)
                .to_string(),
        };
        self.backend
            .assets()
            .upsert_dependency(&dependency)
            .await
            .map_err(|e| AssetError::StorageError(e.to_string()))?;
        tracing::debug!(source = %source, target = %target, kind = %dependency.dependency_type, "asset dependency recorded");
        Ok(dependency)
    }

    /// Edges leaving `id`. With `recursive`, the whole reachable graph in
    /// breadth-first order; cycles are visited once.
    pub async fn dependencies(
        &self,
        id: &Uuid,
        recursive: bool,
    ) -> Result<Vec<AssetDependency>, AssetError> {
        if !recursive {
            return self.edges_from(id).await;
        }

        let mut result = Vec::new();
        let mut visited: HashSet<Uuid> = HashSet::from([*id]);
        let mut queue: VecDeque<Uuid> = VecDeque::from([*id]);
        while let Some(current) = queue.pop_front() {
            for edge in self.edges_from(&current).await? {
                if visited.insert(edge.target_id) {
                    queue.push_back(edge.target_id);
                }
                result.push(edge);
            }
        }
        Ok(result)
    }

    /// Edges pointing at `id`.
    pub async fn dependents(&self, id: &Uuid) -> Result<Vec<AssetDependency>, AssetError> {
        self.backend
            .assets()
            .dependents_of(id)
            .await
            .map_err(|e| AssetError::StorageError(e.to_string()))
    }

    pub async fn find_orphans(&self, asset_type: Option<AssetType>) -> Result<Vec<Asset>, AssetError> {
        self.backend
            .assets()
            .orphans(asset_type)
            .await
            .map_err(|e| AssetError::StorageError(e.to_string()))
    }

    pub async fn stats(&self) -> Result<AssetStats, AssetError> {
        self.backend
            .assets()
            .stats()
            .await
            .map_err(|e| AssetError::StorageError(e.to_string()))
    }

    async fn edges_from(&self, id: &Uuid) -> Result<Vec<AssetDependency>, AssetError> {
        self.backend
            .assets()
            .dependencies_of(id)
            .await
            .map_err(|e| AssetError::StorageError(e.to_string()))
    }

    async fn find(&self, id: &Uuid) -> Result<Option<Asset>, AssetError> {
        self.backend
            .assets()
            .get(id)
            .await
            .map_err(|e| AssetError::StorageError(e.to_string()))
    }
}

fn clean_tag(tag: &str) -> Result<String, AssetError> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(AssetError::Validation("tag cannot be empty".to_string()));
    }
    Ok(tag.to_string())
}

/// Trimmed, non-empty, first occurrence wins.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}
