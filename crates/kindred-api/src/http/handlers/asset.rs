//! Asset library handlers: versioned save/load, tags and dependencies.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use uuid::Uuid;

use kindred_types::asset::{Asset, AssetDependency, AssetStats, SaveAssetRequest};

use super::character::TagRequest;
use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::extractors::query::{
    AssetDeleteQuery, AssetGetQuery, AssetListQuery, DependencyQuery, OrphanQuery,
};
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// GET /api/v1/assets?type=&tags=a,b&limit=&offset=
pub async fn list_assets(
    State(state): State<AppState>,
    _auth: Authenticated,
    Query(query): Query<AssetListQuery>,
) -> Result<ApiResponse<Vec<Asset>>, AppError> {
    let timer = RequestTimer::start();
    let search = query.to_search()?;
    Ok(timer
        .finish(state.assets.search(&search).await?)
        .with_link("stats", "/api/v1/assets/stats"))
}

/// POST /api/v1/assets - new asset, or a new version when `id` is set.
pub async fn save_asset(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<SaveAssetRequest>,
) -> Result<ApiResponse<Asset>, AppError> {
    let timer = RequestTimer::start();
    let asset = state.assets.save(body).await?;
    let id = asset.id;
    Ok(timer
        .finish(asset)
        .created()
        .with_link("self", format!("/api/v1/assets/{id}")))
}

/// GET /api/v1/assets/{id}?version=
pub async fn get_asset(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
    Query(query): Query<AssetGetQuery>,
) -> Result<ApiResponse<Asset>, AppError> {
    let timer = RequestTimer::start();
    Ok(timer
        .finish(state.assets.load(&id, query.version).await?)
        .with_link("dependencies", format!("/api/v1/assets/{id}/dependencies"))
        .with_link("dependents", format!("/api/v1/assets/{id}/dependents")))
}

/// DELETE /api/v1/assets/{id}?cascade=true
///
/// Refused with 409 while other assets depend on it, unless cascading.
pub async fn delete_asset(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
    Query(query): Query<AssetDeleteQuery>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();
    let deleted = state.assets.delete(&id, query.cascade).await?;
    Ok(timer.finish(serde_json::json!({ "deleted": deleted })))
}

/// POST /api/v1/assets/{id}/tags
pub async fn add_asset_tag(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
    Json(body): Json<TagRequest>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();
    let added = state.assets.add_tag(&id, &body.tag).await?;
    Ok(timer.finish(serde_json::json!({ "tag": body.tag, "added": added })))
}

/// DELETE /api/v1/assets/{id}/tags/{tag}
pub async fn remove_asset_tag(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path((id, tag)): Path<(Uuid, String)>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();
    let removed = state.assets.remove_tag(&id, &tag).await?;
    Ok(timer.finish(serde_json::json!({ "tag": tag, "removed": removed })))
}

#[derive(Debug, Deserialize)]
pub struct DependencyRequest {
    pub target_id: Uuid,
    pub dependency_type: Option<String>,
}

/// POST /api/v1/assets/{id}/dependencies
pub async fn add_dependency(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
    Json(body): Json<DependencyRequest>,
) -> Result<ApiResponse<AssetDependency>, AppError> {
    let timer = RequestTimer::start();
    let dependency = state
        .assets
        .add_dependency(&id, &body.target_id, body.dependency_type.as_deref())
        .await?;
    Ok(timer.finish(dependency).created())
}

/// GET /api/v1/assets/{id}/dependencies?recursive=true
pub async fn list_dependencies(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
    Query(query): Query<DependencyQuery>,
) -> Result<ApiResponse<Vec<AssetDependency>>, AppError> {
    let timer = RequestTimer::start();
    Ok(timer.finish(state.assets.dependencies(&id, query.recursive).await?))
}

/// GET /api/v1/assets/{id}/dependents
pub async fn list_dependents(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Vec<AssetDependency>>, AppError> {
    let timer = RequestTimer::start();
    Ok(timer.finish(state.assets.dependents(&id).await?))
}

/// GET /api/v1/assets/orphans?type=
pub async fn list_orphans(
    State(state): State<AppState>,
    _auth: Authenticated,
    Query(query): Query<OrphanQuery>,
) -> Result<ApiResponse<Vec<Asset>>, AppError> {
    let timer = RequestTimer::start();
    let asset_type = query
        .asset_type
        .as_deref()
        .map(|t| t.parse().map_err(AppError::Validation))
        .transpose()?;
    Ok(timer.finish(state.assets.find_orphans(asset_type).await?))
}

/// GET /api/v1/assets/stats
pub async fn asset_stats(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<ApiResponse<AssetStats>, AppError> {
    let timer = RequestTimer::start();
    Ok(timer.finish(state.assets.stats().await?))
}
