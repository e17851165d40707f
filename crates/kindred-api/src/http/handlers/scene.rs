//! Scene handlers: start, load from assets and stop sub-applications.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use uuid::Uuid;

use kindred_types::asset::Asset;
use kindred_types::scene::{CreateSceneRequest, Scene, SceneDefinition, SceneKind};

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// GET /api/v1/scenes - running scenes.
pub async fn list_scenes(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> ApiResponse<Vec<Scene>> {
    let timer = RequestTimer::start();
    timer
        .finish(state.scenes.list_active().await)
        .with_link("kinds", "/api/v1/scenes/kinds")
}

/// GET /api/v1/scenes/kinds - registered scene types.
pub async fn list_kinds(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> ApiResponse<Vec<SceneKind>> {
    RequestTimer::start().finish(state.scenes.list_kinds().await)
}

/// POST /api/v1/scenes
pub async fn create_scene(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<CreateSceneRequest>,
) -> Result<ApiResponse<Scene>, AppError> {
    let timer = RequestTimer::start();
    let scene = state.scenes.create(body).await?;
    let id = scene.id;
    Ok(timer
        .finish(scene)
        .created()
        .with_link("self", format!("/api/v1/scenes/{id}")))
}

#[derive(Debug, Deserialize)]
pub struct LoadSceneRequest {
    pub asset_id: Uuid,
}

/// POST /api/v1/scenes/load - start a scene from a saved definition.
pub async fn load_scene(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<LoadSceneRequest>,
) -> Result<ApiResponse<Scene>, AppError> {
    let timer = RequestTimer::start();
    Ok(timer.finish(state.scenes.load(&body.asset_id).await?).created())
}

#[derive(Debug, Deserialize)]
pub struct SaveDefinitionRequest {
    pub definition: SceneDefinition,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// POST /api/v1/scenes/definitions - store a definition as a scene asset.
pub async fn save_definition(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<SaveDefinitionRequest>,
) -> Result<ApiResponse<Asset>, AppError> {
    let timer = RequestTimer::start();
    let asset = state
        .scenes
        .save_definition(&body.definition, body.tags)
        .await?;
    let id = asset.id;
    Ok(timer
        .finish(asset)
        .created()
        .with_link("asset", format!("/api/v1/assets/{id}")))
}

/// GET /api/v1/scenes/{id}
pub async fn get_scene(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Scene>, AppError> {
    let timer = RequestTimer::start();
    Ok(timer.finish(state.scenes.get(&id).await?))
}

/// POST /api/v1/scenes/{id}/stop
pub async fn stop_scene(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Scene>, AppError> {
    let timer = RequestTimer::start();
    Ok(timer.finish(state.scenes.stop(&id).await?))
}

/// POST /api/v1/scenes/stop - stop everything that is running.
pub async fn stop_all_scenes(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> ApiResponse<serde_json::Value> {
    let timer = RequestTimer::start();
    let stopped = state.scenes.stop_all().await;
    timer.finish(serde_json::json!({ "stopped": stopped }))
}
