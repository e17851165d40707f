//! Personality and role catalog handlers.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use uuid::Uuid;

use kindred_types::personality::{CreatePersonalityRequest, Personality, PersonalityTemplate};
use kindred_types::role::{CreateRoleRequest, Role, RoleTemplate};

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// Body for catalog creation: a template key, or a full custom definition.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CatalogCreate<T> {
    Template { template: String },
    Custom(T),
}

/// GET /api/v1/personalities
pub async fn list_personalities(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<ApiResponse<Vec<Personality>>, AppError> {
    let timer = RequestTimer::start();
    Ok(timer
        .finish(state.personalities.list().await?)
        .with_link("templates", "/api/v1/personalities/templates"))
}

/// GET /api/v1/personalities/templates
pub async fn personality_templates(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> ApiResponse<&'static [PersonalityTemplate]> {
    RequestTimer::start().finish(state.personalities.templates())
}

/// POST /api/v1/personalities
pub async fn create_personality(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<CatalogCreate<CreatePersonalityRequest>>,
) -> Result<ApiResponse<Personality>, AppError> {
    let timer = RequestTimer::start();
    let personality = match body {
        CatalogCreate::Template { template } => {
            state.personalities.create_from_template(&template).await?
        }
        CatalogCreate::Custom(request) => state.personalities.create_custom(request).await?,
    };
    let id = personality.id;
    Ok(timer
        .finish(personality)
        .created()
        .with_link("self", format!("/api/v1/personalities/{id}")))
}

/// GET /api/v1/personalities/{id}
pub async fn get_personality(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Personality>, AppError> {
    let timer = RequestTimer::start();
    Ok(timer.finish(state.personalities.get(&id).await?))
}

/// POST /api/v1/personalities/init - create every built-in template.
pub async fn init_personalities(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> ApiResponse<BTreeMap<String, Uuid>> {
    let timer = RequestTimer::start();
    timer.finish(state.personalities.initialize_defaults().await)
}

/// GET /api/v1/roles
pub async fn list_roles(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<ApiResponse<Vec<Role>>, AppError> {
    let timer = RequestTimer::start();
    Ok(timer
        .finish(state.roles.list().await?)
        .with_link("templates", "/api/v1/roles/templates"))
}

/// GET /api/v1/roles/templates
pub async fn role_templates(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> ApiResponse<&'static [RoleTemplate]> {
    RequestTimer::start().finish(state.roles.templates())
}

/// POST /api/v1/roles
pub async fn create_role(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<CatalogCreate<CreateRoleRequest>>,
) -> Result<ApiResponse<Role>, AppError> {
    let timer = RequestTimer::start();
    let role = match body {
        CatalogCreate::Template { template } => state.roles.create_from_template(&template).await?,
        CatalogCreate::Custom(request) => state.roles.create_custom(request).await?,
    };
    let id = role.id;
    Ok(timer
        .finish(role)
        .created()
        .with_link("self", format!("/api/v1/roles/{id}")))
}

/// GET /api/v1/roles/{id}
pub async fn get_role(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Role>, AppError> {
    let timer = RequestTimer::start();
    Ok(timer.finish(state.roles.get(&id).await?))
}

/// POST /api/v1/roles/init
pub async fn init_roles(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> ApiResponse<BTreeMap<String, Uuid>> {
    let timer = RequestTimer::start();
    timer.finish(state.roles.initialize_defaults().await)
}

#[derive(Debug, Deserialize)]
pub struct SuggestRolesRequest {
    pub traits: Vec<String>,
}

/// POST /api/v1/roles/suggest - roles whose required traits match.
pub async fn suggest_roles(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<SuggestRolesRequest>,
) -> Result<ApiResponse<Vec<Role>>, AppError> {
    let timer = RequestTimer::start();
    Ok(timer.finish(state.roles.find_suitable(&body.traits).await?))
}
