//! Dashboard statistics and service status endpoints.

use axum::extract::State;
use serde::Serialize;

use kindred_types::llm::LlmStatus;

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Stats {
    pub characters: u64,
    pub personalities: usize,
    pub roles: usize,
    pub conversations: u64,
    pub open_conversations: i64,
    pub interactions: u64,
    pub memories: u64,
    pub media: u64,
    pub assets: u64,
    pub running_scenes: usize,
    pub call_in_progress: bool,
    pub messenger_enabled: bool,
    pub semantic_memory: bool,
    pub event_subscribers: usize,
}

/// GET /api/v1/stats - aggregate counts for the dashboard.
pub async fn get_stats(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<ApiResponse<Stats>, AppError> {
    let timer = RequestTimer::start();

    let (open_conversations,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM conversations WHERE ended_at IS NULL")
            .fetch_one(&state.db_pool.reader)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to count open conversations: {e}")))?;

    let stats = Stats {
        characters: state.characters.count().await?,
        personalities: state.personalities.list().await?.len(),
        roles: state.roles.list().await?.len(),
        conversations: state.conversations.count().await?,
        open_conversations,
        interactions: state.interactions.count().await?,
        memories: state.memory.count(None).await?,
        media: state.media.count().await?,
        assets: state.assets.stats().await?.total_assets,
        running_scenes: state.scenes.list_active().await.len(),
        call_in_progress: state.calls.status().await.is_some(),
        messenger_enabled: state.messenger.is_enabled().await,
        semantic_memory: state.memory.semantic_enabled(),
        event_subscribers: state.events.subscriber_count(),
    };

    Ok(timer
        .finish(stats)
        .with_link("self", "/api/v1/stats")
        .with_link("characters", "/api/v1/characters"))
}

/// GET /api/v1/llm - LM Studio reachability and models.
pub async fn llm_status(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> ApiResponse<LlmStatus> {
    let timer = RequestTimer::start();
    timer.finish(state.llm.status().await)
}
