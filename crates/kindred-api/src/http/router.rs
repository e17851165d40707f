//! Axum router configuration with middleware.
//!
//! Versioned routes live under `/api/v1/`; the unversioned `/api/...` routes
//! used by the phone and bedroom pages sit beside them.
//! Middleware: CORS, tracing.
//!
//! When a built web client exists in `web/` (configurable via
//! `KINDRED_WEB_DIR`) it is served for every path the API does not claim.

use axum::Router;
use axum::routing::{delete, get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Characters
        .route(
            "/characters",
            get(handlers::character::list_characters).post(handlers::character::create_character),
        )
        .route(
            "/characters/{id}",
            get(handlers::character::get_character)
                .put(handlers::character::update_character)
                .delete(handlers::character::delete_character),
        )
        .route(
            "/characters/{id}/state",
            get(handlers::character::get_state).patch(handlers::character::update_state),
        )
        .route("/characters/{id}/tags", post(handlers::character::add_tag))
        .route(
            "/characters/{id}/tags/{tag}",
            delete(handlers::character::remove_tag),
        )
        // Conversations and chat
        .route(
            "/characters/{id}/conversations",
            get(handlers::conversation::list_conversations)
                .post(handlers::conversation::start_conversation),
        )
        .route(
            "/characters/{id}/messages",
            post(handlers::message::send_message),
        )
        .route(
            "/characters/{id}/messages/stream",
            post(handlers::message::stream_message),
        )
        .route(
            "/characters/{id}/interactions",
            get(handlers::conversation::list_interactions),
        )
        .route("/conversations/{id}", get(handlers::conversation::get_conversation))
        .route(
            "/conversations/{id}/end",
            post(handlers::conversation::end_conversation),
        )
        .route("/interactions", get(handlers::conversation::recent_interactions))
        .route(
            "/interactions/chains/{chain_id}",
            get(handlers::conversation::interaction_chain),
        )
        // Memory
        .route(
            "/characters/{id}/memories",
            get(handlers::memory::list_memories)
                .post(handlers::memory::add_memory)
                .delete(handlers::memory::clear_memories),
        )
        .route(
            "/characters/{id}/memories/search",
            post(handlers::memory::search_memories),
        )
        .route(
            "/characters/{id}/memories/context",
            get(handlers::memory::memory_context),
        )
        .route(
            "/memories/{id}",
            get(handlers::memory::get_memory).delete(handlers::memory::delete_memory),
        )
        // Media and voicemail
        .route("/characters/{id}/media", get(handlers::media::list_media))
        .route("/characters/{id}/selfie", post(handlers::media::take_selfie))
        .route("/characters/{id}/voice", post(handlers::media::leave_voice_message))
        .route(
            "/characters/{id}/voicemails",
            get(handlers::media::list_voicemails),
        )
        .route(
            "/voicemails/{id}/listened",
            post(handlers::media::mark_listened),
        )
        .route("/media/status", get(handlers::media::media_status))
        .route("/media/{id}", get(handlers::media::get_media))
        .route("/media/{id}/file", get(handlers::media::media_file))
        // Anonymous contact
        .route(
            "/anonymous",
            get(handlers::anonymous::get_contact).post(handlers::anonymous::summon),
        )
        .route("/anonymous/silence", post(handlers::anonymous::silence))
        .route("/anonymous/wake", post(handlers::anonymous::wake))
        .route(
            "/anonymous/messages",
            get(handlers::anonymous::thread).post(handlers::anonymous::reply),
        )
        .route("/anonymous/initiate", post(handlers::anonymous::initiate))
        // Autonomous messenger
        .route("/messenger", get(handlers::messenger::messenger_status))
        .route("/messenger/enable", post(handlers::messenger::enable_messenger))
        .route("/messenger/disable", post(handlers::messenger::disable_messenger))
        .route(
            "/characters/{id}/messenger",
            get(handlers::messenger::get_registration)
                .put(handlers::messenger::register)
                .delete(handlers::messenger::unregister),
        )
        .route(
            "/characters/{id}/messenger/send",
            post(handlers::messenger::send_now),
        )
        // Personalities and roles
        .route(
            "/personalities",
            get(handlers::catalog::list_personalities).post(handlers::catalog::create_personality),
        )
        .route(
            "/personalities/templates",
            get(handlers::catalog::personality_templates),
        )
        .route("/personalities/init", post(handlers::catalog::init_personalities))
        .route("/personalities/{id}", get(handlers::catalog::get_personality))
        .route(
            "/roles",
            get(handlers::catalog::list_roles).post(handlers::catalog::create_role),
        )
        .route("/roles/templates", get(handlers::catalog::role_templates))
        .route("/roles/init", post(handlers::catalog::init_roles))
        .route("/roles/suggest", post(handlers::catalog::suggest_roles))
        .route("/roles/{id}", get(handlers::catalog::get_role))
        // Assets
        .route(
            "/assets",
            get(handlers::asset::list_assets).post(handlers::asset::save_asset),
        )
        .route("/assets/stats", get(handlers::asset::asset_stats))
        .route("/assets/orphans", get(handlers::asset::list_orphans))
        .route(
            "/assets/{id}",
            get(handlers::asset::get_asset).delete(handlers::asset::delete_asset),
        )
        .route("/assets/{id}/tags", post(handlers::asset::add_asset_tag))
        .route(
            "/assets/{id}/tags/{tag}",
            delete(handlers::asset::remove_asset_tag),
        )
        .route(
            "/assets/{id}/dependencies",
            get(handlers::asset::list_dependencies).post(handlers::asset::add_dependency),
        )
        .route(
            "/assets/{id}/dependents",
            get(handlers::asset::list_dependents),
        )
        // Scenes
        .route(
            "/scenes",
            get(handlers::scene::list_scenes).post(handlers::scene::create_scene),
        )
        .route("/scenes/kinds", get(handlers::scene::list_kinds))
        .route("/scenes/load", post(handlers::scene::load_scene))
        .route("/scenes/definitions", post(handlers::scene::save_definition))
        .route("/scenes/stop", post(handlers::scene::stop_all_scenes))
        .route("/scenes/{id}", get(handlers::scene::get_scene))
        .route("/scenes/{id}/stop", post(handlers::scene::stop_scene))
        // Calls
        .route(
            "/calls",
            get(handlers::call::call_history).post(handlers::call::start_call),
        )
        .route("/calls/current", get(handlers::call::current_call))
        .route("/calls/{id}/answer", post(handlers::call::answer_call))
        .route("/calls/{id}/say", post(handlers::call::say))
        .route("/calls/{id}/end", post(handlers::call::end_call))
        // Push channel, status
        .route("/events", get(handlers::events::event_stream))
        .route("/stats", get(handlers::stats::get_stats))
        .route("/llm", get(handlers::stats::llm_status));

    let legacy_routes = Router::new()
        .route("/characters/list", get(handlers::legacy::list_characters))
        .route("/character/set", post(handlers::legacy::set_character))
        .route("/send_message", post(handlers::legacy::send_message))
        .route("/start_call", post(handlers::legacy::start_call));

    let mut router = Router::new()
        .nest("/api/v1", api_routes)
        .nest("/api", legacy_routes)
        .route("/stats", get(handlers::stats::get_stats))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let web_dir = std::env::var("KINDRED_WEB_DIR").unwrap_or_else(|_| "web".to_string());
    if std::path::Path::new(&web_dir).exists() {
        let index_path = format!("{}/index.html", web_dir);
        let serve_dir = ServeDir::new(&web_dir).fallback(ServeFile::new(index_path));
        router = router.fallback_service(serve_dir);
        tracing::info!(path = %web_dir, "web client static file serving enabled");
    }

    router
}

/// GET /health - Simple health check endpoint (no auth required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::state::tests::offline_state;

    async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let (state, _dir) = offline_state().await;
        let router = build_router(state);

        let (status, body) = call(&router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_then_fetch_character() {
        let (state, _dir) = offline_state().await;
        let router = build_router(state);

        let (status, created) = call(
            &router,
            "POST",
            "/api/v1/characters",
            Some(json!({ "name": "Luna", "age": 24, "hair_color": "silver", "tags": ["night"] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["data"]["id"].as_str().unwrap().to_string();
        assert!(created["_links"]["self"].as_str().unwrap().ends_with(&id));

        let (status, fetched) = call(&router, "GET", &format!("/api/v1/characters/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["data"]["name"], "Luna");
        assert_eq!(fetched["data"]["age"], 24);
        assert_eq!(fetched["data"]["hair_color"], "silver");
        assert_eq!(fetched["data"]["tags"], json!(["night"]));

        // Names resolve too.
        let (status, by_name) = call(&router, "GET", "/api/v1/characters/Luna", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(by_name["data"]["id"], id.as_str());
    }

    #[tokio::test]
    async fn test_unknown_character_is_404_envelope() {
        let (state, _dir) = offline_state().await;
        let router = build_router(state);

        let (status, body) = call(&router, "GET", "/api/v1/characters/Nobody", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["data"].is_null());
        assert_eq!(body["errors"][0]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_message_falls_back_when_llm_unreachable() {
        let (state, _dir) = offline_state().await;
        let router = build_router(state);
        call(&router, "POST", "/api/v1/characters", Some(json!({ "name": "Mia" }))).await;

        let (status, body) = call(
            &router,
            "POST",
            "/api/v1/characters/Mia/messages",
            Some(json!({ "message": "how was your day?" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["fallback"], true);
        assert!(!body["data"]["content"].as_str().unwrap().is_empty());

        let conversation = body["data"]["conversation_id"].as_str().unwrap();
        let (_, conv) = call(&router, "GET", &format!("/api/v1/conversations/{conversation}"), None).await;
        assert_eq!(conv["data"]["messages"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_oversized_message_rejected_on_every_route() {
        let (state, _dir) = offline_state().await;
        let router = build_router(state);
        call(&router, "POST", "/api/v1/characters", Some(json!({ "name": "Mia" }))).await;
        let long = "a".repeat(10_001);

        for uri in [
            "/api/v1/characters/Mia/messages",
            "/api/v1/characters/Mia/messages/stream",
            "/api/send_message",
        ] {
            let (status, body) = call(
                &router,
                "POST",
                uri,
                Some(json!({ "message": long, "character_id": "Mia" })),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["errors"][0]["code"], "VALIDATION_ERROR", "{uri}");
        }
    }

    #[tokio::test]
    async fn test_memory_search_accepts_huge_n() {
        let (state, _dir) = offline_state().await;
        let router = build_router(state);
        call(&router, "POST", "/api/v1/characters", Some(json!({ "name": "Mia" }))).await;

        let (status, _) = call(
            &router,
            "POST",
            "/api/v1/characters/Mia/memories/search",
            Some(json!({ "query": "coffee", "n": u64::MAX, "kind": "fact" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_anonymous_contact_over_http() {
        let (state, _dir) = offline_state().await;
        let router = build_router(state);

        let (status, body) = call(&router, "GET", "/api/v1/anonymous", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["errors"][0]["code"], "NOT_FOUND");

        let (status, body) = call(
            &router,
            "POST",
            "/api/v1/anonymous",
            Some(json!({ "persona": "secret_admirer" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["persona"], "secret_admirer");
        assert_eq!(body["data"]["display_name"], "Unknown ❤");

        // The LLM is unreachable, so the contact answers with a canned line.
        let (status, body) = call(
            &router,
            "POST",
            "/api/v1/anonymous/messages",
            Some(json!({ "message": "who is this?" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["direction"], "outgoing");
        assert_eq!(body["data"]["fallback"], true);

        let (_, thread) = call(&router, "GET", "/api/v1/anonymous/messages", None).await;
        let thread = thread["data"].as_array().unwrap();
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0]["direction"], "incoming");
        assert_eq!(thread[0]["content"], "who is this?");

        call(&router, "POST", "/api/v1/anonymous/silence", None).await;
        let (status, body) = call(&router, "POST", "/api/v1/anonymous/initiate", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["errors"][0]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_auth_required_when_enabled() {
        let (state, _dir) = offline_state().await;
        let (key, _) = state.api_keys.create("test").await.unwrap();
        let mut config = (*state.config).clone();
        config.server.require_auth = true;
        let state = AppState {
            config: std::sync::Arc::new(config),
            ..state
        };
        let router = build_router(state);

        let (status, body) = call(&router, "GET", "/api/v1/characters", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["errors"][0]["code"], "UNAUTHORIZED");

        let request = Request::builder()
            .uri("/api/v1/characters")
            .header("x-api-key", key.as_str())
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (status, _) = call(&router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_legacy_select_then_list() {
        let (state, _dir) = offline_state().await;
        let router = build_router(state);
        let (_, created) = call(&router, "POST", "/api/v1/characters", Some(json!({ "name": "Ivy" }))).await;
        let id = created["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = call(&router, "POST", "/api/send_message", Some(json!({ "message": "hi" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["message"], "No active character");

        let (status, body) = call(
            &router,
            "POST",
            "/api/character/set",
            Some(json!({ "character_id": id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["character"]["name"], "Ivy");

        let (_, list) = call(&router, "GET", "/api/characters/list", None).await;
        assert_eq!(list["characters"].as_array().unwrap().len(), 1);
        assert_eq!(list["current"], id.as_str());

        let (status, reply) = call(&router, "POST", "/api/send_message", Some(json!({ "message": "hi" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["character_id"], id.as_str());
    }

    #[tokio::test]
    async fn test_legacy_outgoing_call_is_answered() {
        let (state, _dir) = offline_state().await;
        let router = build_router(state);
        call(&router, "POST", "/api/v1/characters", Some(json!({ "name": "Nova" }))).await;

        let (status, body) = call(
            &router,
            "POST",
            "/api/start_call",
            Some(json!({ "type": "outgoing", "character_id": "Nova" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["character"], "Nova");
        assert!(body["greeting"].as_str().is_some());

        let (_, current) = call(&router, "GET", "/api/v1/calls/current", None).await;
        assert_eq!(current["data"]["id"], body["call_id"]);

        let (status, _) = call(
            &router,
            "POST",
            "/api/start_call",
            Some(json!({ "character_id": "Nova" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_asset_with_dependents_refuses_delete() {
        let (state, _dir) = offline_state().await;
        let router = build_router(state);

        let message = |sender: &str| {
            json!({
                "asset_type": "message",
                "data": { "conversation_id": "c1", "sender": sender, "text": "hello" },
            })
        };
        let (status, first) = call(&router, "POST", "/api/v1/assets", Some(message("user"))).await;
        assert_eq!(status, StatusCode::CREATED);
        let (_, second) = call(&router, "POST", "/api/v1/assets", Some(message("character"))).await;
        let first_id = first["data"]["id"].as_str().unwrap().to_string();
        let second_id = second["data"]["id"].as_str().unwrap().to_string();

        let (status, _) = call(
            &router,
            "POST",
            &format!("/api/v1/assets/{second_id}/dependencies"),
            Some(json!({ "target_id": first_id, "dependency_type": "reply_to" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(&router, "DELETE", &format!("/api/v1/assets/{first_id}"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["errors"][0]["code"], "CONFLICT");

        let (status, body) = call(
            &router,
            "DELETE",
            &format!("/api/v1/assets/{first_id}?cascade=true"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["deleted"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stats_counts_characters() {
        let (state, _dir) = offline_state().await;
        let router = build_router(state);
        call(&router, "POST", "/api/v1/characters", Some(json!({ "name": "Ada" }))).await;

        let (status, body) = call(&router, "GET", "/api/v1/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["characters"], 1);
    }
}
