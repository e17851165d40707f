//! Chat endpoints: one-shot replies and SSE-streamed replies.
//!
//! POST /api/v1/characters/{id}/messages/stream emits:
//! - `turn` with `{ "conversation_id": "..." }`
//! - `text_delta` with `{ "text": "..." }`
//! - `reply` with the final `ChatReply`
//! - `error` with `{ "message": "..." }`
//! - `done` with `{}`
//!
//! Photo and voice requests are not streamed; they produce a single `reply`.

use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::Stream;

use kindred_core::llm::fallback;
use kindred_core::llm::intent::parse_intent;
use kindred_types::chat::{ChatReply, Intent, SendMessageRequest};
use kindred_types::llm::StreamEvent;

use super::{checked_message, resolve_character};
use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// POST /api/v1/characters/{id}/messages
pub async fn send_message(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(reference): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<ApiResponse<ChatReply>, AppError> {
    let timer = RequestTimer::start();
    let message = checked_message(&body.message)?;
    let character = resolve_character(&state, &reference).await?;
    let reply = state.chat.send_message(&character.id, message).await?;
    let conversation_id = reply.conversation_id;
    Ok(timer
        .finish(reply)
        .with_link("conversation", format!("/api/v1/conversations/{conversation_id}")))
}

fn json_event(name: &str, data: &impl serde::Serialize) -> Event {
    let data = serde_json::to_string(data).unwrap_or_else(|_| "{}".to_string());
    Event::default().event(name).data(data)
}

/// POST /api/v1/characters/{id}/messages/stream
pub async fn stream_message(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(reference): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let message = checked_message(&body.message)?;
    let character = resolve_character(&state, &reference).await?;
    let chat = state.chat.clone();

    if matches!(
        parse_intent(message),
        Intent::Selfie { .. } | Intent::VoiceMessage { .. }
    ) {
        let reply = chat.send_message(&character.id, message).await?;
        let sse_stream = async_stream::stream! {
            yield Ok::<_, Infallible>(json_event("turn", &serde_json::json!({ "conversation_id": reply.conversation_id })));
            yield Ok(json_event("reply", &reply));
            yield Ok(Event::default().event("done").data("{}"));
        };
        return Ok(Sse::new(sse_stream.boxed()).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))));
    }

    let turn = chat.prepare_turn(&character.id, message).await?;
    let request = chat.request_for(&turn).await;
    let llm_stream = chat.llm().stream(request);
    let conversation_id = turn.conversation.id;

    // The turn is driven by its own task so the reply is recorded even when
    // the client goes away mid-stream. Send errors only mean nobody listens.
    let (tx, mut rx) = mpsc::channel::<Event>(64);
    tokio::spawn(async move {
        let mut full_response = String::new();
        let mut llm_stream = llm_stream;
        while let Some(event_result) = llm_stream.next().await {
            match event_result {
                Ok(StreamEvent::TextDelta { text }) => {
                    let _ = tx
                        .send(json_event("text_delta", &serde_json::json!({ "text": text })))
                        .await;
                    full_response.push_str(&text);
                }
                Ok(StreamEvent::Done) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(character = %turn.character.name, error = %e, "reply stream failed");
                    break;
                }
            }
        }

        let content = full_response.trim().to_string();
        let (content, fallback) = if content.is_empty() {
            (fallback::for_mood(turn.state.mood), true)
        } else {
            (content, false)
        };

        let last = match chat.complete_turn(turn, content, fallback).await {
            Ok(reply) => json_event("reply", &reply),
            Err(e) => {
                tracing::warn!(error = %e, "failed to record streamed turn");
                json_event("error", &serde_json::json!({ "message": e.to_string() }))
            }
        };
        let _ = tx.send(last).await;
    });

    let sse_stream = async_stream::stream! {
        yield Ok::<_, Infallible>(json_event("turn", &serde_json::json!({ "conversation_id": conversation_id })));
        while let Some(event) = rx.recv().await {
            yield Ok(event);
        }
        yield Ok(Event::default().event("done").data("{}"));
    };

    Ok(Sse::new(sse_stream.boxed()).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
