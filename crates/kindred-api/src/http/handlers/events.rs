//! Server-sent event stream of everything published on the event bus.
//!
//! GET /api/v1/events. Each event's SSE name is its `type` tag; the data is
//! the full JSON event. A client that falls behind receives a `lagged`
//! event with the number of skipped events and keeps going.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::Stream;

use crate::http::extractors::auth::Authenticated;
use crate::state::AppState;

pub async fn event_stream(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.events.subscribe();
    tracing::debug!(subscribers = state.events.subscriber_count(), "event stream opened");

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
                    yield Ok::<_, Infallible>(Event::default().event(event.name()).data(data));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream subscriber lagged");
                    yield Ok(Event::default().event("lagged").data(format!("{{\"skipped\":{skipped}}}")));
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
