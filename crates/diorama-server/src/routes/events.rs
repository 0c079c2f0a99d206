use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::state::AppState;

/// GET /api/events: SSE stream that emits a `state` event with the JSON
/// `StateChange` whenever the scene state is set.
pub async fn sse_events(State(app): State<AppState>) -> impl axum::response::IntoResponse {
    let rx = app.orchestrator.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| {
        let change = msg.ok()?;
        let event = Event::default()
            .event("state")
            .id(change.id.to_string())
            .json_data(&change)
            .ok()?;
        Some(Ok::<Event, Infallible>(event))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
