//! SSE event stream
//!
//! Streams every ResearchEvent on the bus to connected clients. Lagged
//! subscribers skip missed events and keep receiving; the stream ends only
//! when the bus closes.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use tokio::sync::broadcast;

use crate::AppState;

/// GET /events
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.event_bus.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    match Event::default()
                        .event(event.event_type().to_string())
                        .json_data(&event)
                    {
                        Ok(sse_event) => yield Ok(sse_event),
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to serialize SSE event");
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "SSE subscriber lagged; continuing");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
