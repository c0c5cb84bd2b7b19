// ABOUTME: SSE log streaming handler for live progress in the browser.
// ABOUTME: Each connection subscribes to the log broadcast channel and receives one data event per line.

use std::convert::Infallible;

use axum::extract::State;
use axum::http::{HeaderName, header};
use axum::response::IntoResponse;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};

use partshelf_core::LogSubscription;

use crate::app_state::SharedState;

/// Convert a log subscription into an SSE-compatible stream.
fn log_stream_from_subscription(
    subscription: LogSubscription,
) -> impl Stream<Item = Result<SseEvent, Infallible>> {
    subscription.into_stream().map(|event| {
        // SSE data may not contain carriage returns
        let text = event.text.replace('\r', "");
        Ok(SseEvent::default().data(text))
    })
}

/// GET /logs - SSE endpoint streaming every log line published after connecting.
pub async fn logs(State(state): State<SharedState>) -> impl IntoResponse {
    let stream = log_stream_from_subscription(state.log.subscribe());
    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(stream).keep_alive(KeepAlive::default()),
    )
}
