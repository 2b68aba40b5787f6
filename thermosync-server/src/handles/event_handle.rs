use std::convert::Infallible;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::response::Sse;
use axum::response::sse::{Event, KeepAlive};
use axum::routing::get;
use tokio::sync::watch;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::control::cancelled;
use crate::services::TelemetryService;

#[derive(Clone)]
pub struct EventState {
    pub telemetry: Arc<TelemetryService>,
    pub shutdown: watch::Receiver<bool>,
}

pub fn event_router(event_state: EventState) -> Router {
    Router::new()
        .route("/events", get(stream_events))
        .with_state(event_state)
}

/// Live control events. A client that falls behind skips what it missed.
/// The stream ends once the service starts shutting down.
pub async fn stream_events(
    State(state): State<EventState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.telemetry.subscribe();
    let mut shutdown = state.shutdown;

    let stream = BroadcastStream::new(receiver).filter_map(|result| match result {
        Ok(event) => match Event::default().event(event.event_type()).json_data(&event) {
            Ok(sse) => Some(Ok(sse)),
            Err(error) => {
                tracing::warn!(event_type = event.event_type(), "could not encode event: {error}");
                None
            }
        },
        Err(lagged) => {
            tracing::debug!("event stream subscriber lagged: {lagged}");
            None
        }
    });
    let stream = futures::StreamExt::take_until(stream, async move {
        cancelled(&mut shutdown).await;
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
