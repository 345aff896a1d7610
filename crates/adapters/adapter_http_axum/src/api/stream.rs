//! Server-Sent Events (SSE) push channel for real-time updates.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use fitbridge_app::ports::source::DeviceSource;
use fitbridge_app::ports::{
    ActivityEncoder, DeviceCacheRepository, EventPublisher, SampleRepository, WorkoutRepository,
};

use crate::state::AppState;

/// `GET /api/events/stream` — SSE stream of real-time bridge events.
///
/// Subscribes to the event bus broadcast channel and sends JSON-encoded
/// events as SSE `data:` frames. The stream continues until the client
/// disconnects or the event bus is closed.
pub async fn stream<L, S, WR, SR, DR, EP, E>(
    State(state): State<AppState<L, S, WR, SR, DR, EP, E>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>>
where
    L: DeviceSource + Send + Sync + 'static,
    S: DeviceSource + Send + Sync + 'static,
    WR: WorkoutRepository + Send + Sync + 'static,
    SR: SampleRepository + Send + Sync + 'static,
    DR: DeviceCacheRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    E: ActivityEncoder + Send + Sync + 'static,
{
    let event_rx = state.event_bus.subscribe();
    let event_stream = BroadcastStream::new(event_rx).filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json) => Some(Ok(Event::default().data(json))),
            Err(err) => {
                tracing::warn!(%err, "failed to serialize event to JSON for SSE stream");
                None
            }
        },
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(n)) => {
            tracing::warn!(
                skipped = n,
                "SSE subscriber lagged, some events were dropped"
            );
            None
        }
    });

    Sse::new(event_stream).keep_alive(KeepAlive::default())
}
