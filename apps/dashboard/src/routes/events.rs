use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::events::DashboardEvent;
use crate::state::AppState;

/// Log lines replayed to a new subscriber.
const REPLAY_LOGS: usize = 50;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(stream_events))
}

/// GET /api/events
///
/// Sends the current wizard state and recent log lines, then live events.
/// A subscriber that lags behind the channel skips the missed events.
async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    // Subscribe first so nothing published during the replay is lost.
    let live = BroadcastStream::new(state.hub.subscribe()).filter_map(Result::ok);

    let mut replay = vec![DashboardEvent::State(state.wizard.lock().await.snapshot())];
    replay.extend(
        state
            .hub
            .recent_logs(REPLAY_LOGS)
            .into_iter()
            .map(DashboardEvent::Log),
    );

    let stream = tokio_stream::iter(replay)
        .chain(live)
        .map(|event| Event::default().json_data(event));

    Sse::new(stream).keep_alive(KeepAlive::default())
}
