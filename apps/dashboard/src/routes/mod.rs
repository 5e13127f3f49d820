pub mod automate;
pub mod clients;
pub mod events;
pub mod health;
pub mod settings;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use outreach_storage::ContactStats;

use crate::error::AppResult;
use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /events                  SSE stream of wizard state and logs
/// /automate/...            wizard steps, see [`automate`]
/// /clients/...             contact management, see [`clients`]
/// /settings                flat settings view (GET, POST)
/// /stats                   contact counters
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/events", events::router())
        .nest("/automate", automate::router())
        .nest("/clients", clients::router())
        .nest("/settings", settings::router())
        .route("/stats", get(stats))
}

/// GET /api/stats
async fn stats(State(state): State<AppState>) -> AppResult<Json<ContactStats>> {
    Ok(Json(state.pipeline.contacts().stats().await?))
}
