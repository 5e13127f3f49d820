//! GET/POST /api/settings over the flat key view.
//!
//! Saved values are written to the config file; the running pipeline keeps
//! the settings it was started with.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::get;
use axum::{Json, Router};
use outreach_shared::save_config_to;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::error::AppResult;
use crate::settings::{FlatSettings, apply, flatten};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub success: bool,
    pub restart_required: bool,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_settings).post(save_settings))
}

async fn get_settings(State(state): State<AppState>) -> Json<FlatSettings> {
    Json(flatten(&*state.config.read().await))
}

async fn save_settings(
    State(state): State<AppState>,
    payload: Result<Json<BTreeMap<String, Value>>, JsonRejection>,
) -> AppResult<Json<SaveResponse>> {
    let Json(form) = payload?;

    let mut config = state.config.write().await;
    let mut updated = config.clone();
    apply(&mut updated, &form)?;
    save_config_to(&updated, &state.config_path)?;
    *config = updated;

    info!(path = %state.config_path.display(), "settings saved");
    Ok(Json(SaveResponse {
        success: true,
        restart_required: true,
    }))
}
