//! The four-step wizard.
//!
//! ```text
//! POST /step1-search     search + extract, save candidates
//! POST /step2-generate   draft messages for the step 1 candidates
//! POST /step3-confirm    accept the drafts
//! POST /step4-send       send the drafts that are still unsent
//! POST /reset            back to step 0
//! ```
//!
//! Every step holds the run guard, so overlapping requests get 409.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Json, Router};
use outreach_core::stages::confirm_stage;
use outreach_shared::{OutreachError, SearchParams};
use serde::Serialize;
use tracing::{error, info};

use crate::error::{AppError, AppResult};
use crate::state::{AppState, LogProgress, Wizard, WizardStatus};

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub success: bool,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub success: bool,
    pub sent: usize,
    pub failed: usize,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/step1-search", post(step1_search))
        .route("/step2-generate", post(step2_generate))
        .route("/step3-confirm", post(step3_confirm))
        .route("/step4-send", post(step4_send))
        .route("/reset", post(reset))
}

/// Flag the wizard as failed before handing the error back.
async fn settle<T>(state: &AppState, step: u8, result: Result<T, OutreachError>) -> AppResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) => {
            error!(step, error = %e, "step failed");
            state.update_wizard(|w| w.status = WizardStatus::Error).await;
            Err(e.into())
        }
    }
}

/// POST /api/automate/step1-search
async fn step1_search(
    State(state): State<AppState>,
    payload: Result<Json<SearchParams>, JsonRejection>,
) -> AppResult<Json<CountResponse>> {
    let Json(params) = payload?;
    params.validate()?;
    let _guard = state.begin_stage()?;

    state.hub.clear_logs();
    let country = params.country.clone();
    state
        .update_wizard(|w| {
            *w = Wizard::default();
            w.status = WizardStatus::Running;
            w.current_step = 1;
            w.country = Some(country);
        })
        .await;
    info!(niche = %params.niche, country = %params.country, "Starting step 1: web search");

    let result = state.pipeline.search_and_extract(&params, &LogProgress).await;
    let extracted = settle(&state, 1, result).await?;
    let count = extracted.len();
    info!(count, "Step 1 complete");

    state
        .update_wizard(|w| {
            w.stats.found = count;
            w.extracted = extracted;
            w.status = WizardStatus::Idle;
        })
        .await;
    Ok(Json(CountResponse { success: true, count }))
}

/// POST /api/automate/step2-generate
async fn step2_generate(State(state): State<AppState>) -> AppResult<Json<CountResponse>> {
    let _guard = state.begin_stage()?;

    let (candidates, country) = {
        let wizard = state.wizard.lock().await;
        (wizard.extracted.clone(), wizard.country.clone())
    };
    if candidates.is_empty() {
        return Err(AppError::BadRequest("No clients found in Step 1".into()));
    }

    state
        .update_wizard(|w| {
            w.status = WizardStatus::Running;
            w.current_step = 2;
        })
        .await;
    info!(count = candidates.len(), "Starting step 2: generating emails");

    let result = state
        .pipeline
        .generate_and_save(candidates, country.as_deref(), &LogProgress)
        .await;
    let generated = settle(&state, 2, result).await?;
    let count = generated.len();
    info!(count, "Step 2 complete");

    state
        .update_wizard(|w| {
            w.stats.generated = count;
            w.generated = generated;
            w.status = WizardStatus::Idle;
        })
        .await;
    Ok(Json(CountResponse { success: true, count }))
}

/// POST /api/automate/step3-confirm
async fn step3_confirm(State(state): State<AppState>) -> AppResult<Json<SuccessResponse>> {
    let _guard = state.begin_stage()?;

    state
        .update_wizard(|w| {
            w.stats.saved = confirm_stage(&w.generated);
            w.current_step = 3;
        })
        .await;
    info!("Step 3: generated emails confirmed");
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/automate/step4-send
async fn step4_send(State(state): State<AppState>) -> AppResult<Json<SendResponse>> {
    let _guard = state.begin_stage()?;

    let generated = state.wizard.lock().await.generated.clone();
    if generated.is_empty() {
        return Err(AppError::BadRequest("No generated emails to send".into()));
    }

    state
        .update_wizard(|w| {
            w.status = WizardStatus::Running;
            w.current_step = 4;
        })
        .await;
    info!(count = generated.len(), "Starting step 4: sending emails");

    let result = state.pipeline.send_generated(&generated, &LogProgress).await;
    let report = settle(&state, 4, result).await?;
    info!(sent = report.sent, failed = report.failed, "Step 4 complete");

    state
        .update_wizard(|w| {
            w.stats.sent = report.sent;
            w.status = WizardStatus::Completed;
        })
        .await;
    Ok(Json(SendResponse {
        success: true,
        sent: report.sent,
        failed: report.failed,
    }))
}

/// POST /api/automate/reset
async fn reset(State(state): State<AppState>) -> AppResult<Json<SuccessResponse>> {
    let _guard = state.begin_stage()?;

    state.hub.clear_logs();
    state.update_wizard(|w| *w = Wizard::default()).await;
    Ok(Json(SuccessResponse { success: true }))
}
