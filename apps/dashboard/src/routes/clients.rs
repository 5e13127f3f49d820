//! Contact management.
//!
//! ```text
//! GET    /                  list_clients (?status=sent|unsent&niche=)
//! PUT    /{id}              update_client
//! DELETE /{id}              delete_client
//! POST   /{id}/regenerate   regenerate_client
//! POST   /{id}/send         send_client
//! ```

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use outreach_shared::{Contact, ContactPatch, OutreachError};
use outreach_storage::{ContactFilter, SentFilter};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppResult;
use crate::state::AppState;

/// Query parameters for listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub niche: Option<String>,
}

impl ListParams {
    /// Unknown status values list everything, as does `niche=all`.
    fn into_filter(self) -> ContactFilter {
        let status = match self.status.as_deref() {
            Some("sent") => Some(SentFilter::Sent),
            Some("unsent") => Some(SentFilter::Unsent),
            _ => None,
        };
        ContactFilter {
            status,
            niche: self.niche,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClientResponse {
    pub success: bool,
    pub client: Contact,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct SendOneResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_clients))
        .route("/{id}", put(update_client).delete(delete_client))
        .route("/{id}/regenerate", post(regenerate_client))
        .route("/{id}/send", post(send_client))
}

/// GET /api/clients
async fn list_clients(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Vec<Contact>>> {
    let contacts = state
        .pipeline
        .contacts()
        .list_filtered(&params.into_filter())
        .await?;
    Ok(Json(contacts))
}

/// PUT /api/clients/{id}
async fn update_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ContactPatch>, JsonRejection>,
) -> AppResult<Json<ClientResponse>> {
    let Json(patch) = payload?;
    let client = state.pipeline.contacts().update(&id, patch).await?;
    Ok(Json(ClientResponse {
        success: true,
        client,
    }))
}

/// DELETE /api/clients/{id}
async fn delete_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DeleteResponse>> {
    if !state.pipeline.contacts().delete(&id).await? {
        return Err(OutreachError::not_found("Contact", id).into());
    }
    info!(%id, "contact deleted");
    Ok(Json(DeleteResponse { success: true }))
}

/// POST /api/clients/{id}/regenerate
///
/// Shares the automation guard, so it never races a running stage.
async fn regenerate_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ClientResponse>> {
    let _guard = state.begin_stage()?;
    let client = state.pipeline.regenerate_one(&id).await?;
    info!(email = %client.email, "email regenerated");
    Ok(Json(ClientResponse {
        success: true,
        client,
    }))
}

/// POST /api/clients/{id}/send
///
/// A delivery failure is reported in the body, not as an error status.
async fn send_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<SendOneResponse>> {
    let _guard = state.begin_stage()?;
    let detail = state.pipeline.send_one(&id).await?;
    Ok(Json(SendOneResponse {
        success: detail.success,
        error: detail.error,
    }))
}
