//! Logbook routes. Submitting and reviewing an entry raise domain events.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::types::LogbookEntry;
use bosun_fleet::events;
use bosun_fleet::logbook::{
    CreateLogbookParams, LogbookFilter, LogbookService, ReviewParams, UpdateLogbookParams,
};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/logbook", get(list_entries).post(create_entry))
        .route(
            "/api/logbook/{id}",
            get(get_entry).patch(update_entry).delete(delete_entry),
        )
        .route("/api/logbook/{id}/submit", post(submit_entry))
        .route("/api/logbook/{id}/review", post(review_entry))
}

/// POST /api/logbook — Create a draft entry authored by the caller.
async fn create_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(params): Json<CreateLogbookParams>,
) -> Result<Json<LogbookEntry>, AppError> {
    let entry = LogbookService::create_draft(&state.pool, &auth.actor(), &params).await?;
    Ok(Json(entry))
}

/// GET /api/logbook — Entries, optionally filtered by `yacht_id` and `status`.
async fn list_entries(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<LogbookFilter>,
) -> Result<Json<Vec<LogbookEntry>>, AppError> {
    let entries = LogbookService::list(&state.pool, &auth.actor(), &filter).await?;
    Ok(Json(entries))
}

async fn get_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<LogbookEntry>, AppError> {
    let entry = LogbookService::get(&state.pool, &auth.actor(), id).await?;
    Ok(Json(entry))
}

/// PATCH /api/logbook/{id} — Edit a draft (or rejected) entry.
async fn update_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(params): Json<UpdateLogbookParams>,
) -> Result<Json<LogbookEntry>, AppError> {
    let entry = LogbookService::update(&state.pool, &auth.actor(), id, &params).await?;
    Ok(Json(entry))
}

/// DELETE /api/logbook/{id} — Delete a draft entry.
async fn delete_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if LogbookService::delete(&state.pool, &auth.actor(), id).await? {
        Ok(Json(json!({"deleted": true})))
    } else {
        Err(AppError::NotFound(format!("Logbook entry {} not found", id)))
    }
}

/// POST /api/logbook/{id}/submit — Hand a draft to the reviewers.
async fn submit_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<LogbookEntry>, AppError> {
    let entry = LogbookService::submit(&state.pool, &auth.actor(), id).await?;
    state
        .emit(events::logbook_submitted(&entry, auth.user_id))
        .await;
    Ok(Json(entry))
}

/// POST /api/logbook/{id}/review — Approve or reject a submitted entry.
async fn review_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(params): Json<ReviewParams>,
) -> Result<Json<LogbookEntry>, AppError> {
    let entry = LogbookService::review(&state.pool, &auth.actor(), id, &params).await?;
    tracing::info!(entry_id = %entry.id, status = %entry.status, "Logbook entry reviewed");
    state
        .emit(events::logbook_reviewed(&entry, auth.user_id))
        .await;
    Ok(Json(entry))
}
