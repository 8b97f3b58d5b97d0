//! Voyage manifest routes.

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::types::ManifestEntry;
use bosun_fleet::events;
use bosun_fleet::manifest::{DisembarkParams, EmbarkParams, ManifestFilter, ManifestService};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/manifest", get(list_manifest).post(embark))
        .route("/api/manifest/{id}", delete(remove_entry))
        .route("/api/manifest/{id}/disembark", post(disembark))
}

/// POST /api/manifest — Record a person embarking.
async fn embark(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(params): Json<EmbarkParams>,
) -> Result<Json<ManifestEntry>, AppError> {
    let entry = ManifestService::embark(&state.pool, &auth.actor(), &params).await?;
    state
        .emit(events::manifest_updated(&entry, "embarked", auth.user_id))
        .await;
    Ok(Json(entry))
}

/// GET /api/manifest — Filter by `yacht_id`, `voyage_ref`, or `aboard=true`.
async fn list_manifest(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<ManifestFilter>,
) -> Result<Json<Vec<ManifestEntry>>, AppError> {
    let entries = ManifestService::list(&state.pool, &auth.actor(), &filter).await?;
    Ok(Json(entries))
}

/// POST /api/manifest/{id}/disembark — Record a person leaving the yacht.
async fn disembark(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(params): Json<DisembarkParams>,
) -> Result<Json<ManifestEntry>, AppError> {
    let entry = ManifestService::disembark(&state.pool, &auth.actor(), id, &params).await?;
    state
        .emit(events::manifest_updated(&entry, "disembarked", auth.user_id))
        .await;
    Ok(Json(entry))
}

/// DELETE /api/manifest/{id} — Remove an entry recorded in error.
async fn remove_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    match ManifestService::delete(&state.pool, &auth.actor(), id).await? {
        Some(entry) => {
            state
                .emit(events::manifest_updated(&entry, "removed", auth.user_id))
                .await;
            Ok(Json(json!({"deleted": true})))
        }
        None => Err(AppError::NotFound(format!("Manifest entry {} not found", id))),
    }
}
