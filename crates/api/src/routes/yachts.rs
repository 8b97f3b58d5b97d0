//! Yacht registry routes.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::types::Yacht;
use bosun_fleet::yachts::{CreateYachtParams, UpdateYachtParams, YachtService};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/yachts", get(list_yachts).post(create_yacht))
        .route(
            "/api/yachts/{id}",
            get(get_yacht).patch(update_yacht).delete(delete_yacht),
        )
}

/// POST /api/yachts — Register a yacht.
async fn create_yacht(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(params): Json<CreateYachtParams>,
) -> Result<Json<Yacht>, AppError> {
    let yacht = YachtService::create(&state.pool, &auth.actor(), &params).await?;
    Ok(Json(yacht))
}

/// GET /api/yachts — All yachts of the tenant.
async fn list_yachts(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Yacht>>, AppError> {
    let yachts = YachtService::list(&state.pool, &auth.actor()).await?;
    Ok(Json(yachts))
}

async fn get_yacht(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Yacht>, AppError> {
    let yacht = YachtService::get(&state.pool, &auth.actor(), id).await?;
    Ok(Json(yacht))
}

/// PATCH /api/yachts/{id} — Update a yacht.
async fn update_yacht(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(params): Json<UpdateYachtParams>,
) -> Result<Json<Yacht>, AppError> {
    let yacht = YachtService::update(&state.pool, &auth.actor(), id, &params).await?;
    Ok(Json(yacht))
}

/// DELETE /api/yachts/{id} — Delete a yacht.
async fn delete_yacht(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if YachtService::delete(&state.pool, &auth.actor(), id).await? {
        Ok(Json(json!({"deleted": true})))
    } else {
        Err(AppError::NotFound(format!("Yacht {} not found", id)))
    }
}
