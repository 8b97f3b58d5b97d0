//! Engine routes: registry, running-hour readings and service records.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::types::EngineHoursReading;
use bosun_fleet::engines::{
    CreateEngineParams, EngineService, EngineView, RecordHoursParams, UpdateEngineParams,
};
use bosun_fleet::events;

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/engines", get(list_engines).post(create_engine))
        .route(
            "/api/engines/{id}",
            get(get_engine).patch(update_engine).delete(delete_engine),
        )
        .route("/api/engines/{id}/hours", get(list_readings).post(record_hours))
        .route("/api/engines/{id}/service", post(record_service))
}

#[derive(Debug, Default, Deserialize)]
pub struct EngineQuery {
    pub yacht_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct HoursResponse {
    pub engine: EngineView,
    pub reading: EngineHoursReading,
}

/// POST /api/engines — Register an engine on a yacht.
async fn create_engine(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(params): Json<CreateEngineParams>,
) -> Result<Json<EngineView>, AppError> {
    let engine = EngineService::create(&state.pool, &auth.actor(), &params).await?;
    Ok(Json(engine.into()))
}

/// GET /api/engines — Engines with their service status.
async fn list_engines(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<EngineQuery>,
) -> Result<Json<Vec<EngineView>>, AppError> {
    let engines = EngineService::list(&state.pool, &auth.actor(), query.yacht_id).await?;
    Ok(Json(engines.into_iter().map(EngineView::from).collect()))
}

async fn get_engine(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<EngineView>, AppError> {
    let engine = EngineService::get(&state.pool, &auth.actor(), id).await?;
    Ok(Json(engine.into()))
}

/// PATCH /api/engines/{id} — Update engine details or the service interval.
async fn update_engine(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(params): Json<UpdateEngineParams>,
) -> Result<Json<EngineView>, AppError> {
    let engine = EngineService::update(&state.pool, &auth.actor(), id, &params).await?;
    Ok(Json(engine.into()))
}

/// DELETE /api/engines/{id} — Delete an engine and its readings.
async fn delete_engine(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if EngineService::delete(&state.pool, &auth.actor(), id).await? {
        Ok(Json(json!({"deleted": true})))
    } else {
        Err(AppError::NotFound(format!("Engine {} not found", id)))
    }
}

/// POST /api/engines/{id}/hours — Record a running-hour reading.
async fn record_hours(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(params): Json<RecordHoursParams>,
) -> Result<Json<HoursResponse>, AppError> {
    let recorded = EngineService::record_hours(&state.pool, &auth.actor(), id, &params).await?;
    state
        .emit(events::engine_hours_recorded(
            &recorded.engine,
            recorded.previous_hours,
            auth.user_id,
        ))
        .await;
    Ok(Json(HoursResponse {
        engine: recorded.engine.into(),
        reading: recorded.reading,
    }))
}

/// GET /api/engines/{id}/hours — Reading history, newest first.
async fn list_readings(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<EngineHoursReading>>, AppError> {
    let readings = EngineService::readings(&state.pool, &auth.actor(), id).await?;
    Ok(Json(readings))
}

/// POST /api/engines/{id}/service — Mark the engine serviced at its current hours.
async fn record_service(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<EngineView>, AppError> {
    let engine = EngineService::service(&state.pool, &auth.actor(), id).await?;
    tracing::info!(engine_id = %engine.id, hours = engine.current_hours, "Engine serviced");
    state
        .emit(events::engine_serviced(&engine, auth.user_id))
        .await;
    Ok(Json(engine.into()))
}
