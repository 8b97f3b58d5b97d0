//! HRM routes: crew members, their certificates and expiry lookups.

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::types::{CrewCertificate, CrewMember};
use bosun_fleet::crew::{
    AddCertificateParams, CreateCrewParams, CrewFilter, CrewService, ExpiringCertificate,
    UpdateCrewParams,
};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Look-ahead used by the expiry endpoints when `days` is omitted.
pub const DEFAULT_EXPIRY_DAYS: i64 = 30;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/crew", get(list_crew).post(create_crew))
        .route(
            "/api/crew/certificates/expiring",
            get(expiring_certificates),
        )
        .route("/api/crew/certificates/{id}", delete(delete_certificate))
        .route(
            "/api/crew/{id}",
            get(get_crew).patch(update_crew).delete(delete_crew),
        )
        .route(
            "/api/crew/{id}/certificates",
            get(list_certificates).post(add_certificate),
        )
}

#[derive(Debug, Deserialize)]
pub struct ExpiryQuery {
    #[serde(default = "default_expiry_days")]
    pub days: i64,
}

fn default_expiry_days() -> i64 {
    DEFAULT_EXPIRY_DAYS
}

/// POST /api/crew — Add a crew member.
async fn create_crew(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(params): Json<CreateCrewParams>,
) -> Result<Json<CrewMember>, AppError> {
    let member = CrewService::create(&state.pool, &auth.actor(), &params).await?;
    Ok(Json(member))
}

/// GET /api/crew — Crew, filtered by `yacht_id`; inactive members only with `include_inactive=true`.
async fn list_crew(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<CrewFilter>,
) -> Result<Json<Vec<CrewMember>>, AppError> {
    let crew = CrewService::list(&state.pool, &auth.actor(), &filter).await?;
    Ok(Json(crew))
}

async fn get_crew(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<CrewMember>, AppError> {
    let member = CrewService::get(&state.pool, &auth.actor(), id).await?;
    Ok(Json(member))
}

/// PATCH /api/crew/{id} — Update a crew member.
async fn update_crew(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(params): Json<UpdateCrewParams>,
) -> Result<Json<CrewMember>, AppError> {
    let member = CrewService::update(&state.pool, &auth.actor(), id, &params).await?;
    Ok(Json(member))
}

/// DELETE /api/crew/{id} — Delete a crew member and their certificates.
async fn delete_crew(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if CrewService::delete(&state.pool, &auth.actor(), id).await? {
        Ok(Json(json!({"deleted": true})))
    } else {
        Err(AppError::NotFound(format!("Crew member {} not found", id)))
    }
}

async fn list_certificates(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CrewCertificate>>, AppError> {
    let certificates = CrewService::certificates(&state.pool, &auth.actor(), id).await?;
    Ok(Json(certificates))
}

/// POST /api/crew/{id}/certificates — Attach a certificate to a crew member.
async fn add_certificate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(params): Json<AddCertificateParams>,
) -> Result<Json<CrewCertificate>, AppError> {
    let certificate = CrewService::add_certificate(&state.pool, &auth.actor(), id, &params).await?;
    Ok(Json(certificate))
}

/// DELETE /api/crew/certificates/{id}
async fn delete_certificate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if CrewService::delete_certificate(&state.pool, &auth.actor(), id).await? {
        Ok(Json(json!({"deleted": true})))
    } else {
        Err(AppError::NotFound(format!("Certificate {} not found", id)))
    }
}

/// GET /api/crew/certificates/expiring?days= — Certificates expiring within `days` (default 30).
async fn expiring_certificates(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ExpiryQuery>,
) -> Result<Json<Vec<ExpiringCertificate>>, AppError> {
    let certificates =
        CrewService::expiring_certificates(&state.pool, &auth.actor(), query.days).await?;
    Ok(Json(certificates))
}
