//! Scheduled job routes.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::permissions::Permission;
use bosun_common::types::ScheduledJob;
use bosun_engine::jobs::{CreateJobParams, JobService, UpdateJobParams};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/jobs", get(list_jobs).post(create_job))
        .route(
            "/api/jobs/{id}",
            get(get_job).patch(update_job).delete(delete_job),
        )
        .route("/api/jobs/{id}/run", post(run_job))
}

/// POST /api/jobs — Create a reminder or expiry-sweep job.
async fn create_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(params): Json<CreateJobParams>,
) -> Result<Json<ScheduledJob>, AppError> {
    auth.actor().require(Permission::ManageJobs)?;
    let job = JobService::create(&state.pool, auth.tenant_id, Some(auth.user_id), &params).await?;
    tracing::info!(job_id = %job.id, kind = %job.kind, next_run = ?job.next_run, "Job created");
    Ok(Json(job))
}

async fn list_jobs(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<ScheduledJob>>, AppError> {
    auth.actor().require(Permission::ManageJobs)?;
    let jobs = JobService::list(&state.pool, auth.tenant_id).await?;
    Ok(Json(jobs))
}

async fn get_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ScheduledJob>, AppError> {
    auth.actor().require(Permission::ManageJobs)?;
    let job = JobService::get(&state.pool, auth.tenant_id, id).await?;
    Ok(Json(job))
}

/// PATCH /api/jobs/{id} — Reschedule or edit a job; `next_run` is recomputed.
async fn update_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(params): Json<UpdateJobParams>,
) -> Result<Json<ScheduledJob>, AppError> {
    auth.actor().require(Permission::ManageJobs)?;
    let job = JobService::update(&state.pool, auth.tenant_id, id, &params).await?;
    Ok(Json(job))
}

/// DELETE /api/jobs/{id}
async fn delete_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth.actor().require(Permission::ManageJobs)?;
    if JobService::delete(&state.pool, auth.tenant_id, id).await? {
        Ok(Json(json!({"deleted": true})))
    } else {
        Err(AppError::NotFound(format!("Job {} not found", id)))
    }
}

/// POST /api/jobs/{id}/run — Make the job due now; the scheduler picks it up on its next tick.
async fn run_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ScheduledJob>, AppError> {
    auth.actor().require(Permission::ManageJobs)?;
    let job = JobService::trigger_now(&state.pool, auth.tenant_id, id).await?;
    Ok(Json(job))
}
