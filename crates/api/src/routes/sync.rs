//! Offline outbox replay.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;

use bosun_common::error::AppError;
use bosun_fleet::sync::{SyncOpResult, SyncRequest, SyncService};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/sync/ops", post(apply_ops))
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub results: Vec<SyncOpResult>,
}

/// POST /api/sync/ops — Apply queued offline writes in order, once per `client_op_id`.
async fn apply_ops(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, AppError> {
    let outcome = SyncService::apply(&state.pool, &auth.actor(), request).await?;
    tracing::info!(
        user_id = %auth.user_id,
        ops = outcome.results.len(),
        events = outcome.events.len(),
        "Sync batch applied"
    );
    state.emit_all(outcome.events).await;
    Ok(Json(SyncResponse {
        results: outcome.results,
    }))
}
