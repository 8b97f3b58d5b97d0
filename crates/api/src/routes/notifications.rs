//! Notification inbox and delivery queue routes.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::permissions::Permission;
use bosun_common::types::Notification;
use bosun_engine::inbox::{InboxQuery, NotificationInbox};
use bosun_engine::queue::{NotificationQueue, QueueStats};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/{id}/ack", post(acknowledge))
        .route("/api/queue/stats", get(queue_stats))
}

/// GET /api/notifications — The caller's in-app inbox (`?unacknowledged=true&limit=`).
async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<InboxQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let notifications =
        NotificationInbox::list(&state.pool, auth.tenant_id, auth.user_id, &query).await?;
    Ok(Json(notifications))
}

/// POST /api/notifications/{id}/ack — Acknowledge a notification (stops escalation).
async fn acknowledge(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, AppError> {
    let notification =
        NotificationInbox::acknowledge(&state.pool, auth.tenant_id, auth.user_id, id).await?;
    Ok(Json(notification))
}

/// GET /api/queue/stats — Depth of the delivery queue, retry set and dead-letter list.
async fn queue_stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<QueueStats>, AppError> {
    auth.actor().require(Permission::ManageJobs)?;
    let mut queue = NotificationQueue::new(state.redis.clone());
    let stats = queue
        .stats()
        .await
        .map_err(|e| AppError::Internal(format!("Queue stats unavailable: {}", e)))?;
    Ok(Json(stats))
}
