//! Liveness and dependency checks.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use redis::AsyncCommands;
use serde_json::json;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// 200 when Postgres and Redis both answer, 503 otherwise.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let database = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();

    let mut redis = state.redis.clone();
    let cache = redis.exists::<_, bool>("bosun:health").await.is_ok();

    let healthy = database && cache;
    if !healthy {
        tracing::warn!(database, redis = cache, "Health check failed");
    }

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if healthy { "ok" } else { "degraded" },
            "service": "bosun-api",
            "version": env!("CARGO_PKG_VERSION"),
            "database": database,
            "redis": cache,
        })),
    )
}
