//! Shared application state for the Axum API server.

use std::sync::Arc;

use bosun_common::config::AppConfig;
use bosun_common::types::DomainEvent;
use bosun_engine::processor::RuleProcessor;
use redis::aio::ConnectionManager;
use sqlx::PgPool;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub redis: ConnectionManager,
    pub config: AppConfig,
    pub processor: Arc<RuleProcessor>,
}

impl AppState {
    pub fn new(pool: PgPool, redis: ConnectionManager, config: AppConfig) -> Self {
        Self {
            pool,
            redis,
            config,
            processor: Arc::new(RuleProcessor::new()),
        }
    }

    /// Run a committed write's event through the notification rules.
    /// Failures are logged by the processor and never reach the caller.
    pub async fn emit(&self, event: DomainEvent) {
        let mut redis = self.redis.clone();
        self.processor.emit(event, &self.pool, &mut redis).await;
    }

    pub async fn emit_all(&self, events: impl IntoIterator<Item = DomainEvent>) {
        for event in events {
            self.emit(event).await;
        }
    }
}
