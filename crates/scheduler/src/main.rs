use bosun_common::config::AppConfig;
use bosun_common::db;
use bosun_common::redis_pool::create_redis_pool;
use bosun_scheduler::runner::{JobRunner, RunnerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bosun_scheduler=info,bosun_engine=info".into()),
        )
        .json()
        .init();

    tracing::info!("Bosun scheduler starting...");

    let config = AppConfig::from_env()?;

    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;

    db::run_migrations(&pool).await?;

    let redis = create_redis_pool(&config.redis_url, "scheduler").await?;

    let mut runner = JobRunner::new(pool, redis, RunnerConfig::from_app_config(&config));

    // Run with graceful shutdown on Ctrl+C
    tokio::select! {
        result = runner.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Job runner exited with error");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("Bosun scheduler stopped.");
    Ok(())
}
