use bosun_common::config::AppConfig;
use bosun_common::db;
use bosun_common::redis_pool::create_redis_pool;
use bosun_notifier::worker::{DeliveryWorker, NotifierConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bosun_notifier=info".into()),
        )
        .json()
        .init();

    tracing::info!("Bosun notifier starting...");

    let config = AppConfig::from_env()?;
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    let redis = create_redis_pool(&config.redis_url, "notifier").await?;

    let mut worker = DeliveryWorker::new(pool, redis, NotifierConfig::from_app_config(&config))?;

    tokio::select! {
        result = worker.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Delivery worker exited with error");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("Bosun notifier stopped.");
    Ok(())
}
