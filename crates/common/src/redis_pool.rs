use redis::Client;
use redis::aio::ConnectionManager;

/// Create a Redis connection manager for async operations.
///
/// `role` only labels the log line (e.g. "dedupe", "queue").
pub async fn create_redis_pool(redis_url: &str, role: &str) -> anyhow::Result<ConnectionManager> {
    let client = Client::open(redis_url)?;
    let manager = ConnectionManager::new(client).await?;

    tracing::info!(role, "Connected to Redis");
    Ok(manager)
}
