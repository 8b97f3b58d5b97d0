//! Redis notification queue shared by the dispatcher (producer) and the notifier (consumer).
//!
//! - `bosun:notifications:queue` — list of notification ids, LPUSH / RPOP (FIFO)
//! - `bosun:notifications:retry` — sorted set scored by retry due time (ms since epoch)
//! - `bosun:notifications:dead`  — list of ids that exhausted their attempts

use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::Serialize;
use uuid::Uuid;

pub const QUEUE_KEY: &str = "bosun:notifications:queue";
pub const RETRY_KEY: &str = "bosun:notifications:retry";
pub const DEAD_KEY: &str = "bosun:notifications:dead";

/// Queue depth snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub queued: u64,
    pub retrying: u64,
    pub dead: u64,
}

/// Thin wrapper over the Redis keys above.
#[derive(Clone)]
pub struct NotificationQueue {
    redis: ConnectionManager,
}

impl NotificationQueue {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    pub async fn enqueue(&mut self, notification_id: Uuid) -> anyhow::Result<()> {
        self.redis
            .lpush::<_, _, ()>(QUEUE_KEY, notification_id.to_string())
            .await?;
        Ok(())
    }

    pub async fn enqueue_many(&mut self, ids: &[Uuid]) -> anyhow::Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let values: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        self.redis.lpush::<_, _, ()>(QUEUE_KEY, values).await?;
        Ok(())
    }

    /// Pop the oldest queued id, if any. Malformed entries are dropped with a warning.
    pub async fn dequeue(&mut self) -> anyhow::Result<Option<Uuid>> {
        let raw: Option<String> = self.redis.rpop(QUEUE_KEY, None).await?;
        Ok(raw.and_then(|s| match Uuid::parse_str(&s) {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!(entry = %s, "Dropping malformed queue entry");
                None
            }
        }))
    }

    /// Schedule a retry at `due`.
    pub async fn schedule_retry(
        &mut self,
        notification_id: Uuid,
        due: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.redis
            .zadd::<_, _, _, ()>(RETRY_KEY, notification_id.to_string(), due.timestamp_millis())
            .await?;
        Ok(())
    }

    /// Schedule a retry at `due` for every id not already waiting in the retry set.
    /// Returns how many were added.
    pub async fn schedule_retry_if_absent(
        &mut self,
        ids: &[Uuid],
        due: DateTime<Utc>,
    ) -> anyhow::Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("ZADD");
        cmd.arg(RETRY_KEY).arg("NX");
        for id in ids {
            cmd.arg(due.timestamp_millis()).arg(id.to_string());
        }
        let added: u64 = cmd.query_async(&mut self.redis).await?;
        Ok(added)
    }

    /// Move retries that are due at `now` back onto the queue. Returns how many moved.
    pub async fn promote_due(&mut self, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let due: Vec<String> = self
            .redis
            .zrangebyscore(RETRY_KEY, "-inf", now.timestamp_millis())
            .await?;

        let mut moved = 0;
        for id in due {
            // ZREM returns 1 only for the caller that removed it, so concurrent
            // workers never promote the same id twice.
            let removed: i64 = self.redis.zrem(RETRY_KEY, &id).await?;
            if removed == 1 {
                self.redis.lpush::<_, _, ()>(QUEUE_KEY, &id).await?;
                moved += 1;
            }
        }

        if moved > 0 {
            tracing::debug!(moved, "Promoted due retries");
        }
        Ok(moved)
    }

    pub async fn dead_letter(&mut self, notification_id: Uuid) -> anyhow::Result<()> {
        self.redis
            .lpush::<_, _, ()>(DEAD_KEY, notification_id.to_string())
            .await?;
        Ok(())
    }

    pub async fn stats(&mut self) -> anyhow::Result<QueueStats> {
        let queued: u64 = self.redis.llen(QUEUE_KEY).await?;
        let retrying: u64 = self.redis.zcard(RETRY_KEY).await?;
        let dead: u64 = self.redis.llen(DEAD_KEY).await?;
        Ok(QueueStats {
            queued,
            retrying,
            dead,
        })
    }
}
