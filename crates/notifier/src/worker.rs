//! Delivery worker: drains the Redis queue and records each attempt in Postgres.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use uuid::Uuid;

use bosun_common::config::AppConfig;
use bosun_common::types::{ChannelType, DeliveryStatus, Notification};
use bosun_engine::queue::NotificationQueue;

use crate::backoff::backoff;
use crate::channels::{EmailClient, WebhookClient, WebhookPayload, http_client};
use crate::error::DeliveryError;

const IDLE_SLEEP: StdDuration = StdDuration::from_millis(250);
const REQUEUE_BATCH: i64 = 1000;

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub max_attempts: u32,
    pub backoff_base: StdDuration,
    pub backoff_max: StdDuration,
    pub resend_api_key: Option<String>,
    pub email_from: Option<String>,
    /// Undelivered rows older than this are put back on the queue.
    pub requeue_grace: StdDuration,
    pub requeue_interval: StdDuration,
}

impl NotifierConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.notifier_max_attempts.max(1),
            backoff_base: StdDuration::from_millis(config.notifier_backoff_base_ms),
            backoff_max: StdDuration::from_millis(config.notifier_backoff_max_ms),
            resend_api_key: config.resend_api_key.clone(),
            email_from: config.email_from.clone(),
            requeue_grace: StdDuration::from_secs(config.notifier_requeue_grace_secs),
            requeue_interval: StdDuration::from_secs(config.notifier_requeue_interval_secs.max(1)),
        }
    }
}

/// What happens to a notification after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    Retry,
    DeadLetter,
}

/// `attempts` counts the attempt that just failed.
pub fn failure_action(error: &DeliveryError, attempts: u32, max_attempts: u32) -> FailureAction {
    if error.is_permanent() || attempts >= max_attempts {
        FailureAction::DeadLetter
    } else {
        FailureAction::Retry
    }
}

/// Result of handling one queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Sent,
    Retrying,
    Dead,
    /// Row missing or already in a terminal state.
    Skipped,
}

pub struct DeliveryWorker {
    pool: PgPool,
    queue: NotificationQueue,
    email: Option<EmailClient>,
    webhook: WebhookClient,
    config: NotifierConfig,
}

impl DeliveryWorker {
    pub fn new(pool: PgPool, redis: ConnectionManager, config: NotifierConfig) -> anyhow::Result<Self> {
        let http = http_client()?;
        let email = match (&config.resend_api_key, &config.email_from) {
            (Some(key), Some(from)) => Some(EmailClient::new(http.clone(), key.clone(), from.clone())),
            _ => {
                tracing::warn!("RESEND_API_KEY or EMAIL_FROM not set; email notifications will be dead-lettered");
                None
            }
        };
        Ok(Self {
            pool,
            queue: NotificationQueue::new(redis),
            email,
            webhook: WebhookClient::new(http),
            config,
        })
    }

    /// Replace the email client, e.g. to point at a different endpoint.
    pub fn with_email_client(mut self, email: EmailClient) -> Self {
        self.email = Some(email);
        self
    }

    /// Work the queue forever. Errors are logged and the loop continues.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        tracing::info!(
            max_attempts = self.config.max_attempts,
            email = self.email.is_some(),
            "Delivery worker started"
        );
        let mut next_sweep = tokio::time::Instant::now();
        loop {
            if tokio::time::Instant::now() >= next_sweep {
                if let Err(e) = self.requeue_stale(Utc::now()).await {
                    tracing::error!(error = %e, "Re-queue sweep failed");
                }
                next_sweep = tokio::time::Instant::now() + self.config.requeue_interval;
            }
            match self.step(Utc::now()).await {
                Ok(Some(_)) => {}
                Ok(None) => tokio::time::sleep(IDLE_SLEEP).await,
                Err(e) => {
                    tracing::error!(error = %e, "Delivery step failed");
                    tokio::time::sleep(IDLE_SLEEP).await;
                }
            }
        }
    }

    /// Promote due retries and handle at most one queued notification.
    /// Returns `None` when the queue was empty.
    pub async fn step(&mut self, now: DateTime<Utc>) -> anyhow::Result<Option<Handled>> {
        self.queue.promote_due(now).await?;
        let Some(id) = self.queue.dequeue().await? else {
            return Ok(None);
        };
        self.handle(id, now).await.map(Some)
    }

    /// Put undelivered notifications older than the grace period back on the
    /// retry set, unless a retry is already pending. Returns how many were added.
    pub async fn requeue_stale(&mut self, now: DateTime<Utc>) -> anyhow::Result<u64> {
        let cutoff = Duration::from_std(self.config.requeue_grace)
            .ok()
            .and_then(|grace| now.checked_sub_signed(grace))
            .ok_or_else(|| anyhow::anyhow!("re-queue grace out of range"))?;
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM notifications
            WHERE status IN ('pending', 'failed') AND created_at < $1
            ORDER BY created_at
            LIMIT $2
            "#,
        )
        .bind(cutoff)
        .bind(REQUEUE_BATCH)
        .fetch_all(&self.pool)
        .await?;

        let added = self.queue.schedule_retry_if_absent(&ids, now).await?;
        if added > 0 {
            tracing::warn!(count = added, "Re-queued undelivered notifications");
        }
        Ok(added)
    }

    /// Deliver one notification. On an infrastructure error the id goes back
    /// on the retry set before the error is returned.
    pub async fn handle(&mut self, id: Uuid, now: DateTime<Utc>) -> anyhow::Result<Handled> {
        match self.attempt(id, now).await {
            Ok(handled) => Ok(handled),
            Err(e) => {
                let due = Duration::from_std(self.config.backoff_base)
                    .ok()
                    .and_then(|delay| now.checked_add_signed(delay))
                    .unwrap_or(now);
                if let Err(requeue) = self.queue.schedule_retry(id, due).await {
                    tracing::error!(notification_id = %id, error = %requeue, "Failed to re-queue notification");
                }
                Err(e)
            }
        }
    }

    async fn attempt(&mut self, id: Uuid, now: DateTime<Utc>) -> anyhow::Result<Handled> {
        let notification: Option<Notification> =
            sqlx::query_as("SELECT * FROM notifications WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(notification) = notification else {
            tracing::warn!(notification_id = %id, "Queued notification no longer exists");
            return Ok(Handled::Skipped);
        };
        if !matches!(notification.status, DeliveryStatus::Pending | DeliveryStatus::Failed) {
            tracing::debug!(notification_id = %id, status = %notification.status, "Already settled");
            return Ok(Handled::Skipped);
        }

        match self.deliver(&notification).await? {
            Ok(()) => {
                sqlx::query(
                    "UPDATE notifications SET status = 'sent', sent_at = $1, attempts = attempts + 1, last_error = NULL WHERE id = $2",
                )
                .bind(now)
                .bind(id)
                .execute(&self.pool)
                .await?;
                tracing::info!(notification_id = %id, channel = %notification.channel, "Notification sent");
                Ok(Handled::Sent)
            }
            Err(error) => self.record_failure(&notification, error, now).await,
        }
    }

    async fn record_failure(
        &mut self,
        notification: &Notification,
        error: DeliveryError,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Handled> {
        let attempts = u32::try_from(notification.attempts).unwrap_or(0) + 1;
        let action = failure_action(&error, attempts, self.config.max_attempts);
        let status = match action {
            FailureAction::Retry => DeliveryStatus::Failed,
            FailureAction::DeadLetter => DeliveryStatus::Dead,
        };

        sqlx::query("UPDATE notifications SET status = $1, attempts = $2, last_error = $3 WHERE id = $4")
            .bind(status.to_string())
            .bind(i32::try_from(attempts)?)
            .bind(error.to_string())
            .bind(notification.id)
            .execute(&self.pool)
            .await?;

        match action {
            FailureAction::Retry => {
                let delay = backoff(attempts, self.config.backoff_base, self.config.backoff_max);
                let due = now + Duration::from_std(delay)?;
                self.queue.schedule_retry(notification.id, due).await?;
                tracing::warn!(
                    notification_id = %notification.id,
                    channel = %notification.channel,
                    attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %error,
                    "Delivery failed; retry scheduled"
                );
                Ok(Handled::Retrying)
            }
            FailureAction::DeadLetter => {
                self.queue.dead_letter(notification.id).await?;
                tracing::error!(
                    notification_id = %notification.id,
                    channel = %notification.channel,
                    attempts,
                    error = %error,
                    "Notification dead-lettered"
                );
                Ok(Handled::Dead)
            }
        }
    }

    /// The outer error is infrastructure (database); the inner one is the channel's verdict.
    async fn deliver(
        &self,
        notification: &Notification,
    ) -> anyhow::Result<Result<(), DeliveryError>> {
        match notification.channel {
            // The row itself is the in-app inbox entry.
            ChannelType::InApp => Ok(Ok(())),
            ChannelType::Email => {
                let Some(client) = &self.email else {
                    return Ok(Err(DeliveryError::Permanent("email is not configured".to_string())));
                };
                let Some(recipient_id) = notification.recipient_id else {
                    return Ok(Err(DeliveryError::Permanent("email without a recipient".to_string())));
                };
                let email: Option<(String,)> =
                    sqlx::query_as("SELECT email FROM users WHERE id = $1 AND active")
                        .bind(recipient_id)
                        .fetch_optional(&self.pool)
                        .await?;
                let Some((email,)) = email else {
                    return Ok(Err(DeliveryError::Permanent("recipient is inactive or gone".to_string())));
                };
                Ok(client.send(&email, &notification.title, &notification.body).await)
            }
            ChannelType::Webhook => {
                let url: Option<(Option<String>,)> =
                    sqlx::query_as("SELECT webhook_url FROM tenants WHERE id = $1")
                        .bind(notification.tenant_id)
                        .fetch_optional(&self.pool)
                        .await?;
                let Some(url) = url.and_then(|(url,)| url).filter(|u| !u.is_empty()) else {
                    return Ok(Err(DeliveryError::Permanent("tenant has no webhook URL".to_string())));
                };
                let payload = WebhookPayload {
                    id: notification.id,
                    tenant_id: notification.tenant_id,
                    title: &notification.title,
                    body: &notification.body,
                    created_at: notification.created_at,
                };
                Ok(self.webhook.post(&url, &payload).await)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_failure_retries_until_limit() {
        let err = DeliveryError::Transient("HTTP 503".to_string());
        assert_eq!(failure_action(&err, 1, 5), FailureAction::Retry);
        assert_eq!(failure_action(&err, 4, 5), FailureAction::Retry);
        assert_eq!(failure_action(&err, 5, 5), FailureAction::DeadLetter);
    }

    #[test]
    fn test_permanent_failure_dead_letters_immediately() {
        let err = DeliveryError::Permanent("HTTP 404".to_string());
        assert_eq!(failure_action(&err, 1, 5), FailureAction::DeadLetter);
    }
}
