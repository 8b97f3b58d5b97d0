//! Fan-out of a rendered message into per-channel notification records.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use bosun_common::types::{ChannelType, DeliveryStatus, Notification};

use crate::queue::NotificationQueue;

/// Everything needed to create the notifications of one trigger.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub tenant_id: Uuid,
    pub trigger_id: Uuid,
    pub rule_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
    pub recipients: Vec<Uuid>,
    pub channels: Vec<ChannelType>,
    pub title: String,
    pub body: String,
    pub escalation_level: i32,
}

/// One notification slot before insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedNotification {
    pub channel: ChannelType,
    pub recipient_id: Option<Uuid>,
}

pub struct Dispatcher;

impl Dispatcher {
    /// Expand channels × recipients. Webhooks produce a single tenant-level slot,
    /// and only when the tenant has a webhook endpoint.
    pub fn plan(
        channels: &[ChannelType],
        recipients: &[Uuid],
        tenant_has_webhook: bool,
    ) -> Vec<PlannedNotification> {
        let mut planned = Vec::new();
        let mut seen_channels: Vec<ChannelType> = Vec::new();

        for channel in channels {
            if seen_channels.contains(channel) {
                continue;
            }
            seen_channels.push(*channel);

            if channel.is_per_recipient() {
                planned.extend(recipients.iter().map(|r| PlannedNotification {
                    channel: *channel,
                    recipient_id: Some(*r),
                }));
            } else if tenant_has_webhook {
                planned.push(PlannedNotification {
                    channel: *channel,
                    recipient_id: None,
                });
            }
        }

        planned
    }

    /// Insert the notifications for `request` and push their ids onto the queue.
    pub async fn dispatch(
        pool: &PgPool,
        queue: &mut NotificationQueue,
        request: &DispatchRequest,
    ) -> anyhow::Result<Vec<Notification>> {
        let webhook: Option<(Option<String>,)> =
            sqlx::query_as("SELECT webhook_url FROM tenants WHERE id = $1")
                .bind(request.tenant_id)
                .fetch_optional(pool)
                .await?;
        let tenant_has_webhook = webhook
            .and_then(|(url,)| url)
            .is_some_and(|url| !url.trim().is_empty());

        let planned = Self::plan(&request.channels, &request.recipients, tenant_has_webhook);
        if planned.is_empty() {
            tracing::warn!(
                trigger_id = %request.trigger_id,
                rule_id = ?request.rule_id,
                job_id = ?request.job_id,
                "Dispatch produced no notifications (no recipients or channels)"
            );
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut tx = pool.begin().await?;
        let mut created = Vec::with_capacity(planned.len());

        for slot in &planned {
            let notification: Notification = sqlx::query_as(
                r#"
                INSERT INTO notifications
                    (id, tenant_id, trigger_id, rule_id, job_id, recipient_id, channel,
                     title, body, status, attempts, escalation_level, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 0, $11, $12)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(request.tenant_id)
            .bind(request.trigger_id)
            .bind(request.rule_id)
            .bind(request.job_id)
            .bind(slot.recipient_id)
            .bind(slot.channel.as_str())
            .bind(&request.title)
            .bind(&request.body)
            .bind(DeliveryStatus::Pending.to_string())
            .bind(request.escalation_level)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
            created.push(notification);
        }

        tx.commit().await?;

        // The rows are committed; the notifier's re-queue sweep picks them up
        // if Redis is unavailable now.
        let ids: Vec<Uuid> = created.iter().map(|n| n.id).collect();
        if let Err(e) = queue.enqueue_many(&ids).await {
            tracing::error!(
                trigger_id = %request.trigger_id,
                count = ids.len(),
                error = %e,
                "Failed to enqueue dispatched notifications"
            );
        }

        tracing::info!(
            trigger_id = %request.trigger_id,
            count = created.len(),
            escalation_level = request.escalation_level,
            "Notifications dispatched"
        );

        Ok(created)
    }
}
