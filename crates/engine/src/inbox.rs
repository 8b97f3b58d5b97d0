//! Per-user notification inbox and acknowledgement.

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::types::Notification;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub unacknowledged: bool,
    pub limit: Option<i64>,
}

impl InboxQuery {
    fn page_size(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }
}

pub struct NotificationInbox;

impl NotificationInbox {
    /// In-app notifications addressed to `user_id`, newest first.
    pub async fn list(
        pool: &PgPool,
        tenant_id: Uuid,
        user_id: Uuid,
        query: &InboxQuery,
    ) -> Result<Vec<Notification>, AppError> {
        let notifications = sqlx::query_as(
            r#"
            SELECT * FROM notifications
            WHERE tenant_id = $1 AND recipient_id = $2 AND channel = 'in_app'
              AND (NOT $3 OR acknowledged_at IS NULL)
            ORDER BY created_at DESC
            LIMIT $4
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(query.unacknowledged)
        .bind(query.page_size())
        .fetch_all(pool)
        .await?;
        Ok(notifications)
    }

    /// Acknowledge one of the caller's notifications. Acknowledging twice keeps
    /// the first timestamp.
    pub async fn acknowledge(
        pool: &PgPool,
        tenant_id: Uuid,
        user_id: Uuid,
        notification_id: Uuid,
    ) -> Result<Notification, AppError> {
        let notification: Option<Notification> = sqlx::query_as(
            r#"
            UPDATE notifications
            SET acknowledged_at = COALESCE(acknowledged_at, NOW())
            WHERE id = $1 AND tenant_id = $2 AND recipient_id = $3
            RETURNING *
            "#,
        )
        .bind(notification_id)
        .bind(tenant_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        let notification = notification.ok_or_else(|| {
            AppError::NotFound(format!("Notification {} not found", notification_id))
        })?;

        tracing::debug!(
            notification_id = %notification.id,
            trigger_id = %notification.trigger_id,
            "Notification acknowledged"
        );
        Ok(notification)
    }

    /// Whether any notification of the trigger has been acknowledged.
    pub async fn trigger_acknowledged(pool: &PgPool, trigger_id: Uuid) -> Result<bool, AppError> {
        let (acknowledged,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM notifications WHERE trigger_id = $1 AND acknowledged_at IS NOT NULL)",
        )
        .bind(trigger_id)
        .fetch_one(pool)
        .await?;
        Ok(acknowledged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_clamped() {
        assert_eq!(InboxQuery::default().page_size(), DEFAULT_PAGE_SIZE);
        let query = InboxQuery {
            limit: Some(10_000),
            ..Default::default()
        };
        assert_eq!(query.page_size(), MAX_PAGE_SIZE);
        let query = InboxQuery {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(query.page_size(), 1);
    }
}
