//! Execution of a claimed job, by kind.

use chrono::{DateTime, Duration, Utc};
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::types::{JobKind, ScheduledJob};
use bosun_engine::dispatch::{DispatchRequest, Dispatcher};
use bosun_engine::inbox::NotificationInbox;
use bosun_engine::jobs::{
    EscalationPayload, ExpirySweepPayload, JobService, ReminderPayload, reminder_context,
};
use bosun_engine::processor::{RuleProcessor, expiry};
use bosun_engine::queue::NotificationQueue;
use bosun_engine::recipients::RecipientResolver;
use bosun_engine::rules::RuleService;
use bosun_engine::template::render;
use bosun_fleet::crew::{CrewService, check_horizon};
use bosun_fleet::documents::DocumentService;

pub async fn execute(
    job: &ScheduledJob,
    now: DateTime<Utc>,
    pool: &PgPool,
    redis: &mut ConnectionManager,
    processor: &RuleProcessor,
) -> anyhow::Result<()> {
    tracing::debug!(job_id = %job.id, kind = %job.kind, run = job.run_count + 1, "Executing job");
    match job.kind {
        JobKind::Reminder => run_reminder(job, now, pool, redis).await,
        JobKind::Escalation => run_escalation(job, pool, redis).await,
        JobKind::ExpirySweep => run_expiry_sweep(job, now, pool, redis, processor).await,
    }
}

async fn run_reminder(
    job: &ScheduledJob,
    now: DateTime<Utc>,
    pool: &PgPool,
    redis: &mut ConnectionManager,
) -> anyhow::Result<()> {
    let payload: ReminderPayload = serde_json::from_value(job.payload.clone())?;
    let context = reminder_context(job, now);

    let recipients =
        RecipientResolver::resolve_for_tenant(pool, job.tenant_id, &payload.recipients, job.created_by)
            .await?;

    let request = DispatchRequest {
        tenant_id: job.tenant_id,
        trigger_id: Uuid::new_v4(),
        rule_id: None,
        job_id: Some(job.id),
        recipients,
        channels: payload.channels,
        title: render(&payload.title, &context).text,
        body: render(&payload.body, &context).text,
        escalation_level: 0,
    };

    let mut queue = NotificationQueue::new(redis.clone());
    let created = Dispatcher::dispatch(pool, &mut queue, &request).await?;
    if created.is_empty() {
        tracing::warn!(job_id = %job.id, "Reminder had no one to notify");
    }
    Ok(())
}

/// Notify the next escalation level unless someone acknowledged the trigger.
async fn run_escalation(
    job: &ScheduledJob,
    pool: &PgPool,
    redis: &mut ConnectionManager,
) -> anyhow::Result<()> {
    let payload: EscalationPayload = serde_json::from_value(job.payload.clone())?;

    if NotificationInbox::trigger_acknowledged(pool, payload.trigger_id).await? {
        tracing::debug!(trigger_id = %payload.trigger_id, level = payload.level, "Trigger acknowledged; escalation stopped");
        return Ok(());
    }

    let rule = match RuleService::get(pool, job.tenant_id, payload.rule_id).await {
        Ok(rule) if rule.active => rule,
        Ok(_) | Err(AppError::NotFound(_)) => {
            tracing::info!(rule_id = %payload.rule_id, "Rule gone or inactive; escalation dropped");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let levels = rule
        .escalation
        .as_ref()
        .map(|policy| policy.levels.as_slice())
        .unwrap_or_default();
    let Some(level) = payload.level.checked_sub(1).and_then(|i| levels.get(i)) else {
        tracing::warn!(rule_id = %rule.id, level = payload.level, "Escalation level no longer exists");
        return Ok(());
    };

    let recipients =
        RecipientResolver::resolve_for_tenant(pool, job.tenant_id, &level.recipients, payload.actor_id)
            .await?;

    let request = DispatchRequest {
        tenant_id: job.tenant_id,
        trigger_id: payload.trigger_id,
        rule_id: Some(rule.id),
        job_id: Some(job.id),
        recipients,
        channels: rule.channels.0.clone(),
        title: payload.title.clone(),
        body: payload.body.clone(),
        escalation_level: i32::try_from(payload.level)?,
    };
    let mut queue = NotificationQueue::new(redis.clone());
    let created = Dispatcher::dispatch(pool, &mut queue, &request).await?;

    tracing::info!(
        trigger_id = %payload.trigger_id,
        level = payload.level,
        notifications = created.len(),
        "Escalated"
    );

    if let Some(next) = levels.get(payload.level) {
        let next_payload = EscalationPayload {
            level: payload.level + 1,
            ..payload.clone()
        };
        let at = Duration::try_minutes(next.after_minutes)
            .and_then(|delay| payload.triggered_at.checked_add_signed(delay))
            .ok_or_else(|| anyhow::anyhow!("escalation level {} delay out of range", next_payload.level))?;
        JobService::create_escalation(pool, job.tenant_id, &next_payload, at).await?;
    }

    Ok(())
}

/// Raise expiry events for everything due within the horizon and feed them
/// through the rules. Cadence on the matching rules decides how often people
/// hear about the same item.
async fn run_expiry_sweep(
    job: &ScheduledJob,
    now: DateTime<Utc>,
    pool: &PgPool,
    redis: &mut ConnectionManager,
    processor: &RuleProcessor,
) -> anyhow::Result<()> {
    let payload: ExpirySweepPayload = serde_json::from_value(job.payload.clone())?;
    check_horizon(payload.horizon_days)?;
    let tenant_id = job.tenant_id;
    let today = now.date_naive();

    let mut events = Vec::new();

    for document in DocumentService::expiring_for_tenant(pool, tenant_id, payload.horizon_days).await? {
        let Some(expires_on) = document.expires_on else { continue };
        events.push(expiry::document_expiring(
            tenant_id,
            document.id,
            &document.title,
            &document.category.to_string(),
            expires_on,
            today,
        ));
    }

    for certificate in
        CrewService::expiring_certificates_for_tenant(pool, tenant_id, payload.horizon_days).await?
    {
        events.push(expiry::certificate_expiring(
            tenant_id,
            certificate.id,
            &certificate.crew_member_name,
            &certificate.name,
            certificate.expires_on,
            today,
        ));
    }

    for member in CrewService::ending_contracts_for_tenant(pool, tenant_id, payload.horizon_days).await? {
        let Some(contract_end) = member.contract_end else { continue };
        events.push(expiry::contract_ending(
            tenant_id,
            member.id,
            &member.full_name,
            &member.position,
            contract_end,
            today,
        ));
    }

    let mut fired = 0;
    let mut failed = 0;
    for event in &events {
        match processor.process_event(event, pool, redis).await {
            Ok(count) => fired += count,
            Err(e) => {
                failed += 1;
                tracing::error!(
                    job_id = %job.id,
                    event_type = %event.event_type,
                    error = %e,
                    "Expiry event failed; continuing sweep"
                );
            }
        }
    }

    tracing::info!(
        job_id = %job.id,
        tenant_id = %tenant_id,
        horizon_days = payload.horizon_days,
        events = events.len(),
        fired,
        failed,
        "Expiry sweep complete"
    );
    Ok(())
}
