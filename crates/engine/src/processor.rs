//! Rule evaluation pipeline.
//!
//! Receives domain events from business writes (and from expiry sweeps) and:
//! 1. Loads the tenant's active rules for the event type
//! 2. Evaluates conditions against the event payload
//! 3. Applies cadence (per dedupe key) and the Redis dedupe window
//! 4. Resolves recipients, renders the templates and dispatches notifications
//! 5. Schedules the first escalation level when the rule has one

use chrono::{Duration, Utc};
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use uuid::Uuid;

use bosun_common::types::{DomainEvent, NotificationRule};

use crate::cadence::CadenceStore;
use crate::condition::ConditionMatcher;
use crate::dedupe::DedupeGate;
use crate::dispatch::{DispatchRequest, Dispatcher};
use crate::jobs::{EscalationPayload, JobService};
use crate::queue::NotificationQueue;
use crate::recipients::RecipientResolver;
use crate::rules::RuleService;
use crate::template::render;

/// Central event processor that orchestrates the notification pipeline.
pub struct RuleProcessor {
    dedupe: DedupeGate,
}

impl RuleProcessor {
    pub fn new() -> Self {
        Self {
            dedupe: DedupeGate::new(),
        }
    }

    /// Process a domain event through the full rule pipeline.
    ///
    /// Returns the number of rules that fired. A failing rule is logged and
    /// does not stop evaluation of the others.
    pub async fn process_event(
        &self,
        event: &DomainEvent,
        pool: &PgPool,
        redis: &mut ConnectionManager,
    ) -> anyhow::Result<u32> {
        let rules = RuleService::find_active(pool, event.tenant_id, event.event_type).await?;
        if rules.is_empty() {
            return Ok(0);
        }

        let mut fired = 0u32;
        for rule in &rules {
            match self.process_rule(rule, event, pool, redis).await {
                Ok(true) => fired += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        rule_id = %rule.id,
                        event_type = %event.event_type,
                        error = %e,
                        "Rule evaluation failed"
                    );
                }
            }
        }

        Ok(fired)
    }

    /// Like [`process_event`](Self::process_event), but failures are only logged.
    /// Used after business writes, where the write has already committed.
    pub async fn emit(&self, event: DomainEvent, pool: &PgPool, redis: &mut ConnectionManager) {
        match self.process_event(&event, pool, redis).await {
            Ok(fired) if fired > 0 => {
                tracing::debug!(event_type = %event.event_type, fired, "Event processed");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(
                    tenant_id = %event.tenant_id,
                    event_type = %event.event_type,
                    error = %e,
                    "Event processing failed"
                );
            }
        }
    }

    /// Forget trigger history of a rule after it was edited or deleted, so the
    /// new definition starts with open dedupe windows and cadence.
    pub async fn reset_rule(&self, rule_id: Uuid, pool: &PgPool, redis: &mut ConnectionManager) {
        if let Err(e) = self.dedupe.clear(redis, rule_id).await {
            tracing::warn!(rule_id = %rule_id, error = %e, "Failed to clear dedupe keys");
        }
        if let Err(e) = CadenceStore::clear(pool, rule_id).await {
            tracing::warn!(rule_id = %rule_id, error = %e, "Failed to clear cadence state");
        }
    }

    async fn process_rule(
        &self,
        rule: &NotificationRule,
        event: &DomainEvent,
        pool: &PgPool,
        redis: &mut ConnectionManager,
    ) -> anyhow::Result<bool> {
        if !ConditionMatcher::matches(&rule.conditions, rule.match_mode, &event.payload) {
            return Ok(false);
        }

        let now = Utc::now();
        let dedupe_key = DedupeGate::dedupe_key(rule, &event.payload);

        // The claim holds the cadence row until commit; every early return below
        // drops the transaction and rolls the claim back.
        let mut claim = pool.begin().await?;
        if !CadenceStore::claim(&mut claim, rule.id, &dedupe_key, rule.cadence, now).await? {
            tracing::debug!(
                rule_id = %rule.id,
                dedupe_key = %dedupe_key,
                cadence = rule.cadence.as_str(),
                "Trigger suppressed by cadence"
            );
            return Ok(false);
        }

        if !self.dedupe.check_and_set(redis, rule, &dedupe_key).await? {
            return Ok(false);
        }

        let recipients =
            RecipientResolver::resolve_for_tenant(pool, rule.tenant_id, &rule.recipients, event.actor_id)
                .await?;

        let title = render(&rule.title_template, &event.payload);
        let body = render(&rule.body_template, &event.payload);
        if !title.missing.is_empty() || !body.missing.is_empty() {
            tracing::debug!(
                rule_id = %rule.id,
                missing = ?[title.missing.as_slice(), body.missing.as_slice()].concat(),
                "Template placeholders missing from payload"
            );
        }

        let trigger_id = Uuid::new_v4();
        let request = DispatchRequest {
            tenant_id: rule.tenant_id,
            trigger_id,
            rule_id: Some(rule.id),
            job_id: None,
            recipients,
            channels: rule.channels.0.clone(),
            title: title.text,
            body: body.text,
            escalation_level: 0,
        };

        let mut queue = NotificationQueue::new(redis.clone());
        let created = Dispatcher::dispatch(pool, &mut queue, &request).await?;
        if created.is_empty() {
            return Ok(false);
        }

        claim.commit().await?;

        if let Some(escalation) = &rule.escalation
            && let Some(first) = escalation.levels.first()
        {
            let due = Duration::try_minutes(first.after_minutes)
                .and_then(|after| now.checked_add_signed(after))
                .ok_or_else(|| anyhow::anyhow!("escalation delay out of range"))?;
            let payload = EscalationPayload {
                trigger_id,
                rule_id: rule.id,
                level: 1,
                triggered_at: now,
                actor_id: event.actor_id,
                title: request.title.clone(),
                body: request.body.clone(),
            };
            JobService::create_escalation(pool, rule.tenant_id, &payload, due).await?;
        }

        tracing::info!(
            rule_id = %rule.id,
            trigger_id = %trigger_id,
            event_type = %event.event_type,
            notifications = created.len(),
            "Rule fired"
        );

        Ok(true)
    }
}

impl Default for RuleProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Payload builders for the events emitted by the expiry sweep.
pub mod expiry {
    use chrono::NaiveDate;
    use serde_json::json;
    use uuid::Uuid;

    use bosun_common::types::{DomainEvent, EventKind};

    pub fn days_until(expires_on: NaiveDate, today: NaiveDate) -> i64 {
        (expires_on - today).num_days()
    }

    pub fn document_expiring(
        tenant_id: Uuid,
        document_id: Uuid,
        title: &str,
        category: &str,
        expires_on: NaiveDate,
        today: NaiveDate,
    ) -> DomainEvent {
        DomainEvent::new(
            tenant_id,
            EventKind::DocumentExpiring,
            json!({
                "document_id": document_id,
                "title": title,
                "category": category,
                "expires_on": expires_on.to_string(),
                "days_until_expiry": days_until(expires_on, today),
            }),
        )
        .with_subject(document_id)
    }

    pub fn certificate_expiring(
        tenant_id: Uuid,
        certificate_id: Uuid,
        crew_member: &str,
        certificate: &str,
        expires_on: NaiveDate,
        today: NaiveDate,
    ) -> DomainEvent {
        DomainEvent::new(
            tenant_id,
            EventKind::CertificateExpiring,
            json!({
                "certificate_id": certificate_id,
                "crew_member": crew_member,
                "certificate": certificate,
                "expires_on": expires_on.to_string(),
                "days_until_expiry": days_until(expires_on, today),
            }),
        )
        .with_subject(certificate_id)
    }

    pub fn contract_ending(
        tenant_id: Uuid,
        crew_member_id: Uuid,
        crew_member: &str,
        position: &str,
        contract_end: NaiveDate,
        today: NaiveDate,
    ) -> DomainEvent {
        DomainEvent::new(
            tenant_id,
            EventKind::CrewContractEnding,
            json!({
                "crew_member_id": crew_member_id,
                "crew_member": crew_member,
                "position": position,
                "contract_end": contract_end.to_string(),
                "days_until_expiry": days_until(contract_end, today),
            }),
        )
        .with_subject(crew_member_id)
    }
}

#[cfg(test)]
mod tests {
    use super::expiry::*;
    use super::*;
    use crate::test_support::make_rule;
    use bosun_common::types::EventKind;
    use chrono::NaiveDate;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_document_expiring_payload() {
        let tenant = Uuid::new_v4();
        let doc = Uuid::new_v4();
        let event = document_expiring(
            tenant,
            doc,
            "Hull insurance",
            "insurance",
            date(2026, 4, 10),
            date(2026, 3, 31),
        );
        assert_eq!(event.event_type, EventKind::DocumentExpiring);
        assert_eq!(event.subject_id, Some(doc));
        assert_eq!(event.payload["days_until_expiry"], 10);
        assert_eq!(event.payload["expires_on"], "2026-04-10");
    }

    #[test]
    fn test_expired_items_have_negative_days() {
        assert_eq!(days_until(date(2026, 3, 1), date(2026, 3, 4)), -3);
    }

    #[test]
    fn test_sweep_payload_matches_threshold_rule() {
        let rule = make_rule(json!([
            {"field": "days_until_expiry", "op": "lte", "value": 14}
        ]));
        let soon = certificate_expiring(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "A. Jensen",
            "STCW Basic Safety",
            date(2026, 3, 20),
            date(2026, 3, 10),
        );
        let later = contract_ending(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "A. Jensen",
            "Bosun",
            date(2026, 6, 1),
            date(2026, 3, 10),
        );
        assert!(ConditionMatcher::matches(
            &rule.conditions,
            rule.match_mode,
            &soon.payload
        ));
        assert!(!ConditionMatcher::matches(
            &rule.conditions,
            rule.match_mode,
            &later.payload
        ));
    }
}
