//! Polling loop over `scheduled_jobs`.
//!
//! Each tick claims up to `batch_size` due jobs (`FOR UPDATE SKIP LOCKED`, so
//! several runners can share a database), executes them, and writes back the
//! next fire instant and status.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use redis::aio::ConnectionManager;
use sqlx::PgPool;

use bosun_common::config::AppConfig;
use bosun_common::types::{JobStatus, ScheduledJob};
use bosun_engine::jobs::{next_fire, run_outcome};
use bosun_engine::processor::RuleProcessor;

use crate::tasks;

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub tick: StdDuration,
    pub batch_size: i64,
    /// How late a one-shot job may be at start-up before it is marked missed.
    pub missed_grace: Duration,
}

impl RunnerConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            tick: StdDuration::from_millis(config.scheduler_tick_ms.max(1)),
            batch_size: i64::from(config.scheduler_batch_size.max(1)),
            missed_grace: Duration::seconds(config.scheduler_missed_grace_secs as i64),
        }
    }
}

/// What start-up recovery does with an overdue pending job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// Still within the grace period; runs on the next tick.
    Keep,
    /// Move to the next fire instant after now.
    Reschedule(DateTime<Utc>),
    /// Nothing left to fire.
    Missed,
}

/// Decide how to recover `job`, which was due at `due` while no runner was online.
pub fn recovery_for(
    job: &ScheduledJob,
    due: DateTime<Utc>,
    now: DateTime<Utc>,
    grace: Duration,
) -> Recovery {
    if due >= now - grace {
        return Recovery::Keep;
    }
    match next_fire(job, now) {
        Some(next) => Recovery::Reschedule(next),
        None => Recovery::Missed,
    }
}

/// Counts from start-up recovery.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    pub released: u64,
    pub rescheduled: u64,
    pub missed: u64,
}

pub struct JobRunner {
    pool: PgPool,
    redis: ConnectionManager,
    processor: RuleProcessor,
    config: RunnerConfig,
}

impl JobRunner {
    pub fn new(pool: PgPool, redis: ConnectionManager, config: RunnerConfig) -> Self {
        Self {
            pool,
            redis,
            processor: RuleProcessor::new(),
            config,
        }
    }

    /// Recover, then tick forever. Tick errors are logged and the loop continues.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let report = self.recover(Utc::now()).await?;
        tracing::info!(
            released = report.released,
            rescheduled = report.rescheduled,
            missed = report.missed,
            tick_ms = self.config.tick.as_millis() as u64,
            batch_size = self.config.batch_size,
            "Job runner started"
        );

        let mut interval = tokio::time::interval(self.config.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = self.tick(Utc::now()).await {
                tracing::error!(error = %e, "Scheduler tick failed");
            }
        }
    }

    /// Repair state left behind by a runner that stopped mid-flight.
    pub async fn recover(&self, now: DateTime<Utc>) -> anyhow::Result<RecoveryReport> {
        let mut report = RecoveryReport::default();

        report.released = sqlx::query(
            "UPDATE scheduled_jobs SET status = 'pending', updated_at = NOW() WHERE status = 'running'",
        )
        .execute(&self.pool)
        .await?
        .rows_affected();
        if report.released > 0 {
            tracing::warn!(count = report.released, "Released jobs left running by a previous runner");
        }

        let overdue: Vec<ScheduledJob> = sqlx::query_as(
            "SELECT * FROM scheduled_jobs WHERE status = 'pending' AND next_run < $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        for job in &overdue {
            let Some(due) = job.next_run else { continue };
            match recovery_for(job, due, now, self.config.missed_grace) {
                Recovery::Keep => {}
                Recovery::Reschedule(next) => {
                    sqlx::query(
                        "UPDATE scheduled_jobs SET next_run = $1, updated_at = NOW() WHERE id = $2 AND status = 'pending'",
                    )
                    .bind(next)
                    .bind(job.id)
                    .execute(&self.pool)
                    .await?;
                    report.rescheduled += 1;
                }
                Recovery::Missed => {
                    sqlx::query(
                        "UPDATE scheduled_jobs SET status = 'missed', next_run = NULL, updated_at = NOW() WHERE id = $1 AND status = 'pending'",
                    )
                    .bind(job.id)
                    .execute(&self.pool)
                    .await?;
                    tracing::warn!(job_id = %job.id, kind = %job.kind, due = %due, "Job missed");
                    report.missed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Claim and execute every due job. Returns how many ran.
    ///
    /// A job whose outcome cannot be written back is logged and left
    /// `running`; start-up recovery releases it. The rest of the batch still runs.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let jobs = self.claim_due(now).await?;
        for job in &jobs {
            let result = tasks::execute(job, now, &self.pool, &mut self.redis, &self.processor).await;
            if let Err(e) = self.finish(job, now, result).await {
                tracing::error!(job_id = %job.id, kind = %job.kind, error = %e, "Failed to record job outcome");
            }
        }
        Ok(jobs.len())
    }

    async fn claim_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledJob>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE scheduled_jobs SET status = 'running', updated_at = NOW()
            WHERE id IN (
                SELECT id FROM scheduled_jobs
                WHERE status = 'pending' AND next_run <= $1
                ORDER BY next_run
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(self.config.batch_size)
        .fetch_all(&self.pool)
        .await
    }

    async fn finish(
        &self,
        job: &ScheduledJob,
        now: DateTime<Utc>,
        result: anyhow::Result<()>,
    ) -> Result<(), sqlx::Error> {
        let outcome = run_outcome(job, now, result.is_ok());
        let last_error = match &result {
            Ok(()) => None,
            Err(e) => {
                tracing::error!(job_id = %job.id, kind = %job.kind, error = %e, "Job execution failed");
                Some(format!("{:#}", e))
            }
        };

        sqlx::query(
            r#"
            UPDATE scheduled_jobs
            SET status = $1, run_count = $2, next_run = $3, last_run = $4,
                last_error = $5, updated_at = NOW()
            WHERE id = $6
            "#,
        )
        .bind(outcome.status.as_str())
        .bind(outcome.run_count)
        .bind(outcome.next_run)
        .bind(now)
        .bind(last_error)
        .bind(job.id)
        .execute(&self.pool)
        .await?;

        if outcome.status != JobStatus::Pending {
            tracing::info!(job_id = %job.id, status = %outcome.status, runs = outcome.run_count, "Job finished");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bosun_common::types::{JobKind, Schedule};
    use sqlx::types::Json;
    use uuid::Uuid;

    fn job(schedule: Schedule, created_at: DateTime<Utc>) -> ScheduledJob {
        ScheduledJob {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "test".to_string(),
            kind: JobKind::Reminder,
            schedule: Json(schedule),
            payload: serde_json::json!({}),
            reminders: Json(Vec::new()),
            status: JobStatus::Pending,
            last_run: None,
            next_run: None,
            run_count: 0,
            max_runs: None,
            last_error: None,
            created_by: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn test_recently_overdue_job_is_kept() {
        let now = Utc::now();
        let at = now - Duration::seconds(30);
        let j = job(Schedule::Once { at }, now - Duration::hours(1));
        assert_eq!(recovery_for(&j, at, now, Duration::minutes(5)), Recovery::Keep);
    }

    #[test]
    fn test_stale_once_job_is_missed() {
        let now = Utc::now();
        let at = now - Duration::hours(2);
        let j = job(Schedule::Once { at }, now - Duration::days(1));
        assert_eq!(recovery_for(&j, at, now, Duration::minutes(5)), Recovery::Missed);
    }

    #[test]
    fn test_stale_reminder_skips_to_due_instant() {
        let now = Utc::now();
        let at = now + Duration::minutes(30);
        let mut j = job(Schedule::Once { at }, now - Duration::days(1));
        j.reminders = Json(vec![120]);
        let reminder = at - Duration::minutes(120);
        assert_eq!(
            recovery_for(&j, reminder, now, Duration::minutes(5)),
            Recovery::Reschedule(at)
        );
    }

    #[test]
    fn test_stale_interval_job_is_rescheduled_from_now() {
        let now = Utc::now();
        let j = job(Schedule::Interval { every_secs: 600 }, now - Duration::days(1));
        assert_eq!(
            recovery_for(&j, now - Duration::hours(3), now, Duration::minutes(5)),
            Recovery::Reschedule(now + Duration::minutes(10))
        );
    }
}
