//! Scheduled jobs: schedule arithmetic, reminder instants and job CRUD.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::types::{
    ChannelType, JobKind, JobStatus, RecipientPolicy, Schedule, ScheduledJob,
};

/// Default look-ahead of an expiry sweep when its payload omits `horizon_days`.
pub const DEFAULT_HORIZON_DAYS: i64 = 30;

/// Longest accepted interval schedule (ten years).
pub const MAX_INTERVAL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Longest accepted reminder offset (ten years).
pub const MAX_REMINDER_MINUTES: i64 = 10 * 365 * 24 * 60;

/// Compute the next UTC execution time for `schedule` strictly after `from`.
///
/// Returns `None` when the schedule is exhausted (a `Once` job whose instant
/// has already passed).
pub fn compute_next_run(schedule: &Schedule, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::Once { at } => (*at > from).then_some(*at),

        Schedule::Interval { every_secs } => {
            let step = Duration::try_seconds(i64::try_from(*every_secs).ok()?)?;
            from.checked_add_signed(step)
        }

        Schedule::Daily { hour, minute } => {
            let candidate = Utc
                .with_ymd_and_hms(
                    from.year(),
                    from.month(),
                    from.day(),
                    *hour as u32,
                    *minute as u32,
                    0,
                )
                .single()?;
            if candidate > from {
                Some(candidate)
            } else {
                candidate.checked_add_signed(Duration::days(1))
            }
        }

        Schedule::Weekly { day, hour, minute } => {
            // 0 = Monday, matching chrono's `num_days_from_monday`.
            let today = from.weekday().num_days_from_monday() as i64;
            let target = (*day as i64).clamp(0, 6);
            let days_ahead = (target - today).rem_euclid(7);
            let candidate_day = from.checked_add_signed(Duration::days(days_ahead))?;

            let candidate = Utc
                .with_ymd_and_hms(
                    candidate_day.year(),
                    candidate_day.month(),
                    candidate_day.day(),
                    *hour as u32,
                    *minute as u32,
                    0,
                )
                .single()?;

            if candidate > from {
                Some(candidate)
            } else {
                candidate.checked_add_signed(Duration::days(7))
            }
        }
    }
}

/// All fire instants of a one-shot job: one per reminder offset plus the due
/// instant itself, ascending and deduplicated. Instants before `created_at`,
/// or outside the representable range, are dropped.
pub fn fire_instants(
    at: DateTime<Utc>,
    reminders: &[i64],
    created_at: DateTime<Utc>,
) -> Vec<DateTime<Utc>> {
    let mut instants: Vec<DateTime<Utc>> = reminders
        .iter()
        .filter_map(|m| at.checked_sub_signed(Duration::try_minutes(*m)?))
        .filter(|t| *t >= created_at)
        .collect();
    instants.push(at);
    instants.sort();
    instants.dedup();
    instants
}

/// Earliest instant after `from` at which `job` should fire, honouring
/// reminders and `max_runs`.
pub fn next_fire(job: &ScheduledJob, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some(max) = job.max_runs
        && job.run_count >= max
    {
        return None;
    }

    match &job.schedule.0 {
        Schedule::Once { at } => fire_instants(*at, &job.reminders, job.created_at)
            .into_iter()
            .find(|t| *t > from),
        schedule => compute_next_run(schedule, from),
    }
}

/// Resulting state of a job after one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: JobStatus,
    pub run_count: i32,
    pub next_run: Option<DateTime<Utc>>,
}

/// State transition after a job ran at `now`.
///
/// The job stays `pending` while it has another fire instant. Without one it
/// becomes `completed`, or `failed` when this last run errored.
pub fn run_outcome(job: &ScheduledJob, now: DateTime<Utc>, succeeded: bool) -> RunOutcome {
    let mut advanced = job.clone();
    advanced.run_count += 1;
    let next_run = next_fire(&advanced, now);

    let status = match (next_run, succeeded) {
        (Some(_), _) => JobStatus::Pending,
        (None, true) => JobStatus::Completed,
        (None, false) => JobStatus::Failed,
    };

    RunOutcome {
        status,
        run_count: advanced.run_count,
        next_run,
    }
}

/// Payload of a `reminder` job. Templates are rendered with
/// `job_name`, `due_at`, `minutes_until_due` and `is_due`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderPayload {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub recipients: RecipientPolicy,
    #[serde(default = "default_reminder_channels")]
    pub channels: Vec<ChannelType>,
}

fn default_reminder_channels() -> Vec<ChannelType> {
    vec![ChannelType::InApp]
}

/// Payload of an `escalation` job created by the rule processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationPayload {
    pub trigger_id: Uuid,
    pub rule_id: Uuid,
    /// 1-based index into the rule's escalation levels.
    pub level: usize,
    /// When the rule originally fired; level delays are measured from here.
    pub triggered_at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub title: String,
    pub body: String,
}

/// Payload of an `expiry_sweep` job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirySweepPayload {
    #[serde(default = "default_horizon")]
    pub horizon_days: i64,
}

fn default_horizon() -> i64 {
    DEFAULT_HORIZON_DAYS
}

/// Template variables for a reminder fired at `fired_at`.
pub fn reminder_context(job: &ScheduledJob, fired_at: DateTime<Utc>) -> serde_json::Value {
    let due_at = match &job.schedule.0 {
        Schedule::Once { at } => *at,
        _ => fired_at,
    };
    let minutes_until_due = (due_at - fired_at).num_minutes().max(0);

    serde_json::json!({
        "job_name": job.name,
        "due_at": due_at.to_rfc3339(),
        "minutes_until_due": minutes_until_due,
        "is_due": fired_at >= due_at,
    })
}

/// Service layer for scheduled job CRUD operations.
pub struct JobService;

/// Parameters for creating a job.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateJobParams {
    pub name: String,
    pub kind: JobKind,
    pub schedule: Schedule,
    #[serde(default = "empty_object")]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub reminders: Vec<i64>,
    pub max_runs: Option<i32>,
}

fn empty_object() -> serde_json::Value {
    serde_json::json!({})
}

/// Parameters for updating a job. Omitted fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateJobParams {
    pub name: Option<String>,
    pub schedule: Option<Schedule>,
    pub payload: Option<serde_json::Value>,
    pub reminders: Option<Vec<i64>>,
    pub max_runs: Option<i32>,
}

impl JobService {
    /// Create a job and compute its first `next_run`.
    pub async fn create(
        pool: &PgPool,
        tenant_id: Uuid,
        created_by: Option<Uuid>,
        params: &CreateJobParams,
    ) -> Result<ScheduledJob, AppError> {
        Self::validate(
            &params.name,
            params.kind,
            &params.schedule,
            &params.payload,
            &params.reminders,
            params.max_runs,
        )?;

        let now = Utc::now();
        let mut job = ScheduledJob {
            id: Uuid::new_v4(),
            tenant_id,
            name: params.name.trim().to_string(),
            kind: params.kind,
            schedule: Json(params.schedule.clone()),
            payload: params.payload.clone(),
            reminders: Json(params.reminders.clone()),
            status: JobStatus::Pending,
            last_run: None,
            next_run: None,
            run_count: 0,
            max_runs: params.max_runs,
            last_error: None,
            created_by,
            created_at: now,
            updated_at: now,
        };
        job.next_run = next_fire(&job, now);
        if job.next_run.is_none() {
            return Err(AppError::Validation(
                "Schedule has no future run time".to_string(),
            ));
        }

        let job = Self::insert(pool, &job).await?;

        tracing::info!(
            job_id = %job.id,
            tenant_id = %tenant_id,
            kind = %job.kind,
            next_run = ?job.next_run,
            "Scheduled job created"
        );

        Ok(job)
    }

    /// Create the escalation job for `payload.level` of a rule, due at `at`.
    pub async fn create_escalation(
        pool: &PgPool,
        tenant_id: Uuid,
        payload: &EscalationPayload,
        at: DateTime<Utc>,
    ) -> anyhow::Result<ScheduledJob> {
        let now = Utc::now();
        let job = ScheduledJob {
            id: Uuid::new_v4(),
            tenant_id,
            name: format!("escalation L{} for trigger {}", payload.level, payload.trigger_id),
            kind: JobKind::Escalation,
            schedule: Json(Schedule::Once { at }),
            payload: serde_json::to_value(payload)?,
            reminders: Json(Vec::new()),
            status: JobStatus::Pending,
            last_run: None,
            next_run: Some(at),
            run_count: 0,
            max_runs: Some(1),
            last_error: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        };

        let job = Self::insert(pool, &job).await?;

        tracing::debug!(
            job_id = %job.id,
            trigger_id = %payload.trigger_id,
            level = payload.level,
            due = %at,
            "Escalation scheduled"
        );

        Ok(job)
    }

    async fn insert(pool: &PgPool, job: &ScheduledJob) -> Result<ScheduledJob, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO scheduled_jobs
                (id, tenant_id, name, kind, schedule, payload, reminders, status,
                 next_run, run_count, max_runs, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0, $10, $11, $12, $12)
            RETURNING *
            "#,
        )
        .bind(job.id)
        .bind(job.tenant_id)
        .bind(&job.name)
        .bind(job.kind.as_str())
        .bind(&job.schedule)
        .bind(&job.payload)
        .bind(&job.reminders)
        .bind(job.status.as_str())
        .bind(job.next_run)
        .bind(job.max_runs)
        .bind(job.created_by)
        .bind(job.created_at)
        .fetch_one(pool)
        .await
    }

    /// List all jobs of a tenant, soonest first.
    pub async fn list(pool: &PgPool, tenant_id: Uuid) -> Result<Vec<ScheduledJob>, AppError> {
        let jobs: Vec<ScheduledJob> = sqlx::query_as(
            r#"
            SELECT * FROM scheduled_jobs
            WHERE tenant_id = $1
            ORDER BY next_run ASC NULLS LAST, created_at DESC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await?;

        Ok(jobs)
    }

    pub async fn get(pool: &PgPool, tenant_id: Uuid, job_id: Uuid) -> Result<ScheduledJob, AppError> {
        sqlx::query_as("SELECT * FROM scheduled_jobs WHERE id = $1 AND tenant_id = $2")
            .bind(job_id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))
    }

    /// Update a job. The next run is recomputed from now and the job is
    /// re-armed when it has one.
    pub async fn update(
        pool: &PgPool,
        tenant_id: Uuid,
        job_id: Uuid,
        params: &UpdateJobParams,
    ) -> Result<ScheduledJob, AppError> {
        let mut job = Self::get(pool, tenant_id, job_id).await?;
        if job.status == JobStatus::Running {
            return Err(AppError::Conflict(
                "Job is running and cannot be modified".to_string(),
            ));
        }

        if let Some(name) = &params.name {
            job.name = name.trim().to_string();
        }
        if let Some(schedule) = &params.schedule {
            job.schedule = Json(schedule.clone());
        }
        if let Some(payload) = &params.payload {
            job.payload = payload.clone();
        }
        if let Some(reminders) = &params.reminders {
            job.reminders = Json(reminders.clone());
        }
        if params.max_runs.is_some() {
            job.max_runs = params.max_runs;
        }

        Self::validate(
            &job.name,
            job.kind,
            &job.schedule,
            &job.payload,
            &job.reminders,
            job.max_runs,
        )?;

        job.next_run = next_fire(&job, Utc::now());
        job.status = if job.next_run.is_some() {
            JobStatus::Pending
        } else {
            JobStatus::Completed
        };

        let job: ScheduledJob = sqlx::query_as(
            r#"
            UPDATE scheduled_jobs
            SET name = $1, schedule = $2, payload = $3, reminders = $4, max_runs = $5,
                next_run = $6, status = $7, updated_at = NOW()
            WHERE id = $8 AND tenant_id = $9
            RETURNING *
            "#,
        )
        .bind(&job.name)
        .bind(&job.schedule)
        .bind(&job.payload)
        .bind(&job.reminders)
        .bind(job.max_runs)
        .bind(job.next_run)
        .bind(job.status.as_str())
        .bind(job_id)
        .bind(tenant_id)
        .fetch_one(pool)
        .await?;

        tracing::info!(job_id = %job_id, next_run = ?job.next_run, "Scheduled job updated");

        Ok(job)
    }

    /// Delete a job. Returns true if it was deleted.
    pub async fn delete(pool: &PgPool, tenant_id: Uuid, job_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM scheduled_jobs WHERE id = $1 AND tenant_id = $2")
            .bind(job_id)
            .bind(tenant_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Make a job due immediately. The runner picks it up on its next tick.
    pub async fn trigger_now(
        pool: &PgPool,
        tenant_id: Uuid,
        job_id: Uuid,
    ) -> Result<ScheduledJob, AppError> {
        let job: Option<ScheduledJob> = sqlx::query_as(
            r#"
            UPDATE scheduled_jobs
            SET next_run = NOW(), status = 'pending', updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2 AND status <> 'running'
            RETURNING *
            "#,
        )
        .bind(job_id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await?;

        match job {
            Some(job) => {
                tracing::info!(job_id = %job_id, "Scheduled job triggered manually");
                Ok(job)
            }
            None => {
                // Distinguish "missing" from "currently running".
                Self::get(pool, tenant_id, job_id).await?;
                Err(AppError::Conflict("Job is already running".to_string()))
            }
        }
    }

    fn validate(
        name: &str,
        kind: JobKind,
        schedule: &Schedule,
        payload: &serde_json::Value,
        reminders: &[i64],
        max_runs: Option<i32>,
    ) -> Result<(), AppError> {
        if name.trim().is_empty() {
            return Err(AppError::Validation("Job name must not be empty".to_string()));
        }

        match schedule {
            Schedule::Once { .. } => {}
            Schedule::Interval { every_secs } => {
                if *every_secs == 0 || *every_secs > MAX_INTERVAL_SECS {
                    return Err(AppError::Validation(format!(
                        "Interval must be between 1 and {} seconds",
                        MAX_INTERVAL_SECS
                    )));
                }
            }
            Schedule::Daily { hour, minute } => validate_time(*hour, *minute)?,
            Schedule::Weekly { day, hour, minute } => {
                if *day > 6 {
                    return Err(AppError::Validation(
                        "Weekly day must be 0 (Monday) to 6 (Sunday)".to_string(),
                    ));
                }
                validate_time(*hour, *minute)?;
            }
        }

        if !reminders.is_empty() {
            if schedule.is_recurring() {
                return Err(AppError::Validation(
                    "Reminders are only supported on one-shot schedules".to_string(),
                ));
            }
            if reminders.iter().any(|m| *m <= 0 || *m > MAX_REMINDER_MINUTES) {
                return Err(AppError::Validation(format!(
                    "Reminder offsets must be between 1 and {} minutes",
                    MAX_REMINDER_MINUTES
                )));
            }
        }

        if let Some(max) = max_runs
            && max <= 0
        {
            return Err(AppError::Validation("max_runs must be positive".to_string()));
        }

        let payload_error = match kind {
            JobKind::Reminder => match serde_json::from_value::<ReminderPayload>(payload.clone()) {
                Ok(p) if p.title.trim().is_empty() || p.channels.is_empty() => {
                    Some("reminder needs a title and at least one channel".to_string())
                }
                Ok(_) => None,
                Err(e) => Some(e.to_string()),
            },
            JobKind::Escalation => serde_json::from_value::<EscalationPayload>(payload.clone())
                .err()
                .map(|e| e.to_string()),
            JobKind::ExpirySweep => {
                match serde_json::from_value::<ExpirySweepPayload>(payload.clone()) {
                    Ok(p) if p.horizon_days <= 0 => Some("horizon_days must be positive".to_string()),
                    Ok(_) => None,
                    Err(e) => Some(e.to_string()),
                }
            }
        };

        if let Some(err) = payload_error {
            return Err(AppError::Validation(format!(
                "Invalid {} payload: {}",
                kind, err
            )));
        }

        Ok(())
    }
}

fn validate_time(hour: u8, minute: u8) -> Result<(), AppError> {
    if hour > 23 || minute > 59 {
        return Err(AppError::Validation(format!(
            "Invalid time {:02}:{:02}",
            hour, minute
        )));
    }
    Ok(())
}
