use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

// ============================================================
// Tenancy and accounts
// ============================================================

/// Role of a user inside a tenant. Drives permissions and recipient resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Manager,
    Captain,
    ChiefEngineer,
    Engineer,
    Crew,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Manager => "manager",
            UserRole::Captain => "captain",
            UserRole::ChiefEngineer => "chief_engineer",
            UserRole::Engineer => "engineer",
            UserRole::Crew => "crew",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "manager" => Ok(UserRole::Manager),
            "captain" => Ok(UserRole::Captain),
            "chief_engineer" => Ok(UserRole::ChiefEngineer),
            "engineer" => Ok(UserRole::Engineer),
            "crew" => Ok(UserRole::Crew),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// An organisation operating one or more yachts.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub webhook_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A user in the system.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: UserRole,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================
// Fleet
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Yacht {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub imo_number: Option<String>,
    pub flag: Option<String>,
    pub length_m: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Review lifecycle shared by logbook entries and purchase orders.
///
/// `draft → submitted → approved | rejected`, `approved → closed`, `rejected → draft`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum ApprovalStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
    Closed,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Draft => "draft",
            ApprovalStatus::Submitted => "submitted",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::Closed => "closed",
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: ApprovalStatus) -> bool {
        matches!(
            (self, next),
            (ApprovalStatus::Draft, ApprovalStatus::Submitted)
                | (ApprovalStatus::Submitted, ApprovalStatus::Approved)
                | (ApprovalStatus::Submitted, ApprovalStatus::Rejected)
                | (ApprovalStatus::Approved, ApprovalStatus::Closed)
                | (ApprovalStatus::Rejected, ApprovalStatus::Draft)
        )
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum LogbookKind {
    Navigation,
    Engine,
    Deck,
    Incident,
    Maintenance,
}

impl std::fmt::Display for LogbookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogbookKind::Navigation => write!(f, "navigation"),
            LogbookKind::Engine => write!(f, "engine"),
            LogbookKind::Deck => write!(f, "deck"),
            LogbookKind::Incident => write!(f, "incident"),
            LogbookKind::Maintenance => write!(f, "maintenance"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LogbookEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub yacht_id: Uuid,
    pub author_id: Uuid,
    pub kind: LogbookKind,
    pub title: String,
    pub body: String,
    pub occurred_at: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: ApprovalStatus,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A propulsion or auxiliary engine tracked by running hours.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Engine {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub yacht_id: Uuid,
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub current_hours: f64,
    pub service_interval_hours: f64,
    pub last_service_hours: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Engine {
    /// Running hours left before the next service (negative when overdue).
    pub fn hours_until_service(&self) -> f64 {
        self.last_service_hours + self.service_interval_hours - self.current_hours
    }

    pub fn service_due(&self) -> bool {
        self.hours_until_service() <= 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EngineHoursReading {
    pub id: Uuid,
    pub engine_id: Uuid,
    pub hours: f64,
    pub recorded_by: Uuid,
    pub recorded_at: DateTime<Utc>,
}

// ============================================================
// HRM and manifest
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CrewMember {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub yacht_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub full_name: String,
    pub position: String,
    pub nationality: Option<String>,
    pub passport_number: Option<String>,
    pub contract_start: Option<NaiveDate>,
    pub contract_end: Option<NaiveDate>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CrewCertificate {
    pub id: Uuid,
    pub crew_member_id: Uuid,
    pub name: String,
    pub issuer: Option<String>,
    pub number: Option<String>,
    pub issued_on: Option<NaiveDate>,
    pub expires_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum PersonType {
    Crew,
    Guest,
}

impl std::fmt::Display for PersonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersonType::Crew => write!(f, "crew"),
            PersonType::Guest => write!(f, "guest"),
        }
    }
}

/// One person aboard for a voyage.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ManifestEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub yacht_id: Uuid,
    pub voyage_ref: String,
    pub person_name: String,
    pub person_type: PersonType,
    pub crew_member_id: Option<Uuid>,
    pub nationality: Option<String>,
    pub document_number: Option<String>,
    pub embarked_at: DateTime<Utc>,
    pub disembarked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ============================================================
// Purchasing and documents
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub yacht_id: Uuid,
    pub po_number: String,
    pub supplier: String,
    pub currency: String,
    pub status: ApprovalStatus,
    pub total_cents: i64,
    pub requested_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub decision_note: Option<String>,
    pub notes: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PurchaseOrderLine {
    pub id: Uuid,
    pub purchase_order_id: Uuid,
    pub description: String,
    pub part_number: Option<String>,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub position: i32,
}

impl PurchaseOrderLine {
    pub fn line_total_cents(&self) -> i64 {
        i64::from(self.quantity) * self.unit_price_cents
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum DocumentCategory {
    Certificate,
    Manual,
    Insurance,
    Registration,
    Crew,
    Other,
}

impl std::fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentCategory::Certificate => write!(f, "certificate"),
            DocumentCategory::Manual => write!(f, "manual"),
            DocumentCategory::Insurance => write!(f, "insurance"),
            DocumentCategory::Registration => write!(f, "registration"),
            DocumentCategory::Crew => write!(f, "crew"),
            DocumentCategory::Other => write!(f, "other"),
        }
    }
}

/// Document metadata. File bytes live in object storage under `storage_key`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub yacht_id: Option<Uuid>,
    pub title: String,
    pub category: DocumentCategory,
    pub storage_key: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub version: i32,
    pub expires_on: Option<NaiveDate>,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================
// Domain events
// ============================================================

/// Kinds of domain events that notification rules can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "logbook.submitted")]
    LogbookSubmitted,
    #[serde(rename = "logbook.reviewed")]
    LogbookReviewed,
    #[serde(rename = "engine.hours_recorded")]
    EngineHoursRecorded,
    #[serde(rename = "engine.serviced")]
    EngineServiced,
    #[serde(rename = "purchase_order.submitted")]
    PurchaseOrderSubmitted,
    #[serde(rename = "purchase_order.approved")]
    PurchaseOrderApproved,
    #[serde(rename = "purchase_order.rejected")]
    PurchaseOrderRejected,
    #[serde(rename = "purchase_order.closed")]
    PurchaseOrderClosed,
    #[serde(rename = "certificate.expiring")]
    CertificateExpiring,
    #[serde(rename = "document.expiring")]
    DocumentExpiring,
    #[serde(rename = "crew.contract_ending")]
    CrewContractEnding,
    #[serde(rename = "manifest.updated")]
    ManifestUpdated,
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        EventKind::LogbookSubmitted,
        EventKind::LogbookReviewed,
        EventKind::EngineHoursRecorded,
        EventKind::EngineServiced,
        EventKind::PurchaseOrderSubmitted,
        EventKind::PurchaseOrderApproved,
        EventKind::PurchaseOrderRejected,
        EventKind::PurchaseOrderClosed,
        EventKind::CertificateExpiring,
        EventKind::DocumentExpiring,
        EventKind::CrewContractEnding,
        EventKind::ManifestUpdated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::LogbookSubmitted => "logbook.submitted",
            EventKind::LogbookReviewed => "logbook.reviewed",
            EventKind::EngineHoursRecorded => "engine.hours_recorded",
            EventKind::EngineServiced => "engine.serviced",
            EventKind::PurchaseOrderSubmitted => "purchase_order.submitted",
            EventKind::PurchaseOrderApproved => "purchase_order.approved",
            EventKind::PurchaseOrderRejected => "purchase_order.rejected",
            EventKind::PurchaseOrderClosed => "purchase_order.closed",
            EventKind::CertificateExpiring => "certificate.expiring",
            EventKind::DocumentExpiring => "document.expiring",
            EventKind::CrewContractEnding => "crew.contract_ending",
            EventKind::ManifestUpdated => "manifest.updated",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown event type: {s}"))
    }
}

/// A business event produced by a write, evaluated against notification rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub tenant_id: Uuid,
    pub event_type: EventKind,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    /// Flat JSON object the rule conditions and templates read from.
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent {
    pub fn new(tenant_id: Uuid, event_type: EventKind, payload: serde_json::Value) -> Self {
        Self {
            tenant_id,
            event_type,
            actor_id: None,
            subject_id: None,
            payload,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn with_subject(mut self, subject_id: Uuid) -> Self {
        self.subject_id = Some(subject_id);
        self
    }
}

// ============================================================
// Notification rules
// ============================================================

/// Comparison operator of a rule condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    In,
    Exists,
    NotExists,
}

impl ConditionOp {
    /// Whether the operator compares against `Condition::value`.
    pub fn takes_value(&self) -> bool {
        !matches!(self, ConditionOp::Exists | ConditionOp::NotExists)
    }
}

/// A single predicate evaluated against an event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: ConditionOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    All,
    Any,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::All => "all",
            MatchMode::Any => "any",
        }
    }
}

/// How often a rule may fire for the same dedupe key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum Cadence {
    #[default]
    Immediate,
    Hourly,
    Daily,
    Weekly,
    Once,
}

impl Cadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Immediate => "immediate",
            Cadence::Hourly => "hourly",
            Cadence::Daily => "daily",
            Cadence::Weekly => "weekly",
            Cadence::Once => "once",
        }
    }
}

/// Notification channel type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ChannelType {
    InApp,
    Email,
    Webhook,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::InApp => "in_app",
            ChannelType::Email => "email",
            ChannelType::Webhook => "webhook",
        }
    }

    /// Webhooks go to the tenant endpoint; the other channels fan out per recipient.
    pub fn is_per_recipient(&self) -> bool {
        !matches!(self, ChannelType::Webhook)
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who receives a notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipientPolicy {
    #[serde(default)]
    pub roles: Vec<UserRole>,
    #[serde(default)]
    pub user_ids: Vec<Uuid>,
    #[serde(default)]
    pub include_actor: bool,
}

impl RecipientPolicy {
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty() && self.user_ids.is_empty() && !self.include_actor
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationLevel {
    /// Minutes after the original trigger before this level fires.
    pub after_minutes: i64,
    pub recipients: RecipientPolicy,
}

/// Escalation ladder applied while a trigger stays unacknowledged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    #[serde(default)]
    pub levels: Vec<EscalationLevel>,
}

/// A tenant-defined notification rule.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationRule {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub event_type: String,
    pub conditions: Json<Vec<Condition>>,
    pub match_mode: MatchMode,
    pub cadence: Cadence,
    pub dedupe_key: Option<String>,
    pub dedupe_window_secs: i64,
    pub title_template: String,
    pub body_template: String,
    pub channels: Json<Vec<ChannelType>>,
    pub recipients: Json<RecipientPolicy>,
    pub escalation: Option<Json<EscalationPolicy>>,
    pub active: bool,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================
// Notifications
// ============================================================

/// Notification delivery status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
    Dead,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "pending"),
            DeliveryStatus::Sent => write!(f, "sent"),
            DeliveryStatus::Failed => write!(f, "failed"),
            DeliveryStatus::Dead => write!(f, "dead"),
        }
    }
}

/// A notification queued for delivery on one channel.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Groups every notification produced by one rule firing or job run.
    pub trigger_id: Uuid,
    pub rule_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
    pub recipient_id: Option<Uuid>,
    pub channel: ChannelType,
    pub title: String,
    pub body: String,
    pub status: DeliveryStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub escalation_level: i32,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ============================================================
// Scheduled jobs
// ============================================================

/// Defines when and how often a job should run (UTC).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Run exactly once at the given instant.
    Once { at: DateTime<Utc> },

    /// Run repeatedly with a fixed interval in seconds.
    Interval { every_secs: u64 },

    /// Run every day at the given hour and minute.
    Daily { hour: u8, minute: u8 },

    /// Run on a weekday (0 = Monday … 6 = Sunday) at the given time.
    Weekly { day: u8, hour: u8, minute: u8 },
}

impl Schedule {
    pub fn is_recurring(&self) -> bool {
        !matches!(self, Schedule::Once { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum JobKind {
    Reminder,
    Escalation,
    ExpirySweep,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Reminder => "reminder",
            JobKind::Escalation => "escalation",
            JobKind::ExpirySweep => "expiry_sweep",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a scheduled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for its next_run time.
    Pending,
    /// Claimed by a runner.
    Running,
    /// No further runs.
    Completed,
    /// Last execution of a one-shot job returned an error.
    Failed,
    /// The scheduled window passed while no runner was online.
    Missed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Missed => "missed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted job record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScheduledJob {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub kind: JobKind,
    pub schedule: Json<Schedule>,
    pub payload: serde_json::Value,
    /// Minutes before a `once` schedule's instant at which reminders fire.
    pub reminders: Json<Vec<i64>>,
    pub status: JobStatus,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub run_count: i32,
    pub max_runs: Option<i32>,
    pub last_error: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
