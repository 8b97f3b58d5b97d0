use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string
    pub redis_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// Port the API server listens on (default: 3000)
    pub api_port: u16,

    /// JWT secret for API authentication
    pub jwt_secret: String,

    /// Access token lifetime in minutes (default: 30)
    pub jwt_expiry_minutes: u64,

    /// Refresh token lifetime in days (default: 14)
    pub refresh_expiry_days: u64,

    /// Whether the refresh cookie carries the `Secure` attribute
    pub cookie_secure: bool,

    /// Whether `POST /api/auth/register` may create new tenants
    pub allow_registration: bool,

    /// Job runner polling interval in milliseconds (default: 1000)
    pub scheduler_tick_ms: u64,

    /// Maximum jobs claimed per runner tick (default: 50)
    pub scheduler_batch_size: u32,

    /// One-shot jobs overdue by more than this at start-up are marked missed (default: 300)
    pub scheduler_missed_grace_secs: u64,

    /// Delivery attempts before a notification is dead-lettered (default: 5)
    pub notifier_max_attempts: u32,

    /// First retry delay in milliseconds (default: 2000)
    pub notifier_backoff_base_ms: u64,

    /// Retry delay cap in milliseconds (default: 300000)
    pub notifier_backoff_max_ms: u64,

    /// Undelivered notifications older than this are put back on the queue (default: 600)
    pub notifier_requeue_grace_secs: u64,

    /// Seconds between sweeps for undelivered notifications (default: 60)
    pub notifier_requeue_interval_secs: u64,

    /// Resend API key for email delivery
    pub resend_api_key: Option<String>,

    /// Email sender address
    pub email_from: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", "20")?,
            api_port: parse_var("API_PORT", "3000")?,
            jwt_secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?,
            jwt_expiry_minutes: parse_var("JWT_EXPIRY_MINUTES", "30")?,
            refresh_expiry_days: parse_var("REFRESH_EXPIRY_DAYS", "14")?,
            cookie_secure: parse_var("COOKIE_SECURE", "true")?,
            allow_registration: parse_var("ALLOW_REGISTRATION", "false")?,
            scheduler_tick_ms: parse_var("SCHEDULER_TICK_MS", "1000")?,
            scheduler_batch_size: parse_var("SCHEDULER_BATCH_SIZE", "50")?,
            scheduler_missed_grace_secs: parse_var("SCHEDULER_MISSED_GRACE_SECS", "300")?,
            notifier_max_attempts: parse_var("NOTIFIER_MAX_ATTEMPTS", "5")?,
            notifier_backoff_base_ms: parse_var("NOTIFIER_BACKOFF_BASE_MS", "2000")?,
            notifier_backoff_max_ms: parse_var("NOTIFIER_BACKOFF_MAX_MS", "300000")?,
            notifier_requeue_grace_secs: parse_var("NOTIFIER_REQUEUE_GRACE_SECS", "600")?,
            notifier_requeue_interval_secs: parse_var("NOTIFIER_REQUEUE_INTERVAL_SECS", "60")?,
            resend_api_key: std::env::var("RESEND_API_KEY").ok(),
            email_from: std::env::var("EMAIL_FROM").ok(),
        })
    }
}

/// Read `name` from the environment (or `default`) and parse it.
fn parse_var<T: std::str::FromStr>(name: &str, default: &str) -> anyhow::Result<T> {
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| {
            anyhow::anyhow!(
                "{} must be a valid {}",
                name,
                std::any::type_name::<T>()
            )
        })
}
