use std::{env, str::FromStr, time::Duration};

pub const DEFAULT_API_BASE_URL: &str = "https://codeforces.com/api/";
pub const DEFAULT_SYNC_CRON: &str = "0 2 * * *";
pub const DEFAULT_INACTIVITY_CRON: &str = "0 3 * * *";
pub const DEFAULT_CATALOG_CRON: &str = "0 4 * * *";

/// Settings of the rate-limited upstream client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// Minimum spacing between two outbound calls.
    pub request_delay: Duration,
    /// Wait applied after the upstream answered 429.
    pub rate_limit_cooldown: Duration,
    pub max_rate_limit_retries: u32,
    pub http_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::from(DEFAULT_API_BASE_URL),
            request_delay: Duration::from_millis(1000),
            rate_limit_cooldown: Duration::from_secs(10),
            max_rate_limit_retries: 6,
            http_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Number of profiles synchronized concurrently.
    pub batch_size: usize,
    pub batch_pause: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_pause: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub sync_cron: String,
    pub inactivity_cron: String,
    pub catalog_cron: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            sync_cron: String::from(DEFAULT_SYNC_CRON),
            inactivity_cron: String::from(DEFAULT_INACTIVITY_CRON),
            catalog_cron: String::from(DEFAULT_CATALOG_CRON),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReminderConfig {
    pub inactivity_days: i64,
    /// Pause between two notifications.
    pub delay: Duration,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            inactivity_days: 7,
            delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub client: ClientConfig,
    pub sync: SyncConfig,
    pub schedule: ScheduleConfig,
    pub reminder: ReminderConfig,
    pub worker_queue_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            client: ClientConfig::default(),
            sync: SyncConfig::default(),
            schedule: ScheduleConfig::default(),
            reminder: ReminderConfig::default(),
            worker_queue_size: 8,
        }
    }
}

impl Config {
    /// Build the configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let client = ClientConfig {
            base_url: env::var("CF_API_BASE_URL").unwrap_or_else(|_| String::from(DEFAULT_API_BASE_URL)),
            request_delay: Duration::from_millis(parse_var("CF_REQUEST_DELAY_MS", 1000)),
            rate_limit_cooldown: Duration::from_secs(parse_var("CF_RATE_LIMIT_COOLDOWN_SECS", 10)),
            max_rate_limit_retries: parse_var("CF_MAX_RATE_LIMIT_RETRIES", 6),
            http_timeout: Duration::from_secs(parse_var("CF_HTTP_TIMEOUT_SECS", 10)),
        };
        let sync = SyncConfig {
            batch_size: parse_var("SYNC_BATCH_SIZE", 5usize).max(1),
            batch_pause: Duration::from_millis(parse_var("SYNC_BATCH_PAUSE_MS", 2000)),
        };
        let schedule = ScheduleConfig {
            sync_cron: env::var("SYNC_CRON").unwrap_or_else(|_| String::from(DEFAULT_SYNC_CRON)),
            inactivity_cron: env::var("INACTIVITY_CRON")
                .unwrap_or_else(|_| String::from(DEFAULT_INACTIVITY_CRON)),
            catalog_cron: env::var("CATALOG_CRON").unwrap_or_else(|_| String::from(DEFAULT_CATALOG_CRON)),
        };
        let reminder = ReminderConfig {
            inactivity_days: parse_var("INACTIVITY_DAYS", 7),
            delay: Duration::from_millis(parse_var("REMINDER_DELAY_MS", 1000)),
        };

        Self {
            database_url: env::var("DATABASE_URL").ok(),
            client,
            sync,
            schedule,
            reminder,
            worker_queue_size: parse_var("WORKER_QUEUE_SIZE", 8usize).max(1),
        }
    }
}

fn parse_var<T: FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(
                "{} has an invalid value `{}`. Default value `{}` will be used.",
                name,
                value,
                default
            );
            default
        }),
        Err(_) => default,
    }
}
