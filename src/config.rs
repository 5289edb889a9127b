/// Environment-driven configuration for the scheduler daemon
use crate::modules::scheduler::lock_manager::DEFAULT_LOCK_TIMEOUT;
use crate::shared::errors::{AppError, AppResult};
use std::time::Duration;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);
pub const DAILY: u32 = 86_400;

const DEFAULT_SIMILARITY_COMMAND: &str = "python manage.py calculate_similarities";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Sleep between two ticks of the loop
    pub tick_interval: Duration,
    /// Lease length granted on acquire
    pub lock_timeout: Duration,
    /// How long `stop()` waits for the loop to exit
    pub stop_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceConfig {
    pub similarity_command: Vec<String>,
    pub similarity_interval_seconds: u32,
    pub compress_command: Option<Vec<String>>,
    pub compress_interval_seconds: u32,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            similarity_command: split_command(DEFAULT_SIMILARITY_COMMAND),
            similarity_interval_seconds: DAILY,
            compress_command: None,
            compress_interval_seconds: DAILY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub scheduler: SchedulerConfig,
    pub maintenance: MaintenanceConfig,
}

impl AppConfig {
    /// Load from the process environment (and `.env` if present)
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or_else(|| {
            AppError::InvalidInput("DATABASE_URL environment variable not found".to_string())
        })?;

        let scheduler = SchedulerConfig {
            tick_interval: seconds(&lookup, "SCHEDULER_TICK_SECONDS", DEFAULT_TICK_INTERVAL)?,
            lock_timeout: seconds(&lookup, "SCHEDULER_LOCK_TIMEOUT_SECONDS", DEFAULT_LOCK_TIMEOUT)?,
            stop_timeout: seconds(&lookup, "SCHEDULER_STOP_TIMEOUT_SECONDS", DEFAULT_STOP_TIMEOUT)?,
        };

        let similarity_command = match lookup("SIMILARITY_COMMAND") {
            Some(raw) => non_empty_command("SIMILARITY_COMMAND", &raw)?,
            None => split_command(DEFAULT_SIMILARITY_COMMAND),
        };
        let compress_command = lookup("COMPRESS_LOW_TRAFFIC_COMMAND")
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| non_empty_command("COMPRESS_LOW_TRAFFIC_COMMAND", &raw))
            .transpose()?;

        let maintenance = MaintenanceConfig {
            similarity_command,
            similarity_interval_seconds: interval(&lookup, "SIMILARITY_INTERVAL_SECONDS")?,
            compress_command,
            compress_interval_seconds: interval(&lookup, "COMPRESS_LOW_TRAFFIC_INTERVAL_SECONDS")?,
        };

        Ok(Self {
            database_url,
            scheduler,
            maintenance,
        })
    }
}

fn positive<F>(lookup: &F, key: &str) -> AppResult<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let value: u64 = raw
        .trim()
        .parse()
        .map_err(|e| AppError::InvalidInput(format!("{}={:?}: {}", key, raw, e)))?;
    if value == 0 {
        return Err(AppError::InvalidInput(format!(
            "{} must be greater than zero",
            key
        )));
    }
    Ok(Some(value))
}

fn seconds<F>(lookup: &F, key: &str, default: Duration) -> AppResult<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(positive(lookup, key)?.map_or(default, Duration::from_secs))
}

fn interval<F>(lookup: &F, key: &str) -> AppResult<u32>
where
    F: Fn(&str) -> Option<String>,
{
    match positive(lookup, key)? {
        Some(value) => u32::try_from(value)
            .map_err(|_| AppError::InvalidInput(format!("{} is too large", key))),
        None => Ok(DAILY),
    }
}

/// Whitespace-separated program and arguments
pub fn split_command(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

fn non_empty_command(key: &str, raw: &str) -> AppResult<Vec<String>> {
    let argv = split_command(raw);
    if argv.is_empty() {
        return Err(AppError::InvalidInput(format!("{} is empty", key)));
    }
    Ok(argv)
}
