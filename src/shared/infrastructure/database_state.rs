use super::database::Database;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Upper bound for the reconnect backoff
const MAX_BACKOFF_SECS: u64 = 300;

/// Represents the state of the database connection
///
/// Lets the daemon come up before Postgres does and keep retrying instead
/// of exiting on the first failed connect.
#[derive(Debug, Clone)]
pub enum DatabaseState {
    /// Database is available and ready for use
    Available(Arc<Database>),
    /// Database is unavailable with the reason for failure
    Unavailable {
        reason: String,
        last_attempt: Instant,
        retry_count: u32,
    },
    /// Database is being initialized or reconnected
    Initializing,
}

impl DatabaseState {
    /// Create a new database state by attempting to connect once
    pub fn initialize(database_url: &str) -> Self {
        match Database::connect(database_url) {
            Ok(db) => {
                log::info!("Database initialized successfully");
                DatabaseState::Available(Arc::new(db))
            }
            Err(e) => {
                log::error!("Database initialization failed: {}", e);
                DatabaseState::Unavailable {
                    reason: e.to_string(),
                    last_attempt: Instant::now(),
                    retry_count: 0,
                }
            }
        }
    }

    /// Exponential backoff: 2^retry_count seconds, capped at 5 minutes
    pub fn backoff_duration(retry_count: u32) -> Duration {
        let secs = 2_u64
            .checked_pow(retry_count)
            .map_or(MAX_BACKOFF_SECS, |s| s.min(MAX_BACKOFF_SECS));
        Duration::from_secs(secs)
    }

    /// Time left before the next reconnect attempt is allowed
    pub fn time_until_retry(&self) -> Duration {
        match self {
            DatabaseState::Unavailable {
                last_attempt,
                retry_count,
                ..
            } => Self::backoff_duration(*retry_count).saturating_sub(last_attempt.elapsed()),
            _ => Duration::ZERO,
        }
    }

    /// Attempt to reconnect if the database is currently unavailable
    ///
    /// Returns true once the database is available.
    pub fn attempt_reconnect(&mut self, database_url: &str) -> bool {
        match self {
            DatabaseState::Unavailable {
                last_attempt,
                retry_count,
                ..
            } => {
                let current_retry_count = *retry_count;
                if last_attempt.elapsed() < Self::backoff_duration(current_retry_count) {
                    return false; // Too soon to retry
                }

                *self = DatabaseState::Initializing;

                match Database::connect(database_url) {
                    Ok(db) => {
                        log::info!(
                            "Database reconnection successful after {} attempts",
                            current_retry_count + 1
                        );
                        *self = DatabaseState::Available(Arc::new(db));
                        true
                    }
                    Err(e) => {
                        log::warn!(
                            "Database reconnection attempt {} failed: {}",
                            current_retry_count + 1,
                            e
                        );
                        *self = DatabaseState::Unavailable {
                            reason: e.to_string(),
                            last_attempt: Instant::now(),
                            retry_count: current_retry_count + 1,
                        };
                        false
                    }
                }
            }
            DatabaseState::Available(_) => true,
            DatabaseState::Initializing => false,
        }
    }

    /// Keep reconnecting until the database answers
    pub async fn connect_with_retry(database_url: &str) -> Arc<Database> {
        let mut state = Self::initialize(database_url);
        loop {
            if let DatabaseState::Available(db) = &state {
                return Arc::clone(db);
            }
            let wait = state.time_until_retry();
            log::warn!("{}; retrying in {:?}", state.status_message(), wait);
            tokio::time::sleep(wait).await;
            state.attempt_reconnect(database_url);
        }
    }

    /// Get a user-friendly status message for the database state
    pub fn status_message(&self) -> String {
        match self {
            DatabaseState::Available(_) => "Database connected".to_string(),
            DatabaseState::Unavailable {
                reason,
                retry_count,
                ..
            } => {
                format!("Database unavailable (attempt {}): {}", retry_count, reason)
            }
            DatabaseState::Initializing => "Database connecting...".to_string(),
        }
    }
}
