/// Domain entities for the scheduled task store
///
/// One `ScheduledTask` row exists per task name. The row carries the
/// scheduling state shared by every worker process: when the task is due,
/// who holds the lease, and how the last run ended.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Task status enum matching database type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// How a task run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    Failed(String),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded)
    }

    /// Status the row ends up in after release
    pub fn status(&self) -> TaskStatus {
        match self {
            TaskOutcome::Succeeded => TaskStatus::Completed,
            TaskOutcome::Failed(_) => TaskStatus::Failed,
        }
    }

    /// Value stored in `error_message` (cleared on success)
    pub fn error_message(&self) -> &str {
        match self {
            TaskOutcome::Succeeded => "",
            TaskOutcome::Failed(message) => message,
        }
    }
}

/// Scheduled task record from the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: i64,
    pub name: String,
    pub interval_seconds: i32,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: DateTime<Utc>,
    pub status: TaskStatus,
    pub locked_until: Option<DateTime<Utc>>,
    pub worker_id: Option<String>,
    pub error_message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledTask {
    /// Fresh record as written on first registration
    pub fn new_pending(id: i64, name: &str, interval_seconds: i32, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.to_string(),
            interval_seconds,
            last_run_at: None,
            next_run_at: now + Duration::seconds(i64::from(interval_seconds)),
            status: TaskStatus::Pending,
            locked_until: None,
            worker_id: None,
            error_message: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::seconds(i64::from(self.interval_seconds))
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_run_at
    }

    /// A lease is present, expired or not
    pub fn is_claimed(&self) -> bool {
        self.locked_until.is_some()
    }

    /// Held by a worker whose lease has not expired yet
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    /// Still marked running although the lease ran out: the holder is
    /// presumed dead and the row must be reaped.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Running && self.locked_until.is_some_and(|until| until < now)
    }

    /// The row can be acquired right now
    pub fn is_acquirable(&self, now: DateTime<Utc>) -> bool {
        self.is_due(now) && !self.is_claimed()
    }

    /// Lease identity used to guard release
    pub fn lease(&self) -> Option<(&str, DateTime<Utc>)> {
        match (&self.worker_id, self.locked_until) {
            (Some(worker_id), Some(locked_until)) => Some((worker_id.as_str(), locked_until)),
            _ => None,
        }
    }

    pub fn apply_acquire(&mut self, worker_id: &str, locked_until: DateTime<Utc>, now: DateTime<Utc>) {
        self.status = TaskStatus::Running;
        self.locked_until = Some(locked_until);
        self.worker_id = Some(worker_id.to_string());
        self.updated_at = now;
    }

    /// Clears the lease and reschedules one interval after `now`,
    /// whatever the outcome.
    pub fn apply_release(&mut self, outcome: &TaskOutcome, now: DateTime<Utc>) {
        self.status = outcome.status();
        if outcome.is_success() {
            self.last_run_at = Some(now);
        }
        self.error_message = outcome.error_message().to_string();
        self.next_run_at = now + self.interval();
        self.locked_until = None;
        self.worker_id = None;
        self.updated_at = now;
    }

    /// Operator override: back to pending without touching the schedule
    pub fn apply_reset(&mut self, error_message: &str, now: DateTime<Utc>) {
        self.status = TaskStatus::Pending;
        self.locked_until = None;
        self.worker_id = None;
        self.error_message = error_message.to_string();
        self.updated_at = now;
    }
}

impl std::fmt::Display for ScheduledTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (next: {}, status: {})",
            self.name, self.next_run_at, self.status
        )
    }
}
