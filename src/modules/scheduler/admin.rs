/// Operator conveniences over the scheduled task store
///
/// Listing with lock diagnostics, forcing a task back to pending and
/// clearing expired locks by hand. These bypass the scheduler loop but
/// still go through the store's conditional updates.
use crate::modules::scheduler::domain::entities::{ScheduledTask, TaskStatus};
use crate::modules::scheduler::domain::repository::ScheduledTaskRepository;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::clock::Clock;
use crate::log_info;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

pub const ADMIN_CLEANUP_MESSAGE: &str = "Lock expired - cleaned up by admin";

/// One row of the task listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskOverview {
    pub name: String,
    /// e.g. `PENDING`, `RUNNING (LOCKED)`, `RUNNING (STALE LOCK)`
    pub status: String,
    /// e.g. `1h 0m`, `5m 30s`, `45s`
    pub interval: String,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: DateTime<Utc>,
    /// Lock holder; suffixed with `(expired)` once the lease ran out
    pub worker: Option<String>,
    pub error_message: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskStatistics {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub stale: usize,
    pub total: usize,
}

pub struct SchedulerAdmin {
    repository: Arc<dyn ScheduledTaskRepository>,
    clock: Arc<dyn Clock>,
}

impl SchedulerAdmin {
    pub fn new(repository: Arc<dyn ScheduledTaskRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    pub async fn list_tasks(&self) -> AppResult<Vec<TaskOverview>> {
        let now = self.clock.now();
        let tasks = self.repository.list_all().await?;
        Ok(tasks.iter().map(|task| overview(task, now)).collect())
    }

    /// Back to pending with lock and error cleared; the schedule is kept
    pub async fn reset_task(&self, name: &str) -> AppResult<ScheduledTask> {
        let task = self
            .repository
            .reset_to_pending(name, self.clock.now())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Scheduled task '{}'", name)))?;

        log_info!("Reset task '{}' to pending state", name);
        Ok(task)
    }

    pub async fn cleanup_stale_locks(&self) -> AppResult<usize> {
        let count = self
            .repository
            .clear_expired_locks(ADMIN_CLEANUP_MESSAGE, self.clock.now())
            .await?;

        log_info!("Cleaned up {} stale locks.", count);
        Ok(count)
    }

    pub async fn statistics(&self) -> AppResult<TaskStatistics> {
        let now = self.clock.now();
        let tasks = self.repository.list_all().await?;

        let mut stats = TaskStatistics {
            total: tasks.len(),
            ..TaskStatistics::default()
        };
        for task in &tasks {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Running => stats.running += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
            }
            if task.is_stale(now) {
                stats.stale += 1;
            }
        }
        Ok(stats)
    }
}

fn overview(task: &ScheduledTask, now: DateTime<Utc>) -> TaskOverview {
    TaskOverview {
        name: task.name.clone(),
        status: status_label(task, now),
        interval: format_interval(task.interval_seconds),
        last_run_at: task.last_run_at,
        next_run_at: task.next_run_at,
        worker: worker_label(task, now),
        error_message: task.error_message.clone(),
        updated_at: task.updated_at,
    }
}

pub fn status_label(task: &ScheduledTask, now: DateTime<Utc>) -> String {
    let status = task.status.to_string().to_uppercase();
    if task.is_locked(now) {
        format!("{} (LOCKED)", status)
    } else if task.is_claimed() {
        format!("{} (STALE LOCK)", status)
    } else {
        status
    }
}

fn worker_label(task: &ScheduledTask, now: DateTime<Utc>) -> Option<String> {
    match &task.worker_id {
        Some(worker) if task.is_locked(now) => Some(worker.clone()),
        Some(worker) if task.is_claimed() => Some(format!("{} (expired)", worker)),
        _ => None,
    }
}

/// Hours and minutes above an hour, minutes and seconds above a minute
pub fn format_interval(interval_seconds: i32) -> String {
    let hours = interval_seconds / 3600;
    let minutes = (interval_seconds % 3600) / 60;
    let seconds = interval_seconds % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
