/// Repository trait for the scheduled task store
///
/// This is the only shared mutable state between worker processes. Every
/// mutation is a single conditional update; callers never read a row and
/// write it back.
///
/// All operations take `now` from the caller's clock.
use crate::modules::scheduler::domain::entities::{ScheduledTask, TaskOutcome};
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait ScheduledTaskRepository: Send + Sync {
    /// Insert a pending row for `name` if none exists.
    /// Returns the stored row and whether it was created by this call.
    async fn get_or_create(
        &self,
        name: &str,
        interval_seconds: i32,
        now: DateTime<Utc>,
    ) -> AppResult<(ScheduledTask, bool)>;

    /// Change the stored interval without touching `next_run_at`.
    /// Returns None when the task is missing or already has this interval.
    async fn update_interval(
        &self,
        name: &str,
        interval_seconds: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ScheduledTask>>;

    async fn find_by_name(&self, name: &str) -> AppResult<Option<ScheduledTask>>;

    /// All rows ordered by `next_run_at`
    async fn list_all(&self) -> AppResult<Vec<ScheduledTask>>;

    /// Claim the row if it is due and unclaimed (`locked_until IS NULL`).
    ///
    /// Never waits on a row another transaction is modifying; contention,
    /// a missing row and a not-yet-due row all yield None.
    async fn try_acquire(
        &self,
        name: &str,
        worker_id: &str,
        locked_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ScheduledTask>>;

    /// Release a lease held by `lease.worker_id` until `lease.locked_until`.
    /// Returns None when the row no longer carries that lease.
    async fn release(
        &self,
        lease: &ScheduledTask,
        outcome: &TaskOutcome,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ScheduledTask>>;

    /// Rows with `status = running` and `locked_until < now`
    async fn find_stale(&self, now: DateTime<Utc>) -> AppResult<Vec<ScheduledTask>>;

    /// Fail and reschedule a stale row. Returns None if another worker got
    /// there first or the row is no longer stale.
    async fn release_stale(
        &self,
        name: &str,
        error_message: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ScheduledTask>>;

    /// Force a task back to pending, clearing lease and error
    async fn reset_to_pending(
        &self,
        name: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ScheduledTask>>;

    /// Move every stale row to pending with the given message, keeping
    /// `next_run_at`. Returns the number of rows changed.
    async fn clear_expired_locks(
        &self,
        error_message: &str,
        now: DateTime<Utc>,
    ) -> AppResult<usize>;
}
