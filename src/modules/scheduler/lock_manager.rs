/// Cross-process mutual exclusion over the scheduled task store
///
/// A lock is the `locked_until` + `worker_id` pair on a task row. It is
/// taken only by `acquire` and cleared only by `release` (or by the stale
/// lock reaper once it has expired).
use crate::modules::scheduler::domain::entities::{ScheduledTask, TaskOutcome};
use crate::modules::scheduler::domain::repository::ScheduledTaskRepository;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::clock::Clock;
use crate::shared::utils::validation::Validator;
use crate::{log_debug, log_error, log_info, log_warn};
use std::sync::Arc;
use std::time::Duration;

/// Default lease length; must exceed the longest expected task run
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30 * 60);

pub struct LockManager {
    repository: Arc<dyn ScheduledTaskRepository>,
    clock: Arc<dyn Clock>,
}

impl LockManager {
    pub fn new(repository: Arc<dyn ScheduledTaskRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Try to take the lock on a due, unclaimed task.
    ///
    /// Ok(None) covers a missing task, a task that is not due yet and a task
    /// someone else holds; callers just move on.
    pub async fn acquire(
        &self,
        task_name: &str,
        worker_id: &str,
        lock_timeout: Duration,
    ) -> AppResult<Option<ScheduledTask>> {
        Validator::validate_worker_id(worker_id)?;
        if lock_timeout.is_zero() {
            return Err(AppError::InvalidInput(
                "Lock timeout must be greater than zero".to_string(),
            ));
        }

        let now = self.clock.now();
        let locked_until = now + chrono::Duration::from_std(lock_timeout)?;

        let locked = self
            .repository
            .try_acquire(task_name, worker_id, locked_until, now)
            .await?;

        match &locked {
            Some(_) => log_info!(
                "Task '{}' locked by worker '{}' until {}",
                task_name,
                worker_id,
                locked_until
            ),
            None => log_debug!("Task '{}' not acquired by '{}'", task_name, worker_id),
        }

        Ok(locked)
    }

    /// End a lease obtained from `acquire` and schedule the next run.
    ///
    /// Returns None if the lease was already gone (reaped, possibly
    /// re-acquired elsewhere); the row is left alone in that case.
    pub async fn release(
        &self,
        task: &ScheduledTask,
        outcome: TaskOutcome,
    ) -> AppResult<Option<ScheduledTask>> {
        if task.lease().is_none() {
            return Err(AppError::InvalidInput(format!(
                "Task '{}' is not locked; nothing to release",
                task.name
            )));
        }

        let now = self.clock.now();
        let released = self.repository.release(task, &outcome, now).await?;

        match (&released, &outcome) {
            (Some(record), TaskOutcome::Succeeded) => log_info!(
                "Task '{}' completed successfully. Next run: {}",
                record.name,
                record.next_run_at
            ),
            (Some(record), TaskOutcome::Failed(message)) => log_error!(
                "Task '{}' failed: {}. Next run: {}",
                record.name,
                message,
                record.next_run_at
            ),
            (None, _) => log_warn!(
                "Lease on task '{}' held by '{}' was lost before release",
                task.name,
                task.worker_id.as_deref().unwrap_or("-")
            ),
        }

        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::scheduler::domain::entities::TaskStatus;
    use crate::modules::scheduler::infrastructure::memory::InMemoryTaskRepository;
    use crate::shared::utils::clock::ManualClock;

    async fn setup() -> (LockManager, Arc<ManualClock>, Arc<InMemoryTaskRepository>) {
        let repo = Arc::new(InMemoryTaskRepository::new());
        let clock = Arc::new(ManualClock::at_epoch());
        repo.get_or_create("sync", 60, clock.now()).await.unwrap();
        let manager = LockManager::new(repo.clone(), clock.clone());
        (manager, clock, repo)
    }

    #[tokio::test]
    async fn test_acquire_sets_lease_from_timeout() {
        let (manager, clock, _) = setup().await;
        clock.advance_secs(61);

        let lease = manager
            .acquire("sync", "worker-a", DEFAULT_LOCK_TIMEOUT)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(lease.status, TaskStatus::Running);
        assert_eq!(lease.locked_until.unwrap().timestamp(), 61 + 1800);
    }

    #[tokio::test]
    async fn test_acquire_rejects_bad_arguments() {
        let (manager, clock, _) = setup().await;
        clock.advance_secs(61);

        assert!(manager.acquire("sync", "", DEFAULT_LOCK_TIMEOUT).await.is_err());
        assert!(manager.acquire("sync", "a", Duration::ZERO).await.is_err());
    }

    #[tokio::test]
    async fn test_release_requires_a_lease() {
        let (manager, _, repo) = setup().await;
        let unlocked = repo.find_by_name("sync").await.unwrap().unwrap();

        let err = manager.release(&unlocked, TaskOutcome::Succeeded).await;
        assert!(matches!(err, Err(AppError::InvalidInput(_))));
    }
}
