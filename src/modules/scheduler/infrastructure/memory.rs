/// In-process implementation of ScheduledTaskRepository
///
/// Same contract as the Postgres store, for single-process deployments and
/// tests. The mutex plays the role of the row lock: acquisition only
/// `try_lock`s, so a contended store answers "no lock" instead of waiting.
use crate::log_debug;
use crate::modules::scheduler::domain::entities::{ScheduledTask, TaskOutcome};
use crate::modules::scheduler::domain::repository::ScheduledTaskRepository;
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct StoreState {
    tasks: BTreeMap<String, ScheduledTask>,
    next_id: i64,
}

#[derive(Debug, Default)]
pub struct InMemoryTaskRepository {
    state: Mutex<StoreState>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a row as-is (test fixtures, imports)
    pub async fn upsert(&self, task: ScheduledTask) {
        let mut state = self.state.lock().await;
        state.next_id = state.next_id.max(task.id);
        state.tasks.insert(task.name.clone(), task);
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.tasks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.tasks.is_empty()
    }
}

#[async_trait]
impl ScheduledTaskRepository for InMemoryTaskRepository {
    async fn get_or_create(
        &self,
        name: &str,
        interval_seconds: i32,
        now: DateTime<Utc>,
    ) -> AppResult<(ScheduledTask, bool)> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.tasks.get(name) {
            return Ok((existing.clone(), false));
        }

        state.next_id += 1;
        let task = ScheduledTask::new_pending(state.next_id, name, interval_seconds, now);
        state.tasks.insert(name.to_string(), task.clone());
        Ok((task, true))
    }

    async fn update_interval(
        &self,
        name: &str,
        interval_seconds: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ScheduledTask>> {
        let mut state = self.state.lock().await;
        match state.tasks.get_mut(name) {
            Some(task) if task.interval_seconds != interval_seconds => {
                task.interval_seconds = interval_seconds;
                task.updated_at = now;
                Ok(Some(task.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<ScheduledTask>> {
        Ok(self.state.lock().await.tasks.get(name).cloned())
    }

    async fn list_all(&self) -> AppResult<Vec<ScheduledTask>> {
        let state = self.state.lock().await;
        let mut tasks: Vec<ScheduledTask> = state.tasks.values().cloned().collect();
        tasks.sort_by(|a, b| {
            a.next_run_at
                .cmp(&b.next_run_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(tasks)
    }

    async fn try_acquire(
        &self,
        name: &str,
        worker_id: &str,
        locked_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ScheduledTask>> {
        let Ok(mut state) = self.state.try_lock() else {
            log_debug!("Store busy, skipping acquire of task '{}'", name);
            return Ok(None);
        };

        match state.tasks.get_mut(name) {
            Some(task) if task.is_acquirable(now) => {
                task.apply_acquire(worker_id, locked_until, now);
                Ok(Some(task.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn release(
        &self,
        lease: &ScheduledTask,
        outcome: &TaskOutcome,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ScheduledTask>> {
        let (worker_id, locked_until) = lease.lease().ok_or_else(|| {
            AppError::InvalidInput(format!("Task '{}' does not carry a lease", lease.name))
        })?;

        let mut state = self.state.lock().await;
        match state.tasks.get_mut(&lease.name) {
            Some(task) if task.lease() == Some((worker_id, locked_until)) => {
                task.apply_release(outcome, now);
                Ok(Some(task.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn find_stale(&self, now: DateTime<Utc>) -> AppResult<Vec<ScheduledTask>> {
        let state = self.state.lock().await;
        let mut stale: Vec<ScheduledTask> = state
            .tasks
            .values()
            .filter(|task| task.is_stale(now))
            .cloned()
            .collect();
        stale.sort_by_key(|task| task.locked_until);
        Ok(stale)
    }

    async fn release_stale(
        &self,
        name: &str,
        error_message: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ScheduledTask>> {
        let mut state = self.state.lock().await;
        match state.tasks.get_mut(name) {
            Some(task) if task.is_stale(now) => {
                task.apply_release(&TaskOutcome::Failed(error_message.to_string()), now);
                Ok(Some(task.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn reset_to_pending(
        &self,
        name: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ScheduledTask>> {
        let mut state = self.state.lock().await;
        Ok(state.tasks.get_mut(name).map(|task| {
            task.apply_reset("", now);
            task.clone()
        }))
    }

    async fn clear_expired_locks(
        &self,
        error_message: &str,
        now: DateTime<Utc>,
    ) -> AppResult<usize> {
        let mut state = self.state.lock().await;
        let mut cleared = 0;
        for task in state.tasks.values_mut().filter(|task| task.is_stale(now)) {
            task.apply_reset(error_message, now);
            cleared += 1;
        }
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::scheduler::domain::entities::TaskStatus;
    use chrono::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::default() + Duration::seconds(secs)
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let repo = InMemoryTaskRepository::new();

        let (first, created) = repo.get_or_create("sync", 60, at(0)).await.unwrap();
        assert!(created);
        let (second, created_again) = repo.get_or_create("sync", 60, at(30)).await.unwrap();
        assert!(!created_again);

        assert_eq!(first.id, second.id);
        assert_eq!(second.next_run_at, at(60));
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_acquire_requires_due_and_unclaimed() {
        let repo = InMemoryTaskRepository::new();
        repo.get_or_create("sync", 60, at(0)).await.unwrap();

        assert!(repo.try_acquire("sync", "a", at(1800), at(59)).await.unwrap().is_none());
        assert!(repo.try_acquire("missing", "a", at(1800), at(61)).await.unwrap().is_none());

        let lease = repo.try_acquire("sync", "a", at(1861), at(61)).await.unwrap().unwrap();
        assert_eq!(lease.status, TaskStatus::Running);
        assert_eq!(lease.worker_id.as_deref(), Some("a"));

        assert!(repo.try_acquire("sync", "b", at(1861), at(61)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_acquire_under_contention_returns_no_lock() {
        let repo = InMemoryTaskRepository::new();
        repo.get_or_create("sync", 60, at(0)).await.unwrap();

        let _held = repo.state.lock().await;
        assert!(repo.try_acquire("sync", "a", at(1861), at(61)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_release_with_foreign_lease_is_noop() {
        let repo = InMemoryTaskRepository::new();
        repo.get_or_create("sync", 60, at(0)).await.unwrap();
        let lease = repo.try_acquire("sync", "a", at(1861), at(61)).await.unwrap().unwrap();

        let mut forged = lease.clone();
        forged.worker_id = Some("b".to_string());
        assert!(repo
            .release(&forged, &TaskOutcome::Succeeded, at(70))
            .await
            .unwrap()
            .is_none());

        let released = repo.release(&lease, &TaskOutcome::Succeeded, at(70)).await.unwrap();
        assert_eq!(released.unwrap().next_run_at, at(130));
    }

    #[tokio::test]
    async fn test_clear_expired_locks_only_touches_stale_rows() {
        let repo = InMemoryTaskRepository::new();
        repo.get_or_create("stale", 60, at(0)).await.unwrap();
        repo.get_or_create("live", 60, at(0)).await.unwrap();
        repo.try_acquire("stale", "a", at(100), at(60)).await.unwrap().unwrap();
        repo.try_acquire("live", "b", at(5000), at(60)).await.unwrap().unwrap();

        let cleared = repo.clear_expired_locks("cleaned", at(200)).await.unwrap();
        assert_eq!(cleared, 1);

        let stale = repo.find_by_name("stale").await.unwrap().unwrap();
        assert_eq!(stale.status, TaskStatus::Pending);
        assert_eq!(stale.error_message, "cleaned");
        let live = repo.find_by_name("live").await.unwrap().unwrap();
        assert_eq!(live.status, TaskStatus::Running);
    }
}
