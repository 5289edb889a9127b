use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lncrawler_scheduler::modules::scheduler::{ScheduledTask, ScheduledTaskRepository, TaskOutcome};
use lncrawler_scheduler::shared::errors::AppResult;
use mockall::mock;

mock! {
    pub Store {}

    #[async_trait]
    impl ScheduledTaskRepository for Store {
        async fn get_or_create(&self, name: &str, interval_seconds: i32, now: DateTime<Utc>) -> AppResult<(ScheduledTask, bool)>;
        async fn update_interval(&self, name: &str, interval_seconds: i32, now: DateTime<Utc>) -> AppResult<Option<ScheduledTask>>;
        async fn find_by_name(&self, name: &str) -> AppResult<Option<ScheduledTask>>;
        async fn list_all(&self) -> AppResult<Vec<ScheduledTask>>;
        async fn try_acquire(&self, name: &str, worker_id: &str, locked_until: DateTime<Utc>, now: DateTime<Utc>) -> AppResult<Option<ScheduledTask>>;
        async fn release(&self, lease: &ScheduledTask, outcome: &TaskOutcome, now: DateTime<Utc>) -> AppResult<Option<ScheduledTask>>;
        async fn find_stale(&self, now: DateTime<Utc>) -> AppResult<Vec<ScheduledTask>>;
        async fn release_stale(&self, name: &str, error_message: &str, now: DateTime<Utc>) -> AppResult<Option<ScheduledTask>>;
        async fn reset_to_pending(&self, name: &str, now: DateTime<Utc>) -> AppResult<Option<ScheduledTask>>;
        async fn clear_expired_locks(&self, error_message: &str, now: DateTime<Utc>) -> AppResult<usize>;
    }
}
