/// Diesel-based implementation of ScheduledTaskRepository
///
/// Acquisition is one UPDATE over a `FOR UPDATE SKIP LOCKED` subselect, so
/// two workers racing for the same row never both see it as free and
/// neither waits on the other. Releases are conditional updates keyed on the
/// lease they end.
use crate::modules::scheduler::domain::entities::{ScheduledTask, TaskOutcome};
use crate::modules::scheduler::domain::repository::ScheduledTaskRepository;
use crate::modules::scheduler::domain::value_objects::TaskStatusDb;
use crate::modules::scheduler::infrastructure::models::{NewScheduledTask, ScheduledTaskModel};
use crate::schema::{scheduler_scheduled_task, sql_types::ScheduledTaskStatus};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::infrastructure::database::Database;
use crate::shared::utils::logger::TimedOperation;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{Bool, Text, Timestamptz};
use std::sync::Arc;
use tokio::task;

const RETURNING_COLUMNS: &str = "RETURNING id, name, interval_seconds, last_run_at, next_run_at, \
     status, locked_until, worker_id, error_message, created_at, updated_at";

// $1 = worker_id, $2 = locked_until, $3 = now, $4 = name
const ACQUIRE_SQL: &str = r#"
    UPDATE scheduler_scheduled_task
    SET status = 'running',
        locked_until = $2,
        worker_id = $1,
        updated_at = $3
    WHERE id = (
        SELECT id
        FROM scheduler_scheduled_task
        WHERE name = $4
          AND next_run_at <= $3
          AND locked_until IS NULL
        FOR UPDATE SKIP LOCKED
    )
      AND locked_until IS NULL
"#;

// $1 = status, $2 = success, $3 = now, $4 = error_message
// next_run_at uses the row's current interval, which may have been changed
// by a registration while the task was running.
const RELEASE_SET: &str = r#"
    UPDATE scheduler_scheduled_task
    SET status = $1,
        last_run_at = CASE WHEN $2 THEN $3 ELSE last_run_at END,
        next_run_at = $3 + interval_seconds * INTERVAL '1 second',
        error_message = $4,
        locked_until = NULL,
        worker_id = NULL,
        updated_at = $3
"#;

// $5 = name, $6 = worker_id, $7 = locked_until
const RELEASE_LEASE_WHERE: &str = "WHERE name = $5 AND worker_id = $6 AND locked_until = $7";

// $5 = name
const RELEASE_STALE_WHERE: &str =
    "WHERE name = $5 AND status = 'running' AND locked_until IS NOT NULL AND locked_until < $3";

pub struct ScheduledTaskRepositoryImpl {
    db: Arc<Database>,
}

impl ScheduledTaskRepositoryImpl {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Run a blocking diesel closure on the blocking pool
    async fn with_conn<T, F>(&self, operation: &'static str, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> AppResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> AppResult<T> {
            let timer = TimedOperation::new(operation);
            let mut conn = db.get_connection()?;
            let result = f(&mut conn);
            timer.finish();
            result
        })
        .await?
    }
}

fn db_error(context: &str) -> impl Fn(diesel::result::Error) -> AppError + '_ {
    move |e| AppError::DatabaseError(format!("{}: {}", context, e))
}

#[async_trait]
impl ScheduledTaskRepository for ScheduledTaskRepositoryImpl {
    async fn get_or_create(
        &self,
        name: &str,
        interval_seconds: i32,
        now: DateTime<Utc>,
    ) -> AppResult<(ScheduledTask, bool)> {
        let new_task = NewScheduledTask::pending(name, interval_seconds, now);
        let name = name.to_string();

        self.with_conn("get_or_create", move |conn| {
            let inserted: Option<ScheduledTaskModel> =
                diesel::insert_into(scheduler_scheduled_task::table)
                    .values(&new_task)
                    .on_conflict(scheduler_scheduled_task::name)
                    .do_nothing()
                    .returning(ScheduledTaskModel::as_returning())
                    .get_result(conn)
                    .optional()
                    .map_err(db_error("Failed to create scheduled task"))?;

            if let Some(model) = inserted {
                return Ok((model.into_task(), true));
            }

            let existing: ScheduledTaskModel = scheduler_scheduled_task::table
                .filter(scheduler_scheduled_task::name.eq(&name))
                .select(ScheduledTaskModel::as_select())
                .first(conn)
                .map_err(db_error("Failed to load scheduled task"))?;

            Ok((existing.into_task(), false))
        })
        .await
    }

    async fn update_interval(
        &self,
        name: &str,
        interval_seconds: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ScheduledTask>> {
        let name = name.to_string();

        self.with_conn("update_interval", move |conn| {
            let updated: Option<ScheduledTaskModel> = diesel::update(
                scheduler_scheduled_task::table
                    .filter(scheduler_scheduled_task::name.eq(&name))
                    .filter(scheduler_scheduled_task::interval_seconds.ne(interval_seconds)),
            )
            .set((
                scheduler_scheduled_task::interval_seconds.eq(interval_seconds),
                scheduler_scheduled_task::updated_at.eq(now),
            ))
            .returning(ScheduledTaskModel::as_returning())
            .get_result(conn)
            .optional()
            .map_err(db_error("Failed to update task interval"))?;

            Ok(updated.map(ScheduledTaskModel::into_task))
        })
        .await
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<ScheduledTask>> {
        let name = name.to_string();

        self.with_conn("find_by_name", move |conn| {
            let task: Option<ScheduledTaskModel> = scheduler_scheduled_task::table
                .filter(scheduler_scheduled_task::name.eq(&name))
                .select(ScheduledTaskModel::as_select())
                .first(conn)
                .optional()
                .map_err(db_error("Failed to get task by name"))?;

            Ok(task.map(ScheduledTaskModel::into_task))
        })
        .await
    }

    async fn list_all(&self) -> AppResult<Vec<ScheduledTask>> {
        self.with_conn("list_all", |conn| {
            let tasks: Vec<ScheduledTaskModel> = scheduler_scheduled_task::table
                .order((
                    scheduler_scheduled_task::next_run_at.asc(),
                    scheduler_scheduled_task::name.asc(),
                ))
                .select(ScheduledTaskModel::as_select())
                .load(conn)
                .map_err(db_error("Failed to list scheduled tasks"))?;

            Ok(tasks.into_iter().map(ScheduledTaskModel::into_task).collect())
        })
        .await
    }

    async fn try_acquire(
        &self,
        name: &str,
        worker_id: &str,
        locked_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ScheduledTask>> {
        let name = name.to_string();
        let worker_id = worker_id.to_string();

        self.with_conn("try_acquire", move |conn| {
            let locked: Option<ScheduledTaskModel> =
                diesel::sql_query(format!("{} {}", ACQUIRE_SQL, RETURNING_COLUMNS))
                    .bind::<Text, _>(worker_id)
                    .bind::<Timestamptz, _>(locked_until)
                    .bind::<Timestamptz, _>(now)
                    .bind::<Text, _>(name)
                    .get_result(conn)
                    .optional()
                    .map_err(db_error("Failed to acquire task lock"))?;

            Ok(locked.map(ScheduledTaskModel::into_task))
        })
        .await
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
        let worker_id = worker_id.to_string();
        let name = lease.name.clone();
        let status = TaskStatusDb::from(outcome.status());
        let success = outcome.is_success();
        let error_message = outcome.error_message().to_string();

        self.with_conn("release", move |conn| {
            let released: Option<ScheduledTaskModel> = diesel::sql_query(format!(
                "{} {} {}",
                RELEASE_SET, RELEASE_LEASE_WHERE, RETURNING_COLUMNS
            ))
            .bind::<ScheduledTaskStatus, _>(status)
            .bind::<Bool, _>(success)
            .bind::<Timestamptz, _>(now)
            .bind::<Text, _>(error_message)
            .bind::<Text, _>(name)
            .bind::<Text, _>(worker_id)
            .bind::<Timestamptz, _>(locked_until)
            .get_result(conn)
            .optional()
            .map_err(db_error("Failed to release task lock"))?;

            Ok(released.map(ScheduledTaskModel::into_task))
        })
        .await
    }

    async fn find_stale(&self, now: DateTime<Utc>) -> AppResult<Vec<ScheduledTask>> {
        self.with_conn("find_stale", move |conn| {
            let tasks: Vec<ScheduledTaskModel> = scheduler_scheduled_task::table
                .filter(scheduler_scheduled_task::status.eq(TaskStatusDb::Running))
                .filter(scheduler_scheduled_task::locked_until.lt(now))
                .order(scheduler_scheduled_task::locked_until.asc())
                .select(ScheduledTaskModel::as_select())
                .load(conn)
                .map_err(db_error("Failed to find stale tasks"))?;

            Ok(tasks.into_iter().map(ScheduledTaskModel::into_task).collect())
        })
        .await
    }

    async fn release_stale(
        &self,
        name: &str,
        error_message: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ScheduledTask>> {
        let name = name.to_string();
        let error_message = error_message.to_string();

        self.with_conn("release_stale", move |conn| {
            let released: Option<ScheduledTaskModel> = diesel::sql_query(format!(
                "{} {} {}",
                RELEASE_SET, RELEASE_STALE_WHERE, RETURNING_COLUMNS
            ))
            .bind::<ScheduledTaskStatus, _>(TaskStatusDb::Failed)
            .bind::<Bool, _>(false)
            .bind::<Timestamptz, _>(now)
            .bind::<Text, _>(error_message)
            .bind::<Text, _>(name)
            .get_result(conn)
            .optional()
            .map_err(db_error("Failed to release stale lock"))?;

            Ok(released.map(ScheduledTaskModel::into_task))
        })
        .await
    }

    async fn reset_to_pending(
        &self,
        name: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ScheduledTask>> {
        let name = name.to_string();

        self.with_conn("reset_to_pending", move |conn| {
            let reset: Option<ScheduledTaskModel> = diesel::update(
                scheduler_scheduled_task::table.filter(scheduler_scheduled_task::name.eq(&name)),
            )
            .set((
                scheduler_scheduled_task::status.eq(TaskStatusDb::Pending),
                scheduler_scheduled_task::locked_until.eq(None::<DateTime<Utc>>),
                scheduler_scheduled_task::worker_id.eq(None::<String>),
                scheduler_scheduled_task::error_message.eq(""),
                scheduler_scheduled_task::updated_at.eq(now),
            ))
            .returning(ScheduledTaskModel::as_returning())
            .get_result(conn)
            .optional()
            .map_err(db_error("Failed to reset task"))?;

            Ok(reset.map(ScheduledTaskModel::into_task))
        })
        .await
    }

    async fn clear_expired_locks(
        &self,
        error_message: &str,
        now: DateTime<Utc>,
    ) -> AppResult<usize> {
        let error_message = error_message.to_string();

        self.with_conn("clear_expired_locks", move |conn| {
            diesel::update(
                scheduler_scheduled_task::table
                    .filter(scheduler_scheduled_task::status.eq(TaskStatusDb::Running))
                    .filter(scheduler_scheduled_task::locked_until.lt(now)),
            )
            .set((
                scheduler_scheduled_task::status.eq(TaskStatusDb::Pending),
                scheduler_scheduled_task::locked_until.eq(None::<DateTime<Utc>>),
                scheduler_scheduled_task::worker_id.eq(None::<String>),
                scheduler_scheduled_task::error_message.eq(error_message),
                scheduler_scheduled_task::updated_at.eq(now),
            ))
            .execute(conn)
            .map_err(db_error("Failed to clear expired locks"))
        })
        .await
    }
}
