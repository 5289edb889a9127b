/// Diesel models for scheduler_scheduled_task table
use crate::modules::scheduler::domain::entities::ScheduledTask;
use crate::modules::scheduler::domain::value_objects::TaskStatusDb;
use crate::schema::scheduler_scheduled_task;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Diesel model for inserting a task on first registration
#[derive(Insertable, Debug)]
#[diesel(table_name = scheduler_scheduled_task)]
pub struct NewScheduledTask {
    pub name: String,
    pub interval_seconds: i32,
    pub next_run_at: DateTime<Utc>,
    pub status: TaskStatusDb,
    pub error_message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewScheduledTask {
    pub fn pending(name: &str, interval_seconds: i32, now: DateTime<Utc>) -> Self {
        let template = ScheduledTask::new_pending(0, name, interval_seconds, now);
        Self {
            name: template.name,
            interval_seconds: template.interval_seconds,
            next_run_at: template.next_run_at,
            status: TaskStatusDb::Pending,
            error_message: template.error_message,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Diesel model for querying existing tasks
#[derive(Queryable, Selectable, QueryableByName, Debug, Clone)]
#[diesel(table_name = scheduler_scheduled_task)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ScheduledTaskModel {
    pub id: i64,
    pub name: String,
    pub interval_seconds: i32,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: DateTime<Utc>,
    pub status: TaskStatusDb,
    pub locked_until: Option<DateTime<Utc>>,
    pub worker_id: Option<String>,
    pub error_message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledTaskModel {
    /// Convert to domain ScheduledTask
    pub fn into_task(self) -> ScheduledTask {
        ScheduledTask {
            id: self.id,
            name: self.name,
            interval_seconds: self.interval_seconds,
            last_run_at: self.last_run_at,
            next_run_at: self.next_run_at,
            status: self.status.into(),
            locked_until: self.locked_until,
            worker_id: self.worker_id,
            error_message: self.error_message,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
