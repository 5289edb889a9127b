/// Value objects for the scheduler domain
use super::entities::TaskStatus;
use serde::{Deserialize, Serialize};

/// Task status enum matching database type
#[derive(
    diesel_derive_enum::DbEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[ExistingTypePath = "crate::schema::sql_types::ScheduledTaskStatus"]
#[serde(rename_all = "lowercase")]
pub enum TaskStatusDb {
    Pending,
    Running,
    Completed,
    Failed,
}

impl From<TaskStatusDb> for TaskStatus {
    fn from(status: TaskStatusDb) -> Self {
        match status {
            TaskStatusDb::Pending => TaskStatus::Pending,
            TaskStatusDb::Running => TaskStatus::Running,
            TaskStatusDb::Completed => TaskStatus::Completed,
            TaskStatusDb::Failed => TaskStatus::Failed,
        }
    }
}

impl From<TaskStatus> for TaskStatusDb {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Pending => TaskStatusDb::Pending,
            TaskStatus::Running => TaskStatusDb::Running,
            TaskStatus::Completed => TaskStatusDb::Completed,
            TaskStatus::Failed => TaskStatusDb::Failed,
        }
    }
}
