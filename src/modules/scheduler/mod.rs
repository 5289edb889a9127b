/// Database-backed periodic task scheduler
///
/// Several processes share one `scheduler_scheduled_task` table; each task
/// row doubles as a lease so that a given task runs on at most one worker
/// at a time.
///
/// Architecture:
/// - Domain: task record, outcome and repository trait
/// - Infrastructure: Diesel repository and an in-memory store
/// - Registry / LockManager / StaleLockReaper: the pieces one tick uses
/// - Worker: the tick loop itself
/// - Admin: listing, reset and manual lock cleanup
pub mod admin;
pub mod domain;
pub mod infrastructure;
pub mod lock_manager;
pub mod reaper;
pub mod registry;
pub mod worker;
pub mod worker_id;

pub use admin::{SchedulerAdmin, TaskOverview, TaskStatistics};
pub use domain::{ScheduledTask, ScheduledTaskRepository, TaskOutcome, TaskStatus};
pub use infrastructure::{InMemoryTaskRepository, ScheduledTaskRepositoryImpl};
pub use lock_manager::{LockManager, DEFAULT_LOCK_TIMEOUT};
pub use reaper::{StaleLockReaper, SweepReport};
pub use registry::{RegisteredTask, TaskRegistry};
pub use worker::{TaskScheduler, TickReport};
pub use worker_id::WorkerId;
