pub mod config;
pub mod modules;
pub mod schema;
pub mod shared;

use crate::config::AppConfig;
use crate::modules::maintenance::register_maintenance_tasks;
use crate::modules::scheduler::{ScheduledTaskRepository, ScheduledTaskRepositoryImpl, TaskScheduler};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::clock::{Clock, SystemClock};
use crate::shared::DatabaseState;
use std::sync::Arc;
use tokio::task;

/// Run the scheduler daemon until Ctrl-C
pub async fn run() -> AppResult<()> {
    let config = AppConfig::from_env()?;

    // Keep retrying until Postgres is reachable
    let database = DatabaseState::connect_with_retry(&config.database_url).await;

    let migrations_db = Arc::clone(&database);
    let applied = task::spawn_blocking(move || migrations_db.run_migrations()).await??;
    if applied > 0 {
        log::info!("Applied {} pending migrations", applied);
    }
    log::debug!("Database pool: {:?}", database.pool_status());

    let repository: Arc<dyn ScheduledTaskRepository> =
        Arc::new(ScheduledTaskRepositoryImpl::new(Arc::clone(&database)));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let scheduler = TaskScheduler::with_repository(repository, clock, config.scheduler.clone());

    register_maintenance_tasks(scheduler.registry(), &config.maintenance).await?;

    scheduler.start();
    log::info!("Scheduler running as {}; press Ctrl-C to stop", scheduler.worker_id());

    tokio::signal::ctrl_c().await.map_err(|e| {
        AppError::InternalError(format!("Failed to listen for shutdown signal: {}", e))
    })?;
    log::info!("Shutdown requested");
    scheduler.stop().await;

    Ok(())
}
