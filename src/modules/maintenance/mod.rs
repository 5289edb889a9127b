/// Periodic maintenance jobs run by the scheduler
///
/// The heavy lifting lives in the crawler's management commands; these
/// tasks only invoke them on a schedule.
pub mod command_task;

pub use command_task::ExternalCommandTask;

use crate::config::MaintenanceConfig;
use crate::modules::scheduler::registry::TaskRegistry;
use crate::shared::errors::AppResult;
use crate::log_info;
use std::sync::Arc;

pub const CALCULATE_SIMILARITIES: &str = "calculate_similarities";
pub const COMPRESS_LOW_TRAFFIC: &str = "compress_low_traffic";

/// Register the maintenance tasks enabled by `config`; returns how many
pub async fn register_maintenance_tasks(
    registry: &TaskRegistry,
    config: &MaintenanceConfig,
) -> AppResult<usize> {
    let mut registered = 0;

    let similarities = Arc::new(ExternalCommandTask::new(config.similarity_command.clone())?);
    registry
        .register(
            CALCULATE_SIMILARITIES,
            config.similarity_interval_seconds,
            move || {
                let task = Arc::clone(&similarities);
                async move { task.run().await }
            },
        )
        .await?;
    registered += 1;

    if let Some(argv) = &config.compress_command {
        let compress = Arc::new(ExternalCommandTask::new(argv.clone())?);
        registry
            .register(
                COMPRESS_LOW_TRAFFIC,
                config.compress_interval_seconds,
                move || {
                    let task = Arc::clone(&compress);
                    async move { task.run().await }
                },
            )
            .await?;
        registered += 1;
    }

    log_info!("Registered {} maintenance tasks", registered);
    Ok(registered)
}
