use crate::modules::scheduler::domain::repository::ScheduledTaskRepository;
use crate::shared::errors::AppResult;
use crate::shared::utils::clock::Clock;
use crate::{log_debug, log_error, log_info, log_warn};
use std::sync::Arc;

pub const STALE_LOCK_MESSAGE: &str = "Lock expired - worker may have crashed";

/// What one sweep did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub released: usize,
    /// Rows whose release hit a store error; retried on the next sweep
    pub failed: usize,
}

/// Frees locks whose holder is presumed dead.
///
/// A row still marked running after its `locked_until` passed is failed and
/// rescheduled one interval out. Each row is released with a conditional
/// update, so reapers in several processes can sweep at once.
pub struct StaleLockReaper {
    repository: Arc<dyn ScheduledTaskRepository>,
    clock: Arc<dyn Clock>,
}

impl StaleLockReaper {
    pub fn new(repository: Arc<dyn ScheduledTaskRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Release every stale lock found at the current time.
    ///
    /// Only the initial lookup can fail the sweep. A row whose release fails
    /// is logged and counted, and the remaining rows are still processed.
    pub async fn sweep(&self) -> AppResult<SweepReport> {
        let now = self.clock.now();
        let stale = self.repository.find_stale(now).await?;

        let mut report = SweepReport::default();
        for task in stale {
            log_warn!(
                "Cleaning up stale lock for task '{}' (locked by worker '{}')",
                task.name,
                task.worker_id.as_deref().unwrap_or("-")
            );

            match self
                .repository
                .release_stale(&task.name, STALE_LOCK_MESSAGE, now)
                .await
            {
                Ok(Some(_)) => report.released += 1,
                Ok(None) => log_debug!("Stale lock on '{}' already released elsewhere", task.name),
                Err(e) => {
                    if e.is_storage_failure() {
                        log_warn!("Releasing stale lock on '{}' failed: {}", task.name, e);
                    } else {
                        log_error!("Releasing stale lock on '{}' failed: {}", task.name, e);
                    }
                    report.failed += 1;
                }
            }
        }

        if report.released > 0 {
            log_info!("Cleaned up {} stale task locks", report.released);
        }

        Ok(report)
    }
}
