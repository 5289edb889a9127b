use chrono::{DateTime, Duration, Utc};
use lncrawler_scheduler::modules::scheduler::{
    InMemoryTaskRepository, LockManager, ScheduledTaskRepository, StaleLockReaper, TaskRegistry,
};
use lncrawler_scheduler::shared::utils::clock::{Clock, ManualClock};
use std::sync::Arc;

/// Seconds after the fixed test epoch
pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::default() + Duration::seconds(secs)
}

/// Registry, lock manager and reaper over one store and one manual clock
pub struct Harness {
    pub repository: Arc<dyn ScheduledTaskRepository>,
    pub clock: Arc<ManualClock>,
    pub registry: TaskRegistry,
    pub lock_manager: LockManager,
    pub reaper: StaleLockReaper,
}

impl Harness {
    pub fn in_memory() -> Self {
        Self::over(Arc::new(InMemoryTaskRepository::new()))
    }

    pub fn over(repository: Arc<dyn ScheduledTaskRepository>) -> Self {
        let clock = Arc::new(ManualClock::new(at(0)));
        let dyn_clock: Arc<dyn Clock> = clock.clone();

        Self {
            registry: TaskRegistry::new(Arc::clone(&repository), Arc::clone(&dyn_clock)),
            lock_manager: LockManager::new(Arc::clone(&repository), Arc::clone(&dyn_clock)),
            reaper: StaleLockReaper::new(Arc::clone(&repository), dyn_clock),
            repository,
            clock,
        }
    }

    pub fn set_time(&self, secs: i64) {
        self.clock.set(at(secs));
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }
}
