/// In-process task registry
///
/// Maps task names to the callable that runs them. The mapping itself is
/// not durable: every process registers the same tasks at startup, and
/// registration makes sure the matching store row exists.
use crate::modules::scheduler::domain::entities::ScheduledTask;
use crate::modules::scheduler::domain::repository::ScheduledTaskRepository;
use crate::shared::errors::AppResult;
use crate::shared::utils::clock::Clock;
use crate::shared::utils::validation::Validator;
use crate::{log_debug, log_info};
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

pub type TaskFuture = BoxFuture<'static, anyhow::Result<()>>;
pub type TaskFn = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

#[derive(Clone)]
pub struct RegisteredTask {
    pub name: String,
    pub interval_seconds: u32,
    callable: TaskFn,
}

impl RegisteredTask {
    pub fn callable(&self) -> TaskFn {
        Arc::clone(&self.callable)
    }
}

impl std::fmt::Debug for RegisteredTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTask")
            .field("name", &self.name)
            .field("interval_seconds", &self.interval_seconds)
            .finish_non_exhaustive()
    }
}

pub struct TaskRegistry {
    repository: Arc<dyn ScheduledTaskRepository>,
    clock: Arc<dyn Clock>,
    tasks: RwLock<BTreeMap<String, RegisteredTask>>,
}

impl TaskRegistry {
    pub fn new(repository: Arc<dyn ScheduledTaskRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            clock,
            tasks: RwLock::new(BTreeMap::new()),
        }
    }

    /// Run `callable` every `interval_seconds` under `name`.
    ///
    /// Creates the store row on first registration (due one interval from
    /// now). For an existing row only a changed interval is written;
    /// `next_run_at` is kept.
    pub async fn register<F, Fut>(
        &self,
        name: &str,
        interval_seconds: u32,
        callable: F,
    ) -> AppResult<ScheduledTask>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Validator::validate_task_name(name)?;
        let interval = Validator::validate_interval(interval_seconds)?;
        let now = self.clock.now();

        let (mut record, created) = self
            .repository
            .get_or_create(name, interval, now)
            .await?;

        if created {
            log_info!(
                "Created new scheduled task: {} (interval: {}s)",
                name,
                interval_seconds
            );
        } else if record.interval_seconds != interval {
            if let Some(updated) = self
                .repository
                .update_interval(name, interval, now)
                .await?
            {
                record = updated;
            }
            log_info!("Updated interval for task {}: {}s", name, interval_seconds);
        }

        let callable: TaskFn = Arc::new(move || -> TaskFuture { Box::pin(callable()) });
        let total = {
            let mut tasks = self.tasks.write().unwrap_or_else(|e| e.into_inner());
            if tasks.contains_key(name) {
                log_debug!("Replacing callable for task {}", name);
            }
            tasks.insert(
                name.to_string(),
                RegisteredTask {
                    name: name.to_string(),
                    interval_seconds,
                    callable,
                },
            );
            tasks.len()
        };

        log_info!(
            "Registered scheduled task: {} (interval: {}s). {} total tasks.",
            name,
            interval_seconds,
            total
        );
        log_debug!("Stored record: {}", record);

        Ok(record)
    }

    /// Registered tasks in name order
    pub fn snapshot(&self) -> Vec<RegisteredTask> {
        self.tasks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<RegisteredTask> {
        self.tasks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    pub fn task_names(&self) -> Vec<String> {
        self.tasks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
