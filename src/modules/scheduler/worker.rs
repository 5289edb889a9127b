/// Per-process scheduler loop
///
/// Every tick the loop sweeps stale locks, then walks the registry and runs
/// each task whose lock it manages to acquire. Tasks run one after another
/// inside the tick; parallelism comes from running the loop in several
/// processes against the same store.
use crate::config::SchedulerConfig;
use crate::modules::scheduler::domain::entities::TaskOutcome;
use crate::modules::scheduler::domain::repository::ScheduledTaskRepository;
use crate::modules::scheduler::lock_manager::LockManager;
use crate::modules::scheduler::reaper::StaleLockReaper;
use crate::modules::scheduler::registry::{RegisteredTask, TaskRegistry};
use crate::modules::scheduler::worker_id::WorkerId;
use crate::shared::errors::AppError;
use crate::shared::utils::clock::Clock;
use crate::shared::utils::logger::{LogContext, TimedOperation};
use crate::{log_debug, log_error, log_info, log_warn};
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// What a single tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub reaped: usize,
    pub executed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Not due, held elsewhere, or lost to contention
    pub skipped: usize,
    pub storage_errors: usize,
}

/// Stop signal and join handle of one spawned loop
struct LoopHandle {
    stop: Arc<AtomicBool>,
    wakeup: Arc<Notify>,
    join: JoinHandle<()>,
}

/// Clears the loop-alive flag when the loop future ends, unwinding included
struct LoopAlive<'a>(&'a AtomicBool);

impl Drop for LoopAlive<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct TaskScheduler {
    registry: Arc<TaskRegistry>,
    lock_manager: Arc<LockManager>,
    reaper: Arc<StaleLockReaper>,
    config: SchedulerConfig,
    worker_id: WorkerId,
    is_running: AtomicBool,
    /// True from spawn until the loop future returns, even after a timed-out stop
    loop_alive: AtomicBool,
    current: Mutex<Option<LoopHandle>>,
}

impl TaskScheduler {
    pub fn new(
        registry: Arc<TaskRegistry>,
        lock_manager: Arc<LockManager>,
        reaper: Arc<StaleLockReaper>,
        config: SchedulerConfig,
        worker_id: WorkerId,
    ) -> Self {
        Self {
            registry,
            lock_manager,
            reaper,
            config,
            worker_id,
            is_running: AtomicBool::new(false),
            loop_alive: AtomicBool::new(false),
            current: Mutex::new(None),
        }
    }

    /// Wire registry, lock manager and reaper over one store, with a fresh
    /// worker id for this process.
    pub fn with_repository(
        repository: Arc<dyn ScheduledTaskRepository>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Arc<Self> {
        let registry = Arc::new(TaskRegistry::new(
            Arc::clone(&repository),
            Arc::clone(&clock),
        ));
        let lock_manager = Arc::new(LockManager::new(
            Arc::clone(&repository),
            Arc::clone(&clock),
        ));
        let reaper = Arc::new(StaleLockReaper::new(repository, clock));

        Arc::new(Self::new(
            registry,
            lock_manager,
            reaper,
            config,
            WorkerId::generate(),
        ))
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Spawn the loop.
    ///
    /// Returns false if it is already running, or if the loop from an
    /// earlier timed-out stop is still finishing its task. At most one loop
    /// per scheduler is ever alive.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());

        if self.is_running() {
            log_debug!("Scheduler already running on {}", self.worker_id);
            return false;
        }
        if self.loop_alive.load(Ordering::SeqCst) {
            log_warn!(
                "Previous scheduler loop on {} is still finishing a task; not starting another",
                self.worker_id
            );
            return false;
        }

        self.is_running.store(true, Ordering::SeqCst);
        self.loop_alive.store(true, Ordering::SeqCst);

        log_info!("Starting scheduler...");
        let stop = Arc::new(AtomicBool::new(false));
        let wakeup = Arc::new(Notify::new());
        let join = tokio::spawn(Arc::clone(self).run(Arc::clone(&stop), Arc::clone(&wakeup)));
        *current = Some(LoopHandle { stop, wakeup, join });

        true
    }

    /// Stop acquiring new tasks and wait (bounded) for the loop to exit.
    ///
    /// A task that is mid-run is not interrupted; if it outlives the stop
    /// timeout the loop keeps running detached until the task finishes and
    /// its lock is released, and `start` refuses until then.
    pub async fn stop(&self) -> bool {
        let handle = {
            let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
            if !self.is_running.swap(false, Ordering::SeqCst) {
                return false;
            }
            current.take()
        };

        if let Some(handle) = handle {
            handle.stop.store(true, Ordering::SeqCst);
            handle.wakeup.notify_one();

            match tokio::time::timeout(self.config.stop_timeout, handle.join).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log_error!("Scheduler loop ended abnormally: {}", e),
                Err(_) => log_warn!(
                    "Scheduler loop did not exit within {:?}; a task is still running",
                    self.config.stop_timeout
                ),
            }
        }

        log_info!("Scheduler stopped");
        true
    }

    async fn run(self: Arc<Self>, stop: Arc<AtomicBool>, wakeup: Arc<Notify>) {
        let _alive = LoopAlive(&self.loop_alive);

        log_info!(
            "Scheduler started on {} with {} tasks (tick: {:?}, lock timeout: {:?})",
            self.worker_id,
            self.registry.len(),
            self.config.tick_interval,
            self.config.lock_timeout
        );

        while !stop.load(Ordering::SeqCst) {
            let report = self.tick_until(&stop).await;
            if report != TickReport::default() {
                log_debug!("Tick finished: {:?}", report);
            }

            if stop.load(Ordering::SeqCst) {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.tick_interval) => {}
                _ = wakeup.notified() => {}
            }
        }

        log_info!("Scheduler loop on {} exited", self.worker_id);
    }

    /// One pass: reap stale locks, then try every registered task once.
    ///
    /// Storage failures are logged and counted; the next tick retries.
    pub async fn tick(&self) -> TickReport {
        self.tick_until(&AtomicBool::new(false)).await
    }

    /// Like `tick`, but no further task is acquired once `stop` is set
    async fn tick_until(&self, stop: &AtomicBool) -> TickReport {
        let mut report = TickReport::default();

        match self.reaper.sweep().await {
            Ok(sweep) => {
                report.reaped = sweep.released;
                report.storage_errors += sweep.failed;
            }
            Err(e) => {
                log_store_error("Stale lock sweep", &e);
                report.storage_errors += 1;
            }
        }

        for task in self.registry.snapshot() {
            if stop.load(Ordering::SeqCst) {
                break;
            }

            let lease = match self
                .lock_manager
                .acquire(&task.name, self.worker_id.as_str(), self.config.lock_timeout)
                .await
            {
                Ok(Some(lease)) => lease,
                Ok(None) => {
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    log_store_error(&format!("Acquiring task '{}'", task.name), &e);
                    report.storage_errors += 1;
                    continue;
                }
            };

            let outcome = self.execute(&task).await;
            report.executed += 1;
            if outcome.is_success() {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }

            if let Err(e) = self.lock_manager.release(&lease, outcome).await {
                // The lease stays until it expires and is reaped
                log_store_error(&format!("Releasing task '{}'", task.name), &e);
                report.storage_errors += 1;
            }
        }

        report
    }

    /// Run the callable on its own tokio task so a panic stays contained
    async fn execute(&self, task: &RegisteredTask) -> TaskOutcome {
        log_info!("Running scheduled task: {}", task.name);
        let timer = TimedOperation::new(&task.name);

        let callable = task.callable();
        let outcome = match tokio::spawn(async move { callable().await }).await {
            Ok(Ok(())) => TaskOutcome::Succeeded,
            Ok(Err(e)) => TaskOutcome::Failed(format!("{:#}", e)),
            Err(e) if e.is_panic() => {
                TaskOutcome::Failed(format!("task panicked: {}", panic_message(e.into_panic())))
            }
            Err(e) => TaskOutcome::Failed(format!("task was cancelled: {}", e)),
        };

        let error = match &outcome {
            TaskOutcome::Succeeded => None,
            TaskOutcome::Failed(message) => Some(message.as_str()),
        };
        LogContext::task_run(&task.name, self.worker_id.as_str(), timer.elapsed_ms(), error);

        outcome
    }
}

fn log_store_error(operation: &str, error: &AppError) {
    if error.is_storage_failure() {
        log_warn!("{} failed, retrying next tick: {}", operation, error);
    } else {
        log_error!("{} failed: {}", operation, error);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
