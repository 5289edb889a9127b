/// Admin operation tests
mod utils;

use lncrawler_scheduler::modules::scheduler::admin::ADMIN_CLEANUP_MESSAGE;
use lncrawler_scheduler::modules::scheduler::{
    ScheduledTaskRepository, SchedulerAdmin, TaskStatistics, TaskStatus,
};
use lncrawler_scheduler::shared::errors::AppError;
use std::time::Duration;
use utils::fixtures::{at, Harness};

async fn fleet() -> (Harness, SchedulerAdmin) {
    let h = Harness::in_memory();
    h.registry.register("calculate_similarities", 86_400, || async { Ok(()) }).await.unwrap();
    h.registry.register("sync", 60, || async { Ok(()) }).await.unwrap();
    h.registry.register("report", 330, || async { Ok(()) }).await.unwrap();

    let admin = SchedulerAdmin::new(h.repository.clone(), h.clock());
    (h, admin)
}

#[tokio::test]
async fn list_shows_lock_state() {
    let (h, admin) = fleet().await;
    h.set_time(60);
    h.lock_manager
        .acquire("sync", "host:1:deadbeef", Duration::from_secs(100))
        .await
        .unwrap()
        .unwrap();

    h.set_time(100);
    let rows = admin.list_tasks().await.unwrap();
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["sync", "report", "calculate_similarities"]);

    assert_eq!(rows[0].status, "RUNNING (LOCKED)");
    assert_eq!(rows[0].interval, "1m 0s");
    assert_eq!(rows[0].worker.as_deref(), Some("host:1:deadbeef"));
    assert_eq!(rows[1].status, "PENDING");
    assert_eq!(rows[1].interval, "5m 30s");
    assert_eq!(rows[2].interval, "24h 0m");

    h.set_time(200);
    let rows = admin.list_tasks().await.unwrap();
    assert_eq!(rows[0].status, "RUNNING (STALE LOCK)");
    assert_eq!(rows[0].worker.as_deref(), Some("host:1:deadbeef (expired)"));
}

#[tokio::test]
async fn reset_clears_lock_but_keeps_schedule() {
    let (h, admin) = fleet().await;
    h.set_time(60);
    let lease = h
        .lock_manager
        .acquire("sync", "worker-a", Duration::from_secs(100))
        .await
        .unwrap()
        .unwrap();

    let reset = admin.reset_task("sync").await.unwrap();
    assert_eq!(reset.status, TaskStatus::Pending);
    assert_eq!(reset.locked_until, None);
    assert_eq!(reset.worker_id, None);
    assert!(reset.error_message.is_empty());
    assert_eq!(reset.next_run_at, lease.next_run_at);

    let missing = admin.reset_task("nope").await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn cleanup_only_touches_expired_locks() {
    let (h, admin) = fleet().await;
    h.set_time(60);
    h.lock_manager
        .acquire("sync", "worker-a", Duration::from_secs(10))
        .await
        .unwrap()
        .unwrap();
    h.set_time(330);
    h.lock_manager
        .acquire("report", "worker-b", Duration::from_secs(1800))
        .await
        .unwrap()
        .unwrap();

    h.set_time(400);
    assert_eq!(admin.cleanup_stale_locks().await.unwrap(), 1);

    let sync = h.repository.find_by_name("sync").await.unwrap().unwrap();
    assert_eq!(sync.status, TaskStatus::Pending);
    assert_eq!(sync.error_message, ADMIN_CLEANUP_MESSAGE);
    assert_eq!(sync.next_run_at, at(60));

    let report = h.repository.find_by_name("report").await.unwrap().unwrap();
    assert_eq!(report.status, TaskStatus::Running);
}

#[tokio::test]
async fn statistics_count_statuses_and_stale() {
    let (h, admin) = fleet().await;
    h.set_time(60);
    h.lock_manager
        .acquire("sync", "worker-a", Duration::from_secs(10))
        .await
        .unwrap()
        .unwrap();

    h.set_time(100);
    let stats = admin.statistics().await.unwrap();
    assert_eq!(
        stats,
        TaskStatistics {
            pending: 2,
            running: 1,
            completed: 0,
            failed: 0,
            stale: 1,
            total: 3,
        }
    );
}
