/// Postgres repository tests - run only when TEST_DATABASE_URL is set
///
/// Tests cover:
/// - Idempotent get_or_create and interval updates
/// - Acquire/release round trip with lease-guarded release
/// - SKIP LOCKED mutual exclusion under concurrent acquires
/// - Stale lock reaping and admin cleanup
mod utils;

use lncrawler_scheduler::modules::scheduler::{
    ScheduledTaskRepository, ScheduledTaskRepositoryImpl, SchedulerAdmin, TaskOutcome, TaskStatus,
    DEFAULT_LOCK_TIMEOUT,
};
use std::sync::Arc;
use std::time::Duration;
use utils::db;
use utils::fixtures::{at, Harness};

fn postgres_harness() -> Option<Harness> {
    let database = db::test_database()?;
    db::clean_test_db(&database);
    Some(Harness::over(Arc::new(ScheduledTaskRepositoryImpl::new(database))))
}

#[tokio::test]
async fn get_or_create_is_idempotent() {
    let _guard = db::acquire_test_lock();
    let Some(h) = postgres_harness() else { return };

    let (first, created) = h.repository.get_or_create("sync", 60, at(0)).await.unwrap();
    assert!(created);
    assert_eq!(first.status, TaskStatus::Pending);
    assert_eq!(first.next_run_at, at(60));
    assert!(first.error_message.is_empty());

    let (second, created) = h.repository.get_or_create("sync", 60, at(10)).await.unwrap();
    assert!(!created);
    assert_eq!(second.id, first.id);
    assert_eq!(second.next_run_at, at(60));

    let updated = h.repository.update_interval("sync", 120, at(20)).await.unwrap().unwrap();
    assert_eq!(updated.interval_seconds, 120);
    assert_eq!(updated.next_run_at, at(60));
    assert!(h.repository.update_interval("sync", 120, at(30)).await.unwrap().is_none());

    assert_eq!(h.repository.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn acquire_release_cycle() {
    let _guard = db::acquire_test_lock();
    let Some(h) = postgres_harness() else { return };
    h.registry.register("sync", 60, || async { Ok(()) }).await.unwrap();

    h.set_time(59);
    assert!(h
        .lock_manager
        .acquire("sync", "worker-a", DEFAULT_LOCK_TIMEOUT)
        .await
        .unwrap()
        .is_none());

    h.set_time(61);
    let lease = h
        .lock_manager
        .acquire("sync", "worker-a", DEFAULT_LOCK_TIMEOUT)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lease.status, TaskStatus::Running);
    assert_eq!(lease.locked_until, Some(at(61 + 1800)));
    assert!(h
        .lock_manager
        .acquire("sync", "worker-b", DEFAULT_LOCK_TIMEOUT)
        .await
        .unwrap()
        .is_none());

    let released = h
        .lock_manager
        .release(&lease, TaskOutcome::Failed("boom".to_string()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(released.status, TaskStatus::Failed);
    assert_eq!(released.error_message, "boom");
    assert_eq!(released.next_run_at, at(121));
    assert_eq!(released.locked_until, None);

    // Releasing the same lease twice is a no-op
    let again = h
        .lock_manager
        .release(&lease, TaskOutcome::Succeeded)
        .await
        .unwrap();
    assert!(again.is_none());

    h.set_time(121);
    let lease = h
        .lock_manager
        .acquire("sync", "worker-b", DEFAULT_LOCK_TIMEOUT)
        .await
        .unwrap()
        .unwrap();
    let done = h
        .lock_manager
        .release(&lease, TaskOutcome::Succeeded)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(done.last_run_at, Some(at(121)));
    assert!(done.error_message.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_acquires_have_one_winner() {
    let _guard = db::acquire_test_lock();
    let Some(h) = postgres_harness() else { return };
    let h = Arc::new(h);
    h.registry.register("sync", 60, || async { Ok(()) }).await.unwrap();
    h.set_time(61);

    let attempts = (0..8).map(|i| {
        let h = Arc::clone(&h);
        tokio::spawn(async move {
            h.lock_manager
                .acquire("sync", &format!("worker-{}", i), Duration::from_secs(1800))
                .await
                .unwrap()
        })
    });

    let winners = futures::future::join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .filter(Option::is_some)
        .count();

    assert_eq!(winners, 1);
}

#[tokio::test]
async fn stale_lock_is_reaped() {
    let _guard = db::acquire_test_lock();
    let Some(h) = postgres_harness() else { return };
    h.registry.register("x", 300, || async { Ok(()) }).await.unwrap();

    h.set_time(300);
    h.lock_manager
        .acquire("x", "worker-a", Duration::from_secs(1800))
        .await
        .unwrap()
        .unwrap();

    h.set_time(2100);
    assert_eq!(h.reaper.sweep().await.unwrap().released, 0);

    h.set_time(2101);
    assert_eq!(h.reaper.sweep().await.unwrap().released, 1);
    assert_eq!(h.reaper.sweep().await.unwrap().released, 0);

    let row = h.repository.find_by_name("x").await.unwrap().unwrap();
    assert_eq!(row.status, TaskStatus::Failed);
    assert_eq!(row.next_run_at, at(2101 + 300));
    assert_eq!(row.worker_id, None);
}

#[tokio::test]
async fn admin_cleanup_and_reset() {
    let _guard = db::acquire_test_lock();
    let Some(h) = postgres_harness() else { return };
    h.registry.register("sync", 60, || async { Ok(()) }).await.unwrap();
    let admin = SchedulerAdmin::new(h.repository.clone(), h.clock());

    h.set_time(60);
    h.lock_manager
        .acquire("sync", "worker-a", Duration::from_secs(10))
        .await
        .unwrap()
        .unwrap();

    h.set_time(100);
    assert_eq!(admin.statistics().await.unwrap().stale, 1);
    assert_eq!(admin.cleanup_stale_locks().await.unwrap(), 1);

    let row = h.repository.find_by_name("sync").await.unwrap().unwrap();
    assert_eq!(row.status, TaskStatus::Pending);
    assert_eq!(row.locked_until, None);
    assert_eq!(row.next_run_at, at(60));

    let reset = admin.reset_task("sync").await.unwrap();
    assert!(reset.error_message.is_empty());
    assert!(admin.reset_task("missing").await.is_err());
}
