/// Postgres test utilities
///
/// Tests that need a real database call `test_database()` and return early
/// when `TEST_DATABASE_URL` is not set.
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use lncrawler_scheduler::shared::Database;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

static DATABASE: OnceLock<Option<Arc<Database>>> = OnceLock::new();

/// Shared, migrated test database, or None when no test database is configured
pub fn test_database() -> Option<Arc<Database>> {
    DATABASE
        .get_or_init(|| {
            dotenvy::dotenv().ok();
            let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
                eprintln!("TEST_DATABASE_URL not set; skipping Postgres tests");
                return None;
            };

            let manager = ConnectionManager::<PgConnection>::new(url);
            let pool = r2d2::Pool::builder()
                .max_size(10)
                .build(manager)
                .expect("Failed to create test database pool");

            let database = Database::from_pool(pool);
            database
                .run_migrations()
                .expect("Failed to run migrations on test database");

            Some(Arc::new(database))
        })
        .clone()
}

/// Clean the scheduler table - use at the start of each test
pub fn clean_test_db(database: &Database) {
    let mut conn = database.get_connection().expect("Failed to get DB connection");

    diesel::sql_query("TRUNCATE TABLE scheduler_scheduled_task RESTART IDENTITY")
        .execute(&mut conn)
        .expect("Failed to clean scheduler_scheduled_task");
}

/// Global test mutex for serialization
static TEST_LOCK: Mutex<()> = Mutex::new(());

/// Acquire test lock to ensure tests run serially
/// Returns a guard that releases the lock when dropped
pub fn acquire_test_lock() -> MutexGuard<'static, ()> {
    // Handle poisoned mutex by recovering from panic
    match TEST_LOCK.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
