/// Shared infrastructure concerns
///
/// Connection pooling and database availability tracking used by the
/// scheduler's Postgres store and the daemon entry point.
pub mod database;
pub mod database_state;

// Re-exports for convenience
pub use database::{Database, DbConnection, DbPool};
pub use database_state::DatabaseState;
