// Shared kernel: errors, infrastructure and utilities used by every module

pub mod errors;
pub mod infrastructure;
pub mod utils;

// Re-exports for convenience
pub use errors::{AppError, AppResult};
pub use infrastructure::database::Database;
pub use infrastructure::database_state::DatabaseState;
