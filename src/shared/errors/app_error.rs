use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<diesel::result::Error> for AppError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => {
                AppError::NotFound("Record not found in database".to_string())
            }
            _ => AppError::DatabaseError(err.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for AppError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        AppError::DatabaseError(format!("Database pool error: {}", err))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::InternalError(format!("Blocking database task failed: {}", err))
    }
}

impl From<chrono::OutOfRangeError> for AppError {
    fn from(err: chrono::OutOfRangeError) -> Self {
        AppError::InvalidInput(format!("Duration out of range: {}", err))
    }
}

impl AppError {
    /// Storage failures are retried on the next tick instead of surfacing
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            AppError::DatabaseError(_) | AppError::ServiceUnavailable(_)
        )
    }
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
