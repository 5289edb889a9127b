use crate::shared::errors::AppError;

pub const MAX_TASK_NAME_LEN: usize = 100;
pub const MAX_WORKER_ID_LEN: usize = 50;

pub struct Validator;

impl Validator {
    pub fn validate_task_name(name: &str) -> Result<(), AppError> {
        if name.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Task name cannot be empty".to_string(),
            ));
        }
        if name.chars().count() > MAX_TASK_NAME_LEN {
            return Err(AppError::InvalidInput(format!(
                "Task name too long (max {} characters)",
                MAX_TASK_NAME_LEN
            )));
        }
        Ok(())
    }

    /// Interval must be positive and fit the INTEGER column
    pub fn validate_interval(interval_seconds: u32) -> Result<i32, AppError> {
        if interval_seconds == 0 {
            return Err(AppError::InvalidInput(
                "Task interval must be at least 1 second".to_string(),
            ));
        }
        i32::try_from(interval_seconds).map_err(|_| {
            AppError::InvalidInput(format!(
                "Task interval too large: {}s (max {}s)",
                interval_seconds,
                i32::MAX
            ))
        })
    }

    pub fn validate_worker_id(worker_id: &str) -> Result<(), AppError> {
        if worker_id.is_empty() {
            return Err(AppError::InvalidInput(
                "Worker id cannot be empty".to_string(),
            ));
        }
        if worker_id.chars().count() > MAX_WORKER_ID_LEN {
            return Err(AppError::InvalidInput(format!(
                "Worker id too long (max {} characters)",
                MAX_WORKER_ID_LEN
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_name_rules() {
        assert!(Validator::validate_task_name("calculate_similarities").is_ok());
        assert!(Validator::validate_task_name("").is_err());
        assert!(Validator::validate_task_name("   ").is_err());
        assert!(Validator::validate_task_name(&"x".repeat(100)).is_ok());
        assert!(Validator::validate_task_name(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_interval_rules() {
        assert_eq!(Validator::validate_interval(60).unwrap(), 60);
        assert!(Validator::validate_interval(0).is_err());
        assert!(Validator::validate_interval(u32::MAX).is_err());
    }

    #[test]
    fn test_worker_id_rules() {
        assert!(Validator::validate_worker_id("host:123:ab12cd34").is_ok());
        assert!(Validator::validate_worker_id("").is_err());
        assert!(Validator::validate_worker_id(&"w".repeat(51)).is_err());
    }
}
