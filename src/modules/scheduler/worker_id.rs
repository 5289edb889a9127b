use crate::shared::errors::AppResult;
use crate::shared::utils::validation::{Validator, MAX_WORKER_ID_LEN};
use rand::Rng;
use std::fmt;

/// Room left for ":<pid>:<8 hex>" after the host part
const MAX_HOST_LEN: usize = MAX_WORKER_ID_LEN - 20;

/// Identity of one scheduler process, stored in `worker_id` while it holds
/// a lease. Unique per OS process: host, pid and a random suffix, so a
/// restarted process with a recycled pid is still told apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn generate() -> Self {
        let host = std::env::var("HOSTNAME")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| "worker".to_string());
        let host: String = host.chars().take(MAX_HOST_LEN).collect();
        let suffix: u32 = rand::thread_rng().gen();

        Self(format!("{}:{}:{:08x}", host, std::process::id(), suffix))
    }

    pub fn new(id: impl Into<String>) -> AppResult<Self> {
        let id = id.into();
        Validator::validate_worker_id(&id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_fit_column_and_differ() {
        let a = WorkerId::generate();
        let b = WorkerId::generate();

        assert!(a.as_str().chars().count() <= MAX_WORKER_ID_LEN);
        assert!(a.as_str().contains(&format!(":{}:", std::process::id())));
        assert_ne!(a, b);
    }

    #[test]
    fn test_new_validates() {
        assert_eq!(WorkerId::new("worker-a").unwrap().to_string(), "worker-a");
        assert!(WorkerId::new("").is_err());
    }
}
