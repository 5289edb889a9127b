/// Time source for scheduling arithmetic
///
/// Every store operation receives `now` from a `Clock` instead of calling
/// `Utc::now()` itself, so tests can drive time by hand.
use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Truncate to microseconds, the precision Postgres stores for timestamptz.
///
/// Lease comparisons bind timestamps back into queries; a nanosecond value
/// would never equal what the database kept.
pub fn db_precision(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(6)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        db_precision(Utc::now())
    }
}

/// Manually advanced clock for tests and simulations
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(db_precision(start)),
        }
    }

    /// Clock starting at the unix epoch, so `timestamp()` is the elapsed seconds
    pub fn at_epoch() -> Self {
        Self::new(DateTime::<Utc>::default())
    }

    pub fn set(&self, at: DateTime<Utc>) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = db_precision(at);
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += by;
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_system_clock_is_microsecond_precise() {
        let now = SystemClock.now();
        assert_eq!(now.nanosecond() % 1_000, 0);
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::at_epoch();
        clock.advance_secs(61);
        assert_eq!(clock.now().timestamp(), 61);

        clock.advance(Duration::milliseconds(500));
        assert_eq!(clock.now().timestamp_millis(), 61_500);
    }

    #[test]
    fn test_manual_clock_set_truncates() {
        let clock = ManualClock::at_epoch();
        let at = DateTime::<Utc>::default() + Duration::nanoseconds(1_234_567);
        clock.set(at);
        assert_eq!(clock.now().timestamp_nanos_opt(), Some(1_234_000));
    }
}
