//! Time source for mirror timestamps

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Abstract time source
pub trait Clock: Send + Sync {
    /// Current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays
#[derive(Debug)]
pub struct ManualClock {
    time: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Clock frozen at `initial`
    pub fn new(initial: DateTime<Utc>) -> Self {
        Self {
            time: Mutex::new(initial),
        }
    }

    /// Move forward (or backward, for negative durations)
    pub fn advance(&self, by: Duration) {
        let mut time = self.time.lock();
        *time += by;
    }

    /// Jump to `at`
    pub fn set(&self, at: DateTime<Utc>) {
        *self.time.lock() = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.time.lock()
    }
}
