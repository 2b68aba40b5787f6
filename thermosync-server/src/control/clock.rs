use std::fmt::Debug;

use time::OffsetDateTime;
use tokio::time::Instant;

/// Source of wall-clock time for the control loop.
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Wall time anchored at construction and advanced by the tokio monotonic
/// clock, so it never jumps backwards and follows paused time in tests.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    base: OffsetDateTime,
    started: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::starting_at(OffsetDateTime::now_utc())
    }

    pub fn starting_at(base: OffsetDateTime) -> Self {
        Self {
            base,
            started: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> OffsetDateTime {
        self.base + self.started.elapsed()
    }
}
