mod clock;
mod control_loop;
mod cooldown;
mod decision;
mod error_monitor;
mod event;
mod rate_limiter;
mod recovery;
mod retry;
mod snapshot;
mod state;

pub use clock::{Clock, MonotonicClock};
pub use control_loop::{
    Collaborators, ControlLoop, ControlSettings, ControlTask, DrainOutcome, spawn_control_loop,
};
pub use cooldown::{cooldown_remaining, is_in_cooldown, record_adjustment};
pub use decision::{AdjustmentDecision, decide};
pub use error_monitor::{AlertAction, Outcome, ThresholdPolicy, record_outcome};
pub use event::{AdjustmentOutcome, ControlEvent, CycleReport, NotificationOutcome};
pub use rate_limiter::RateLimitPolicy;
pub use recovery::{TARGET_MATCH_EPSILON, recover};
pub use retry::{RetryExecutor, RetryPolicy, jittered};
pub(crate) use retry::cancelled;
pub use snapshot::{
    ADJUSTMENT_HISTORY_LIMIT, ControlHandle, ControlSnapshot, READING_HISTORY_LIMIT,
};
pub use state::{ControlState, NotificationWindow};
