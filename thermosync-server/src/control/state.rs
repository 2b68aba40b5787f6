use std::collections::VecDeque;

use thermosync_api::Fahrenheit;
use time::OffsetDateTime;

/// Mutable control state. Owned by the control loop task only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlState {
    pub last_adjustment_at: Option<OffsetDateTime>,
    pub last_adjusted_target: Option<Fahrenheit>,
    pub consecutive_errors: u32,
    pub total_errors: u64,
    pub last_error: Option<String>,
    pub last_error_at: Option<OffsetDateTime>,
    pub alerted_for_current_episode: bool,
    pub authentication_failed: bool,
    pub notifications: NotificationWindow,
}

/// Send timestamps of adjustment notifications inside the current window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationWindow {
    pub sent: VecDeque<OffsetDateTime>,
    pub suppressed: u64,
}
