use time::OffsetDateTime;

use super::ControlState;
use crate::configs::{Control, ErrorCountMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertAction {
    None,
    FireAlert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdPolicy {
    pub threshold: u32,
    pub mode: ErrorCountMode,
}

impl From<&Control> for ThresholdPolicy {
    fn from(control: &Control) -> Self {
        Self {
            threshold: control.error_threshold,
            mode: control.error_count_mode,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    Success,
    Failure { at: OffsetDateTime, error: &'a str },
}

/// Updates the error counters and fires at most one alert per failure episode.
///
/// In cumulative mode the running total never resets, so the alert fires only
/// on the failure that carries the total up to the threshold.
pub fn record_outcome(
    state: &mut ControlState,
    outcome: Outcome<'_>,
    policy: &ThresholdPolicy,
) -> AlertAction {
    match outcome {
        Outcome::Success => {
            state.consecutive_errors = 0;
            state.alerted_for_current_episode = false;
            AlertAction::None
        }
        Outcome::Failure { at, error } => {
            state.consecutive_errors = state.consecutive_errors.saturating_add(1);
            state.total_errors = state.total_errors.saturating_add(1);
            state.last_error = Some(error.to_string());
            state.last_error_at = Some(at);

            let threshold = u64::from(policy.threshold);
            let crossed = match policy.mode {
                ErrorCountMode::Consecutive => u64::from(state.consecutive_errors) >= threshold,
                ErrorCountMode::Cumulative => {
                    let previous = state.total_errors.saturating_sub(1);
                    previous < threshold && state.total_errors >= threshold
                }
            };

            if crossed && !state.alerted_for_current_episode {
                state.alerted_for_current_episode = true;
                AlertAction::FireAlert
            } else {
                AlertAction::None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    const AT: OffsetDateTime = datetime!(2026-01-05 10:00 UTC);

    fn fail(state: &mut ControlState, policy: &ThresholdPolicy) -> AlertAction {
        record_outcome(state, Outcome::Failure { at: AT, error: "boom" }, policy)
    }

    #[test]
    fn test_single_alert_per_episode() {
        let policy = ThresholdPolicy {
            threshold: 3,
            mode: ErrorCountMode::Consecutive,
        };
        let mut state = ControlState::default();

        assert_eq!(fail(&mut state, &policy), AlertAction::None);
        assert_eq!(fail(&mut state, &policy), AlertAction::None);
        assert_eq!(fail(&mut state, &policy), AlertAction::FireAlert);
        assert_eq!(fail(&mut state, &policy), AlertAction::None);
        assert_eq!(state.consecutive_errors, 4);
        assert_eq!(state.last_error.as_deref(), Some("boom"));

        record_outcome(&mut state, Outcome::Success, &policy);
        assert_eq!(state.consecutive_errors, 0);
        assert_eq!(state.total_errors, 4);

        assert_eq!(fail(&mut state, &policy), AlertAction::None);
        assert_eq!(fail(&mut state, &policy), AlertAction::None);
        assert_eq!(fail(&mut state, &policy), AlertAction::FireAlert);
    }

    #[test]
    fn test_cumulative_mode_counts_across_successes() {
        let policy = ThresholdPolicy {
            threshold: 3,
            mode: ErrorCountMode::Cumulative,
        };
        let mut state = ControlState::default();

        fail(&mut state, &policy);
        record_outcome(&mut state, Outcome::Success, &policy);
        fail(&mut state, &policy);
        record_outcome(&mut state, Outcome::Success, &policy);

        assert_eq!(fail(&mut state, &policy), AlertAction::FireAlert);
        assert_eq!(state.consecutive_errors, 1);
        assert_eq!(state.total_errors, 3);
    }

    #[test]
    fn test_cumulative_mode_stays_quiet_after_the_crossing() {
        let policy = ThresholdPolicy {
            threshold: 2,
            mode: ErrorCountMode::Cumulative,
        };
        let mut state = ControlState::default();

        fail(&mut state, &policy);
        assert_eq!(fail(&mut state, &policy), AlertAction::FireAlert);

        for _ in 0..5 {
            record_outcome(&mut state, Outcome::Success, &policy);
            assert_eq!(fail(&mut state, &policy), AlertAction::None);
        }
        assert_eq!(state.total_errors, 7);
    }

    #[test]
    fn test_threshold_of_one_fires_immediately() {
        let policy = ThresholdPolicy {
            threshold: 1,
            mode: ErrorCountMode::Consecutive,
        };
        let mut state = ControlState::default();

        assert_eq!(fail(&mut state, &policy), AlertAction::FireAlert);
    }
}
