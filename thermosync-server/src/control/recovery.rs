use thermosync_api::{AdjustmentRecord, Fahrenheit};

use super::ControlState;

/// Setpoints closer than this are treated as the same value.
pub const TARGET_MATCH_EPSILON: Fahrenheit = 0.05;

/// Seeds the cooldown from a persisted adjustment when the device still
/// carries the setpoint that adjustment wrote.
///
/// When the device could not be read (`current_target` is `None`) the
/// persisted record is trusted.
///
/// The cooldown keeps running from the persisted trigger time. After an
/// outage longer than the cooldown the first cycle may adjust again.
pub fn recover(
    snapshot: Option<&AdjustmentRecord>,
    current_target: Option<Fahrenheit>,
) -> ControlState {
    let Some(record) = snapshot else {
        return ControlState::default();
    };

    let matches = match current_target {
        Some(target) => (record.new_target - target).abs() < TARGET_MATCH_EPSILON,
        None => true,
    };

    if matches {
        ControlState {
            last_adjustment_at: Some(record.triggered_at),
            last_adjusted_target: Some(record.new_target),
            ..ControlState::default()
        }
    } else {
        ControlState::default()
    }
}
