use std::time::Duration;

use thermosync_api::Fahrenheit;
use time::OffsetDateTime;

use super::ControlState;

fn period_of(cooldown: Duration) -> time::Duration {
    time::Duration::try_from(cooldown).unwrap_or(time::Duration::MAX)
}

/// True while less than `cooldown` has passed since the last adjustment.
pub fn is_in_cooldown(
    last_adjustment_at: Option<OffsetDateTime>,
    now: OffsetDateTime,
    cooldown: Duration,
) -> bool {
    match last_adjustment_at {
        Some(last) => now - last < period_of(cooldown),
        None => false,
    }
}

/// Whole seconds left in the cooldown window, 0 outside of it.
pub fn cooldown_remaining(
    last_adjustment_at: Option<OffsetDateTime>,
    now: OffsetDateTime,
    cooldown: Duration,
) -> u64 {
    match last_adjustment_at {
        Some(last) if is_in_cooldown(Some(last), now, cooldown) => {
            let remaining = period_of(cooldown) - (now - last);
            u64::try_from(remaining.whole_seconds()).unwrap_or(0)
        }
        _ => 0,
    }
}

/// Moves the watermark forward. An older timestamp never rewinds it.
pub fn record_adjustment(state: &mut ControlState, now: OffsetDateTime, target: Fahrenheit) {
    state.last_adjustment_at = Some(match state.last_adjustment_at {
        Some(last) if last > now => last,
        _ => now,
    });
    state.last_adjusted_target = Some(target);
}
