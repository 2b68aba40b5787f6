use serde::Serialize;
use thermosync_api::{Fahrenheit, Reading};

/// Outcome of evaluating one reading against the configured threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdjustmentDecision {
    pub should_adjust: bool,
    pub new_target: Fahrenheit,
    pub reason: String,
}

/// Lowers the setpoint by `step` whenever `target - ambient` is below `threshold`.
///
/// The differential is signed, so a room already warmer than its setpoint also
/// triggers an adjustment.
pub fn decide(reading: &Reading, threshold: Fahrenheit, step: Fahrenheit) -> AdjustmentDecision {
    let differential = reading.differential();

    if differential < threshold {
        AdjustmentDecision {
            should_adjust: true,
            new_target: reading.target - step,
            reason: format!(
                "differential {differential:.1}°F is below threshold {threshold:.1}°F"
            ),
        }
    } else {
        AdjustmentDecision {
            should_adjust: false,
            new_target: reading.target,
            reason: format!(
                "differential {differential:.1}°F is at or above threshold {threshold:.1}°F"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn reading(ambient: f64, target: f64) -> Reading {
        Reading {
            ambient,
            target,
            device_id: "device-1".into(),
            observed_at: datetime!(2026-01-05 10:00 UTC),
            humidity: None,
            mode: None,
        }
    }

    #[test]
    fn test_small_differential_adjusts() {
        let decision = decide(&reading(71.0, 75.0), 5.0, 5.0);

        assert!(decision.should_adjust);
        assert_eq!(decision.new_target, 70.0);
    }

    #[test]
    fn test_large_differential_holds() {
        let decision = decide(&reading(65.0, 75.0), 5.0, 5.0);

        assert!(!decision.should_adjust);
        assert_eq!(decision.new_target, 75.0);
    }

    #[test]
    fn test_differential_equal_to_threshold_holds() {
        assert!(!decide(&reading(70.0, 75.0), 5.0, 5.0).should_adjust);
    }

    #[test]
    fn test_negative_differential_adjusts() {
        let decision = decide(&reading(78.0, 75.0), 5.0, 2.0);

        assert!(decision.should_adjust);
        assert_eq!(decision.new_target, 73.0);
        assert!(decision.reason.contains("-3.0"));
    }
}
