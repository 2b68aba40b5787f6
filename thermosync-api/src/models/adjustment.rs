use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::Fahrenheit;

/// One setpoint change that the device acknowledged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentRecord {
    /// Record identifier
    pub id: Uuid,
    /// Device the write was sent to
    pub device_id: String,
    /// Setpoint before the write
    pub previous_target: Fahrenheit,
    /// Setpoint after the write
    pub new_target: Fahrenheit,
    /// Room temperature observed in the cycle that triggered the write
    pub ambient_at_adjustment: Fahrenheit,
    /// Why the decision engine asked for the change
    pub reason: String,
    /// When the device acknowledged the write
    #[serde(with = "time::serde::rfc3339")]
    pub triggered_at: OffsetDateTime,
    /// Whether an adjustment notification went out for this record
    pub notified: bool,
}

impl AdjustmentRecord {
    pub fn new(
        device_id: impl Into<String>,
        previous_target: Fahrenheit,
        new_target: Fahrenheit,
        ambient_at_adjustment: Fahrenheit,
        reason: impl Into<String>,
        triggered_at: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id: device_id.into(),
            previous_target,
            new_target,
            ambient_at_adjustment,
            reason: reason.into(),
            triggered_at,
            notified: false,
        }
    }

    /// Copy of this record carrying the notification outcome.
    pub fn with_notified(&self, notified: bool) -> Self {
        Self {
            notified,
            ..self.clone()
        }
    }
}
