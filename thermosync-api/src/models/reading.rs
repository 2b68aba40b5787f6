use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::Fahrenheit;

/// A single sample taken from the thermostat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Room temperature
    pub ambient: Fahrenheit,
    /// Current setpoint
    pub target: Fahrenheit,
    /// Vendor device identifier
    pub device_id: String,
    /// When the device reported the sample
    #[serde(with = "time::serde::rfc3339")]
    pub observed_at: OffsetDateTime,
    /// Relative humidity percentage, when the device exposes it
    #[serde(default)]
    pub humidity: Option<f64>,
    /// HVAC mode such as `HEAT`, `COOL`, `HEATCOOL` or `OFF`
    #[serde(default)]
    pub mode: Option<String>,
}

impl Reading {
    /// Signed `target - ambient`. Negative once the room is warmer than the setpoint.
    pub fn differential(&self) -> Fahrenheit {
        self.target - self.ambient
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn test_differential_is_signed() {
        let mut reading = Reading {
            ambient: 71.0,
            target: 75.0,
            device_id: "device-1".to_string(),
            observed_at: datetime!(2024-01-01 12:00 UTC),
            humidity: None,
            mode: None,
        };
        assert_eq!(reading.differential(), 4.0);

        reading.ambient = 78.0;
        assert_eq!(reading.differential(), -3.0);
    }

    #[test]
    fn test_optional_fields_default_when_missing() {
        let json = r#"{
            "ambient": 70.5,
            "target": 72.0,
            "device_id": "device-1",
            "observed_at": "2024-01-01T12:00:00Z"
        }"#;

        let reading: Reading = serde_json::from_str(json).unwrap();
        assert_eq!(reading.humidity, None);
        assert_eq!(reading.mode, None);
        assert_eq!(reading.observed_at, datetime!(2024-01-01 12:00 UTC));
    }
}
