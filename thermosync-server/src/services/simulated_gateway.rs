use std::f64::consts::PI;
use std::sync::Arc;

use async_trait::async_trait;
use thermosync_api::{Fahrenheit, Reading};
use tokio::sync::RwLock;

use super::DeviceGateway;
use crate::control::Clock;
use crate::errors::GatewayError;

const BASE_AMBIENT: Fahrenheit = 72.0;
const DAILY_SWING: Fahrenheit = 6.0;

/// Ambient temperature over a day, coolest before dawn and warmest mid-afternoon.
pub fn simulated_ambient(day_fraction: f64) -> Fahrenheit {
    let radians = (day_fraction - 0.375) * 2.0 * PI;
    let ambient = BASE_AMBIENT + radians.sin() * DAILY_SWING;

    (ambient * 10.0).round() / 10.0
}

pub fn simulated_humidity(day_fraction: f64) -> f64 {
    let radians = day_fraction * 2.0 * PI;

    if (0.3..=0.7).contains(&day_fraction) {
        (radians.sin().max(0.0) * 15.0 + 40.0).round()
    } else {
        (radians.cos().max(0.0) * 20.0 + 45.0).round()
    }
}

/// In-process thermostat used for local runs.
#[derive(Debug)]
pub struct SimulatedThermostat {
    device_id: String,
    clock: Arc<dyn Clock>,
    target: RwLock<Fahrenheit>,
}

impl SimulatedThermostat {
    pub fn new(device_id: impl Into<String>, initial_target: Fahrenheit, clock: Arc<dyn Clock>) -> Self {
        Self {
            device_id: device_id.into(),
            clock,
            target: RwLock::new(initial_target),
        }
    }

    pub async fn target(&self) -> Fahrenheit {
        *self.target.read().await
    }
}

#[async_trait]
impl DeviceGateway for SimulatedThermostat {
    fn kind(&self) -> &'static str {
        "simulated"
    }

    async fn read_temperature(&self) -> Result<Reading, GatewayError> {
        let now = self.clock.now();
        let day_fraction = f64::from(now.time().hour()) / 24.0
            + f64::from(now.time().minute()) / 1440.0
            + f64::from(now.time().second()) / 86400.0;

        Ok(Reading {
            ambient: simulated_ambient(day_fraction),
            target: self.target().await,
            device_id: self.device_id.clone(),
            observed_at: now,
            humidity: Some(simulated_humidity(day_fraction)),
            mode: Some("COOL".to_string()),
        })
    }

    async fn write_target(&self, target: Fahrenheit) -> Result<(), GatewayError> {
        if !(50.0..=90.0).contains(&target) {
            return Err(GatewayError::Permanent(format!(
                "setpoint {target:.1}°F is outside the supported range"
            )));
        }

        *self.target.write().await = target;
        tracing::debug!(device_id = %self.device_id, target, "simulated setpoint changed");
        Ok(())
    }
}
