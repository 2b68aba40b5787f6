use async_trait::async_trait;
use thermosync_api::{AdjustmentRecord, Fahrenheit, Reading};

use crate::control::ControlEvent;
use crate::errors::{GatewayError, StoreError};

/// A single thermostat.
#[async_trait]
pub trait DeviceGateway: Send + Sync {
    /// Short adapter name shown by readiness checks.
    fn kind(&self) -> &'static str;

    async fn read_temperature(&self) -> Result<Reading, GatewayError>;

    async fn write_target(&self, target: Fahrenheit) -> Result<(), GatewayError>;
}

/// Delivers one already formatted alert.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), GatewayError>;
}

/// Receives control events. Implementations swallow their own failures.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn emit(&self, event: ControlEvent);
}

/// Persists adjustments across process restarts.
#[async_trait]
pub trait RestartStore: Send + Sync {
    /// The most recent adjustment, if any.
    async fn load(&self) -> Result<Option<AdjustmentRecord>, StoreError>;

    async fn save(&self, record: &AdjustmentRecord) -> Result<(), StoreError>;

    /// Most recent first.
    async fn recent(&self, limit: usize) -> Result<Vec<AdjustmentRecord>, StoreError>;
}
