use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Liveness view of the control loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    /// Whether the loop task is accepting cycles
    pub running: bool,
    pub consecutive_errors: u32,
    pub total_errors: u64,
    pub last_error: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_error_at: Option<OffsetDateTime>,
    /// Set while the device rejects our credentials
    pub authentication_failed: bool,
    pub in_cooldown: bool,
    pub cooldown_remaining_seconds: u64,
    pub adjustment_count: u64,
    pub notification_count: u64,
    pub notifications_suppressed: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_reading_at: Option<OffsetDateTime>,
    pub uptime_seconds: f64,
}

/// Readiness view used by orchestrator probes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessReport {
    pub ready: bool,
    pub running: bool,
    pub device: String,
    pub notifications_enabled: bool,
    pub details: Option<String>,
}
