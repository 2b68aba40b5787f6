use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use thermosync_api::{AdjustmentRecord, HealthReport, HealthStatus, ReadinessReport, Reading};
use time::OffsetDateTime;
use tokio::sync::watch;

use super::{Clock, ControlState, cooldown_remaining, is_in_cooldown};

/// Readings kept for the history query, one day at the default cadence.
pub const READING_HISTORY_LIMIT: usize = 1440;

/// Adjustments kept for the history query.
pub const ADJUSTMENT_HISTORY_LIMIT: usize = 100;

/// Read-only copy of the control loop's state, republished after every change.
#[derive(Debug, Clone, Default)]
pub struct ControlSnapshot {
    pub running: bool,
    pub cycles: u64,
    pub latest_reading: Option<Reading>,
    pub readings: VecDeque<Reading>,
    /// Most recent first
    pub adjustments: VecDeque<AdjustmentRecord>,
    pub last_adjustment_at: Option<OffsetDateTime>,
    pub consecutive_errors: u32,
    pub total_errors: u64,
    pub last_error: Option<String>,
    pub last_error_at: Option<OffsetDateTime>,
    pub authentication_failed: bool,
    pub adjustment_count: u64,
    pub notification_count: u64,
    pub notifications_suppressed: u64,
}

impl ControlSnapshot {
    pub fn push_reading(&mut self, reading: Reading) {
        if self.readings.len() >= READING_HISTORY_LIMIT {
            self.readings.pop_front();
        }
        self.readings.push_back(reading.clone());
        self.latest_reading = Some(reading);
    }

    pub fn push_adjustment(&mut self, record: AdjustmentRecord) {
        self.adjustments.push_front(record);
        self.adjustments.truncate(ADJUSTMENT_HISTORY_LIMIT);
    }

    /// Copies the counters owned by the control state.
    pub fn sync_state(&mut self, state: &ControlState) {
        self.last_adjustment_at = state.last_adjustment_at;
        self.consecutive_errors = state.consecutive_errors;
        self.total_errors = state.total_errors;
        self.last_error = state.last_error.clone();
        self.last_error_at = state.last_error_at;
        self.authentication_failed = state.authentication_failed;
        self.notifications_suppressed = state.notifications.suppressed;
    }
}

/// Query side of a running control loop. Every call works on a copy.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    snapshot: watch::Receiver<ControlSnapshot>,
    clock: Arc<dyn Clock>,
    started_at: OffsetDateTime,
    cooldown: Duration,
    degraded_watermark: u32,
    device: String,
    notifications_enabled: bool,
}

impl ControlHandle {
    pub fn new(
        snapshot: watch::Receiver<ControlSnapshot>,
        clock: Arc<dyn Clock>,
        cooldown: Duration,
        degraded_watermark: u32,
        device: impl Into<String>,
        notifications_enabled: bool,
    ) -> Self {
        let started_at = clock.now();
        Self {
            snapshot,
            clock,
            started_at,
            cooldown,
            degraded_watermark,
            device: device.into(),
            notifications_enabled,
        }
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn latest_reading(&self) -> Option<Reading> {
        self.snapshot.borrow().latest_reading.clone()
    }

    /// Readings observed during the last `hours`, oldest first.
    pub fn readings(&self, hours: u32) -> Vec<Reading> {
        let since = self.clock.now() - time::Duration::hours(i64::from(hours));
        self.snapshot
            .borrow()
            .readings
            .iter()
            .filter(|reading| reading.observed_at >= since)
            .cloned()
            .collect()
    }

    /// Most recent adjustments first.
    pub fn adjustment_history(&self, limit: usize) -> Vec<AdjustmentRecord> {
        self.snapshot
            .borrow()
            .adjustments
            .iter()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn health(&self) -> HealthReport {
        let now = self.clock.now();
        let snapshot = self.snapshot.borrow();

        let degraded = !snapshot.running
            || snapshot.authentication_failed
            || snapshot.consecutive_errors > self.degraded_watermark;

        HealthReport {
            status: if degraded {
                HealthStatus::Degraded
            } else {
                HealthStatus::Healthy
            },
            running: snapshot.running,
            consecutive_errors: snapshot.consecutive_errors,
            total_errors: snapshot.total_errors,
            last_error: snapshot.last_error.clone(),
            last_error_at: snapshot.last_error_at,
            authentication_failed: snapshot.authentication_failed,
            in_cooldown: is_in_cooldown(snapshot.last_adjustment_at, now, self.cooldown),
            cooldown_remaining_seconds: cooldown_remaining(
                snapshot.last_adjustment_at,
                now,
                self.cooldown,
            ),
            adjustment_count: snapshot.adjustment_count,
            notification_count: snapshot.notification_count,
            notifications_suppressed: snapshot.notifications_suppressed,
            last_reading_at: snapshot.latest_reading.as_ref().map(|r| r.observed_at),
            uptime_seconds: (now - self.started_at).as_seconds_f64().max(0.0),
        }
    }

    pub fn readiness(&self) -> ReadinessReport {
        let snapshot = self.snapshot.borrow();

        let details = if !snapshot.running {
            Some("control loop is not running".to_string())
        } else if snapshot.authentication_failed {
            Some("device rejected the configured credentials".to_string())
        } else {
            None
        };

        ReadinessReport {
            ready: details.is_none(),
            running: snapshot.running,
            device: self.device.clone(),
            notifications_enabled: self.notifications_enabled,
            details,
        }
    }
}
