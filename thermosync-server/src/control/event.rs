use serde::Serialize;
use thermosync_api::{AdjustmentRecord, Reading};
use time::OffsetDateTime;
use uuid::Uuid;

use super::AdjustmentDecision;

/// What happened to the adjustment path in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdjustmentOutcome {
    /// No reading was available
    Skipped,
    NotNeeded,
    Cooldown { remaining_seconds: u64 },
    Applied { record_id: Uuid },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotificationOutcome {
    Sent,
    Disabled,
    RateLimited,
    Failed { error: String },
}

impl NotificationOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, NotificationOutcome::Sent)
    }
}

/// Structured summary of one control cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    pub duration_ms: u64,
    pub reading: Option<Reading>,
    pub decision: Option<AdjustmentDecision>,
    pub adjustment: AdjustmentOutcome,
    pub notification: Option<NotificationOutcome>,
    pub errors: Vec<String>,
    pub cancelled: bool,
}

impl CycleReport {
    pub fn new(cycle: u64, started_at: OffsetDateTime) -> Self {
        Self {
            cycle,
            started_at,
            duration_ms: 0,
            reading: None,
            decision: None,
            adjustment: AdjustmentOutcome::Skipped,
            notification: None,
            errors: Vec::new(),
            cancelled: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && !self.cancelled
    }
}

/// Everything the control loop reports to the telemetry sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlEvent {
    Started {
        device: String,
        recovered_cooldown: bool,
        #[serde(with = "time::serde::rfc3339")]
        at: OffsetDateTime,
    },
    Cycle(CycleReport),
    Adjustment(AdjustmentRecord),
    Notification {
        record_id: Uuid,
        outcome: NotificationOutcome,
        #[serde(with = "time::serde::rfc3339")]
        at: OffsetDateTime,
    },
    Failure {
        operation: String,
        kind: String,
        message: String,
        consecutive_errors: u32,
        #[serde(with = "time::serde::rfc3339")]
        at: OffsetDateTime,
    },
    ThresholdAlert {
        consecutive_errors: u32,
        total_errors: u64,
        delivered: bool,
        #[serde(with = "time::serde::rfc3339")]
        at: OffsetDateTime,
    },
    Stopped {
        cycles: u64,
        #[serde(with = "time::serde::rfc3339")]
        at: OffsetDateTime,
    },
}

impl ControlEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ControlEvent::Started { .. } => "started",
            ControlEvent::Cycle(_) => "cycle",
            ControlEvent::Adjustment(_) => "adjustment",
            ControlEvent::Notification { .. } => "notification",
            ControlEvent::Failure { .. } => "failure",
            ControlEvent::ThresholdAlert { .. } => "threshold_alert",
            ControlEvent::Stopped { .. } => "stopped",
        }
    }
}
