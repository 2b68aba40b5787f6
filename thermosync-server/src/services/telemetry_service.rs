use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use thermosync_api::HealthReport;
use tokio::sync::broadcast;

use super::TelemetrySink;
use crate::control::{ControlEvent, ControlSnapshot};
use crate::repositories::EventRepository;

#[derive(Debug, Default)]
pub struct TelemetryCounters {
    pub events: AtomicU64,
    pub cycles: AtomicU64,
    pub failures: AtomicU64,
    pub persist_failures: AtomicU64,
}

/// Fans control events out to the log, live subscribers and the event table.
pub struct TelemetryService {
    sender: broadcast::Sender<ControlEvent>,
    events: Option<EventRepository>,
    counters: TelemetryCounters,
}

impl TelemetryService {
    pub fn new(events: Option<EventRepository>, capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            events,
            counters: TelemetryCounters::default(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.sender.subscribe()
    }

    pub fn counters(&self) -> &TelemetryCounters {
        &self.counters
    }

    fn log(event: &ControlEvent) {
        match event {
            ControlEvent::Started {
                device,
                recovered_cooldown,
                ..
            } => tracing::info!(device = %device, recovered_cooldown, "control loop started"),
            ControlEvent::Cycle(report) => tracing::info!(
                cycle = report.cycle,
                duration_ms = report.duration_ms,
                ambient = ?report.reading.as_ref().map(|r| r.ambient),
                target = ?report.reading.as_ref().map(|r| r.target),
                adjustment = ?report.adjustment,
                notification = ?report.notification,
                errors = report.errors.len(),
                "cycle complete"
            ),
            ControlEvent::Adjustment(record) => tracing::info!(
                record_id = %record.id,
                previous_target = record.previous_target,
                new_target = record.new_target,
                "adjustment recorded"
            ),
            ControlEvent::Notification {
                record_id, outcome, ..
            } => tracing::debug!(record_id = %record_id, outcome = ?outcome, "notification outcome"),
            ControlEvent::Failure {
                operation, kind, ..
            } => tracing::debug!(operation = %operation, kind = %kind, "failure recorded"),
            ControlEvent::ThresholdAlert {
                consecutive_errors,
                delivered,
                ..
            } => tracing::warn!(consecutive_errors, delivered, "threshold alert raised"),
            ControlEvent::Stopped { cycles, .. } => tracing::info!(cycles, "control loop finished"),
        }
    }

    /// Prometheus text exposition of the current control state.
    pub fn render_metrics(&self, health: &HealthReport, snapshot: &ControlSnapshot) -> String {
        let mut out = String::new();
        let mut metric = |name: &str, kind: &str, help: &str, value: f64| {
            let _ = writeln!(out, "# HELP thermosync_{name} {help}");
            let _ = writeln!(out, "# TYPE thermosync_{name} {kind}");
            let _ = writeln!(out, "thermosync_{name} {value}");
        };

        metric("up", "gauge", "Whether the control loop is running", flag(health.running));
        metric(
            "healthy",
            "gauge",
            "Whether the service reports healthy",
            flag(health.status.is_healthy()),
        );
        metric("uptime_seconds", "gauge", "Seconds since start", health.uptime_seconds);
        metric("cycles_total", "counter", "Control cycles run", snapshot.cycles as f64);
        metric(
            "errors_total",
            "counter",
            "Failed operations",
            health.total_errors as f64,
        );
        metric(
            "consecutive_errors",
            "gauge",
            "Failed operations since the last clean cycle",
            f64::from(health.consecutive_errors),
        );
        metric(
            "adjustments_total",
            "counter",
            "Setpoint adjustments applied",
            health.adjustment_count as f64,
        );
        metric(
            "notifications_total",
            "counter",
            "Notifications delivered",
            health.notification_count as f64,
        );
        metric(
            "notifications_suppressed_total",
            "counter",
            "Adjustment notifications dropped by the rate limiter",
            health.notifications_suppressed as f64,
        );
        metric(
            "cooldown_remaining_seconds",
            "gauge",
            "Seconds until another adjustment is allowed",
            health.cooldown_remaining_seconds as f64,
        );
        metric(
            "events_total",
            "counter",
            "Telemetry events emitted",
            self.counters.events.load(Ordering::Relaxed) as f64,
        );
        metric(
            "event_persist_failures_total",
            "counter",
            "Telemetry events that could not be stored",
            self.counters.persist_failures.load(Ordering::Relaxed) as f64,
        );

        if let Some(reading) = &snapshot.latest_reading {
            metric("ambient_fahrenheit", "gauge", "Latest ambient temperature", reading.ambient);
            metric("target_fahrenheit", "gauge", "Latest setpoint", reading.target);
        }

        out
    }
}

fn flag(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

#[async_trait]
impl TelemetrySink for TelemetryService {
    async fn emit(&self, event: ControlEvent) {
        self.counters.events.fetch_add(1, Ordering::Relaxed);
        match &event {
            ControlEvent::Cycle(_) => {
                self.counters.cycles.fetch_add(1, Ordering::Relaxed);
            }
            ControlEvent::Failure { .. } => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }

        Self::log(&event);

        if let Some(events) = &self.events {
            let stored = match serde_json::to_value(&event) {
                Ok(payload) => events
                    .create(event.event_type(), &payload, time::OffsetDateTime::now_utc())
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };

            if let Err(error) = stored {
                self.counters.persist_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(event_type = event.event_type(), "could not store event: {error}");
            }
        }

        // No subscribers is fine
        let _ = self.sender.send(event);
    }
}
