use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use thermosync_api::AdjustmentRecord;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::*;
use crate::configs::{Control, ErrorCountMode, Notification, Retry, Settings};
use crate::errors::{GatewayError, RetryError};
use crate::services::{
    DeviceGateway, NotificationGateway, RestartStore, TelemetrySink, adjustment_message,
    threshold_alert_message,
};

/// External collaborators the control loop drives.
#[derive(Clone)]
pub struct Collaborators {
    pub device: Arc<dyn DeviceGateway>,
    pub notifier: Arc<dyn NotificationGateway>,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub store: Arc<dyn RestartStore>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Default)]
pub struct ControlSettings {
    pub control: Control,
    pub retry: Retry,
    pub notification: Notification,
}

impl From<&Settings> for ControlSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            control: settings.control.clone(),
            retry: settings.retry.clone(),
            notification: settings.notification.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RetryPolicies {
    read: RetryPolicy,
    write: RetryPolicy,
    notify: RetryPolicy,
}

/// How a shutdown request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    Drained,
    Aborted,
}

/// Owner side of a spawned control loop.
pub struct ControlTask {
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
    snapshot: Arc<watch::Sender<ControlSnapshot>>,
}

impl ControlTask {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops new cycles and waits up to `drain_timeout` for the one in flight.
    pub async fn shutdown(mut self, drain_timeout: Duration) -> DrainOutcome {
        self.shutdown.send_replace(true);

        match tokio::time::timeout(drain_timeout, &mut self.task).await {
            Ok(Ok(())) => DrainOutcome::Drained,
            Ok(Err(error)) => {
                tracing::error!("control loop task failed: {error}");
                self.snapshot.send_modify(|s| s.running = false);
                DrainOutcome::Aborted
            }
            Err(_) => {
                tracing::warn!(
                    drain_timeout_secs = drain_timeout.as_secs(),
                    "control cycle did not drain in time, aborting"
                );
                self.task.abort();
                self.snapshot.send_modify(|s| s.running = false);
                DrainOutcome::Aborted
            }
        }
    }
}

/// Spawns the control loop on the current runtime.
pub fn spawn_control_loop(
    collaborators: Collaborators,
    settings: ControlSettings,
) -> (ControlTask, ControlHandle) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (snapshot_tx, snapshot_rx) = watch::channel(ControlSnapshot::default());
    let snapshot = Arc::new(snapshot_tx);

    let handle = ControlHandle::new(
        snapshot_rx,
        collaborators.clock.clone(),
        settings.control.cooldown_period(),
        settings.control.degraded_watermark,
        collaborators.device.kind(),
        settings.notification.enabled,
    );

    let control_loop = ControlLoop::new(collaborators, settings, snapshot.clone(), shutdown_rx);
    let task = tokio::spawn(control_loop.run());

    (
        ControlTask {
            task,
            shutdown: shutdown_tx,
            snapshot,
        },
        handle,
    )
}

pub struct ControlLoop {
    collaborators: Collaborators,
    settings: ControlSettings,
    policies: RetryPolicies,
    rate_limit: RateLimitPolicy,
    threshold: ThresholdPolicy,
    retry: RetryExecutor,
    state: ControlState,
    snapshot: Arc<watch::Sender<ControlSnapshot>>,
    shutdown: watch::Receiver<bool>,
    cycles: u64,
}

impl ControlLoop {
    pub fn new(
        collaborators: Collaborators,
        settings: ControlSettings,
        snapshot: Arc<watch::Sender<ControlSnapshot>>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let policies = RetryPolicies {
            read: RetryPolicy::device_read(&settings.retry),
            write: RetryPolicy::device_write(&settings.retry),
            notify: RetryPolicy::notification(&settings.retry),
        };

        Self {
            rate_limit: RateLimitPolicy::from(&settings.notification),
            threshold: ThresholdPolicy::from(&settings.control),
            retry: RetryExecutor::new(shutdown.clone()),
            collaborators,
            settings,
            policies,
            state: ControlState::default(),
            snapshot,
            shutdown,
            cycles: 0,
        }
    }

    pub async fn run(mut self) {
        self.recover_state().await;

        let mut interval = tokio::time::interval(self.settings.control.polling_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = self.shutdown.clone();

        loop {
            let stop = tokio::select! {
                biased;
                _ = cancelled(&mut shutdown) => true,
                _ = interval.tick() => false,
            };
            if stop {
                break;
            }

            self.run_cycle_guarded().await;
        }

        self.snapshot.send_modify(|s| s.running = false);
        tracing::info!(cycles = self.cycles, "control loop stopped");
        self.collaborators
            .telemetry
            .emit(ControlEvent::Stopped {
                cycles: self.cycles,
                at: self.collaborators.clock.now(),
            })
            .await;
    }

    /// Rebuilds the control state from the restart store before the first cycle.
    async fn recover_state(&mut self) {
        let store = self.collaborators.store.clone();
        let device = self.collaborators.device.clone();

        let persisted = match store.load().await {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!("could not load the last adjustment: {error}");
                None
            }
        };

        let current_target = match &persisted {
            Some(_) => match self
                .retry
                .execute("read_temperature", &self.policies.read, || {
                    device.read_temperature()
                })
                .await
            {
                Ok(reading) => {
                    let target = reading.target;
                    self.snapshot.send_modify(|s| s.push_reading(reading));
                    Some(target)
                }
                Err(error) => {
                    tracing::warn!("device unreadable during recovery: {error}");
                    None
                }
            },
            None => None,
        };

        self.state = recover(persisted.as_ref(), current_target);
        let recovered = self.state.last_adjustment_at.is_some();

        if let Some(record) = persisted.as_ref() {
            if recovered {
                tracing::info!(
                    record_id = %record.id,
                    target = record.new_target,
                    "resuming cooldown from persisted adjustment"
                );
            } else {
                tracing::info!(
                    record_id = %record.id,
                    persisted_target = record.new_target,
                    current_target = ?current_target,
                    "device setpoint changed since the last adjustment, starting fresh"
                );
            }
        }

        let history = match store.recent(ADJUSTMENT_HISTORY_LIMIT).await {
            Ok(history) => history,
            Err(error) => {
                tracing::warn!("could not load adjustment history: {error}");
                Vec::new()
            }
        };

        self.snapshot.send_modify(|s| {
            s.adjustments = history.into_iter().collect();
            s.running = true;
            s.sync_state(&self.state);
        });

        self.collaborators
            .telemetry
            .emit(ControlEvent::Started {
                device: device.kind().to_string(),
                recovered_cooldown: recovered,
                at: self.collaborators.clock.now(),
            })
            .await;
    }

    /// Runs one cycle, turning a panic into a recorded failure.
    async fn run_cycle_guarded(&mut self) {
        self.cycles += 1;
        let started = Instant::now();
        let mut report = CycleReport::new(self.cycles, self.collaborators.clock.now());

        let result = AssertUnwindSafe(self.run_cycle(&mut report))
            .catch_unwind()
            .await;

        if let Err(panic) = result {
            let message = format!("cycle panicked: {}", panic_message(panic.as_ref()));
            self.register_failure("cycle", "panic", message, &mut report)
                .await;
        }

        if report.is_success() {
            record_outcome(&mut self.state, Outcome::Success, &self.threshold);
        }

        report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.publish();
        self.collaborators
            .telemetry
            .emit(ControlEvent::Cycle(report))
            .await;
    }

    async fn run_cycle(&mut self, report: &mut CycleReport) {
        let device = self.collaborators.device.clone();
        let control = &self.settings.control;
        let (threshold, step, cooldown) = (
            control.temperature_threshold,
            control.temperature_adjustment,
            control.cooldown_period(),
        );

        let reading = match self
            .retry
            .execute("read_temperature", &self.policies.read, || {
                device.read_temperature()
            })
            .await
        {
            Ok(reading) => reading,
            Err(error) => {
                self.record_failure("read_temperature", &error, report).await;
                return;
            }
        };

        self.state.authentication_failed = false;
        tracing::debug!(
            ambient = reading.ambient,
            target = reading.target,
            device_id = %reading.device_id,
            "reading taken"
        );
        self.snapshot
            .send_modify(|s| s.push_reading(reading.clone()));
        report.reading = Some(reading.clone());

        let now = self.collaborators.clock.now();
        if is_in_cooldown(self.state.last_adjustment_at, now, cooldown) {
            let remaining_seconds = cooldown_remaining(self.state.last_adjustment_at, now, cooldown);
            tracing::debug!(remaining_seconds, "in cooldown, adjustment skipped");
            report.adjustment = AdjustmentOutcome::Cooldown { remaining_seconds };
            return;
        }

        let decision = decide(&reading, threshold, step);
        report.decision = Some(decision.clone());
        if !decision.should_adjust {
            report.adjustment = AdjustmentOutcome::NotNeeded;
            return;
        }

        let new_target = decision.new_target;
        if let Err(error) = self
            .retry
            .execute("write_target", &self.policies.write, || {
                device.write_target(new_target)
            })
            .await
        {
            report.adjustment = AdjustmentOutcome::Failed {
                error: error.to_string(),
            };
            self.record_failure("write_target", &error, report).await;
            return;
        }

        // No suspension point between the acknowledged write and the watermark.
        let applied_at = self.collaborators.clock.now();
        record_adjustment(&mut self.state, applied_at, new_target);
        let record = AdjustmentRecord::new(
            reading.device_id.clone(),
            reading.target,
            new_target,
            reading.ambient,
            decision.reason,
            applied_at,
        );
        report.adjustment = AdjustmentOutcome::Applied {
            record_id: record.id,
        };

        tracing::info!(
            record_id = %record.id,
            previous_target = record.previous_target,
            new_target = record.new_target,
            ambient = record.ambient_at_adjustment,
            "setpoint lowered"
        );

        self.snapshot.send_modify(|s| {
            s.adjustment_count += 1;
            s.push_adjustment(record.clone());
            s.sync_state(&self.state);
        });
        self.persist(&record).await;
        self.collaborators
            .telemetry
            .emit(ControlEvent::Adjustment(record.clone()))
            .await;

        let outcome = self.notify_adjustment(&record, report).await;
        if outcome.is_sent() {
            self.persist(&record.with_notified(true)).await;
            self.snapshot.send_modify(|s| {
                if let Some(existing) = s.adjustments.iter_mut().find(|r| r.id == record.id) {
                    existing.notified = true;
                }
            });
        }

        self.collaborators
            .telemetry
            .emit(ControlEvent::Notification {
                record_id: record.id,
                outcome: outcome.clone(),
                at: self.collaborators.clock.now(),
            })
            .await;
        report.notification = Some(outcome);
    }

    async fn notify_adjustment(
        &mut self,
        record: &AdjustmentRecord,
        report: &mut CycleReport,
    ) -> NotificationOutcome {
        if !self.settings.notification.enabled {
            return NotificationOutcome::Disabled;
        }

        let now = self.collaborators.clock.now();
        if !self.state.notifications.allow(now, &self.rate_limit) {
            tracing::info!(
                suppressed = self.state.notifications.suppressed,
                "adjustment notification rate limited"
            );
            return NotificationOutcome::RateLimited;
        }

        let notifier = self.collaborators.notifier.clone();
        let message = adjustment_message(record);

        match self
            .retry
            .execute("send_notification", &self.policies.notify, || {
                notifier.send(&message)
            })
            .await
        {
            Ok(()) => {
                self.snapshot.send_modify(|s| s.notification_count += 1);
                NotificationOutcome::Sent
            }
            Err(error) => {
                let outcome = NotificationOutcome::Failed {
                    error: error.to_string(),
                };
                self.record_failure("send_notification", &error, report)
                    .await;
                outcome
            }
        }
    }

    async fn record_failure(
        &mut self,
        operation: &'static str,
        error: &RetryError,
        report: &mut CycleReport,
    ) {
        if error.is_cancelled() {
            tracing::debug!(operation, "abandoned for shutdown");
            report.cancelled = true;
            return;
        }

        if error.is_authentication() {
            self.state.authentication_failed = true;
        }

        let kind = error.last_error().map_or("unknown", GatewayError::kind);
        self.register_failure(operation, kind, error.to_string(), report)
            .await;
    }

    async fn register_failure(
        &mut self,
        operation: &'static str,
        kind: &'static str,
        message: String,
        report: &mut CycleReport,
    ) {
        let at = self.collaborators.clock.now();
        let message = format!("{operation}: {message}");
        let action = record_outcome(
            &mut self.state,
            Outcome::Failure { at, error: &message },
            &self.threshold,
        );

        tracing::error!(
            operation,
            kind,
            consecutive_errors = self.state.consecutive_errors,
            total_errors = self.state.total_errors,
            "{message}"
        );

        report.errors.push(message.clone());
        self.publish();
        self.collaborators
            .telemetry
            .emit(ControlEvent::Failure {
                operation: operation.to_string(),
                kind: kind.to_string(),
                message,
                consecutive_errors: self.state.consecutive_errors,
                at,
            })
            .await;

        if action == AlertAction::FireAlert {
            self.send_threshold_alert(at).await;
        }
    }

    /// Bypasses the rate limiter. A failed delivery is only logged.
    async fn send_threshold_alert(&mut self, at: OffsetDateTime) {
        let count = match self.threshold.mode {
            ErrorCountMode::Consecutive => u64::from(self.state.consecutive_errors),
            ErrorCountMode::Cumulative => self.state.total_errors,
        };
        let last_error = self.state.last_error.clone().unwrap_or_default();
        let message = threshold_alert_message(count, self.threshold.threshold, &last_error);

        tracing::warn!(
            count,
            threshold = self.threshold.threshold,
            "error threshold reached"
        );

        let delivered = if self.settings.notification.enabled {
            let notifier = self.collaborators.notifier.clone();
            match self
                .retry
                .execute("send_threshold_alert", &self.policies.notify, || {
                    notifier.send(&message)
                })
                .await
            {
                Ok(()) => {
                    self.snapshot.send_modify(|s| s.notification_count += 1);
                    true
                }
                Err(error) => {
                    tracing::error!("threshold alert was not delivered: {error}");
                    false
                }
            }
        } else {
            tracing::warn!("notifications are disabled, threshold alert not sent");
            false
        };

        self.collaborators
            .telemetry
            .emit(ControlEvent::ThresholdAlert {
                consecutive_errors: self.state.consecutive_errors,
                total_errors: self.state.total_errors,
                delivered,
                at,
            })
            .await;
    }

    async fn persist(&self, record: &AdjustmentRecord) {
        if let Err(error) = self.collaborators.store.save(record).await {
            tracing::error!(record_id = %record.id, "could not persist adjustment: {error}");
        }
    }

    fn publish(&self) {
        self.snapshot.send_modify(|s| {
            s.cycles = self.cycles;
            s.sync_state(&self.state);
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
