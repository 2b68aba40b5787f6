use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use thermosync_api::{AdjustmentRecord, Fahrenheit, Reading};
use time::OffsetDateTime;
use time::macros::datetime;
use tokio::sync::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;

use thermosync_server::app::create_router;
use thermosync_server::configs::{Control, Notification, Retry};
use thermosync_server::control::{
    Clock, Collaborators, ControlEvent, ControlHandle, ControlSettings, ControlSnapshot,
    ControlTask, CycleReport, MonotonicClock, spawn_control_loop,
};
use thermosync_server::errors::{GatewayError, StoreError};
use thermosync_server::services::{
    DeviceGateway, NotificationGateway, RestartStore, TelemetryService,
};

pub const START: OffsetDateTime = datetime!(2026-01-05 10:00 UTC);

#[derive(Debug, Default)]
pub struct FakeDeviceState {
    pub ambient: Fahrenheit,
    pub target: Fahrenheit,
    pub read_failures: VecDeque<GatewayError>,
    pub write_failures: VecDeque<GatewayError>,
    pub reads: u32,
    pub writes: Vec<Fahrenheit>,
    pub panic_on_read: bool,
    pub write_delay: Option<Duration>,
}

/// Thermostat whose readings and failures are scripted by the test.
#[derive(Debug)]
pub struct FakeDevice {
    clock: Arc<dyn Clock>,
    pub state: Mutex<FakeDeviceState>,
}

impl FakeDevice {
    pub fn new(clock: Arc<dyn Clock>, ambient: Fahrenheit, target: Fahrenheit) -> Self {
        Self {
            clock,
            state: Mutex::new(FakeDeviceState {
                ambient,
                target,
                ..FakeDeviceState::default()
            }),
        }
    }

    pub async fn set(&self, ambient: Fahrenheit, target: Fahrenheit) {
        let mut state = self.state.lock().await;
        state.ambient = ambient;
        state.target = target;
    }

    pub async fn fail_reads(&self, errors: impl IntoIterator<Item = GatewayError>) {
        self.state.lock().await.read_failures.extend(errors);
    }

    pub async fn fail_writes(&self, errors: impl IntoIterator<Item = GatewayError>) {
        self.state.lock().await.write_failures.extend(errors);
    }

    pub async fn panic_next_read(&self) {
        self.state.lock().await.panic_on_read = true;
    }

    pub async fn delay_writes(&self, delay: Duration) {
        self.state.lock().await.write_delay = Some(delay);
    }

    pub async fn reads(&self) -> u32 {
        self.state.lock().await.reads
    }

    pub async fn writes(&self) -> Vec<Fahrenheit> {
        self.state.lock().await.writes.clone()
    }
}

#[async_trait]
impl DeviceGateway for FakeDevice {
    fn kind(&self) -> &'static str {
        "fake"
    }

    async fn read_temperature(&self) -> Result<Reading, GatewayError> {
        let mut state = self.state.lock().await;
        state.reads += 1;

        if state.panic_on_read {
            state.panic_on_read = false;
            drop(state);
            panic!("sensor driver bug");
        }

        if let Some(error) = state.read_failures.pop_front() {
            return Err(error);
        }

        Ok(Reading {
            ambient: state.ambient,
            target: state.target,
            device_id: "fake-thermostat".to_string(),
            observed_at: self.clock.now(),
            humidity: Some(45.0),
            mode: Some("COOL".to_string()),
        })
    }

    async fn write_target(&self, target: Fahrenheit) -> Result<(), GatewayError> {
        let delay = self.state.lock().await.write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        if let Some(error) = state.write_failures.pop_front() {
            return Err(error);
        }

        state.target = target;
        state.writes.push(target);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakeNotifier {
    pub messages: Mutex<Vec<String>>,
    pub failures: Mutex<VecDeque<GatewayError>>,
}

impl FakeNotifier {
    pub async fn messages(&self) -> Vec<String> {
        self.messages.lock().await.clone()
    }

    pub async fn alerts(&self) -> usize {
        self.messages
            .lock()
            .await
            .iter()
            .filter(|m| m.starts_with("ALERT"))
            .count()
    }

    pub async fn fail(&self, errors: impl IntoIterator<Item = GatewayError>) {
        self.failures.lock().await.extend(errors);
    }
}

#[async_trait]
impl NotificationGateway for FakeNotifier {
    async fn send(&self, message: &str) -> Result<(), GatewayError> {
        if let Some(error) = self.failures.lock().await.pop_front() {
            return Err(error);
        }

        self.messages.lock().await.push(message.to_string());
        Ok(())
    }
}

/// Restart store kept in memory so paused-time tests never wait on I/O.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub records: Mutex<Vec<AdjustmentRecord>>,
}

impl MemoryStore {
    pub async fn all(&self) -> Vec<AdjustmentRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl RestartStore for MemoryStore {
    async fn load(&self) -> Result<Option<AdjustmentRecord>, StoreError> {
        Ok(self.recent(1).await?.into_iter().next())
    }

    async fn save(&self, record: &AdjustmentRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<AdjustmentRecord>, StoreError> {
        let mut records = self.records.lock().await.clone();
        records.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        records.truncate(limit);
        Ok(records)
    }
}

pub struct MockApp {
    pub clock: Arc<MonotonicClock>,
    pub device: Arc<FakeDevice>,
    pub notifier: Arc<FakeNotifier>,
    pub store: Arc<MemoryStore>,
    pub telemetry: Arc<TelemetryService>,
    pub shutdown: watch::Sender<bool>,
}

impl MockApp {
    /// A thermostat reading 71°F against a 75°F setpoint.
    pub fn new() -> Self {
        Self::with_reading(71.0, 75.0)
    }

    pub fn with_reading(ambient: Fahrenheit, target: Fahrenheit) -> Self {
        let clock = Arc::new(MonotonicClock::starting_at(START));

        Self {
            device: Arc::new(FakeDevice::new(clock.clone(), ambient, target)),
            clock,
            notifier: Arc::new(FakeNotifier::default()),
            store: Arc::new(MemoryStore::default()),
            telemetry: Arc::new(TelemetryService::new(None, 1024)),
            shutdown: watch::channel(false).0,
        }
    }

    pub fn settings() -> ControlSettings {
        ControlSettings {
            control: Control::default(),
            retry: Retry::default(),
            notification: Notification::default(),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            device: self.device.clone(),
            notifier: self.notifier.clone(),
            telemetry: self.telemetry.clone(),
            store: self.store.clone(),
            clock: self.clock.clone(),
        }
    }

    pub fn events(&self) -> broadcast::Receiver<ControlEvent> {
        self.telemetry.subscribe()
    }

    pub fn spawn(&self, settings: ControlSettings) -> (ControlTask, ControlHandle) {
        spawn_control_loop(self.collaborators(), settings)
    }

    /// Handle over a loop that never started.
    pub fn idle_handle(&self) -> ControlHandle {
        let (_sender, receiver) = watch::channel(ControlSnapshot::default());
        ControlHandle::new(
            receiver,
            self.clock.clone(),
            Duration::from_secs(1800),
            3,
            "fake",
            true,
        )
    }

    pub fn router(&self, handle: ControlHandle) -> Router {
        create_router(handle, self.telemetry.clone(), self.shutdown.subscribe())
    }
}

/// Waits for the next completed cycle.
pub async fn next_cycle(events: &mut broadcast::Receiver<ControlEvent>) -> CycleReport {
    loop {
        match events.recv().await {
            Ok(ControlEvent::Cycle(report)) => return report,
            Ok(_) | Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => panic!("telemetry channel closed"),
        }
    }
}

pub async fn skip_cycles(events: &mut broadcast::Receiver<ControlEvent>, count: usize) -> Vec<CycleReport> {
    let mut reports = Vec::with_capacity(count);
    for _ in 0..count {
        reports.push(next_cycle(events).await);
    }
    reports
}
