use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::configs::{Device, SchemaManager, Settings, Storage};
use crate::control::{
    Clock, Collaborators, ControlHandle, ControlSettings, ControlTask, MonotonicClock,
    spawn_control_loop,
};
use crate::handles::*;
use crate::repositories::{AdjustmentRepository, EventRepository};
use crate::services::{
    DeviceGateway, LogNotifier, NestCredentials, NestGateway, NotificationGateway,
    SimulatedThermostat, TelemetryService, WebhookNotifier,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A started service: the query router plus the running control loop.
pub struct App {
    pub router: Router,
    pub control_task: ControlTask,
    pub control: ControlHandle,
    pub telemetry: Arc<TelemetryService>,
    /// Flipped to `true` to close long-lived HTTP streams.
    pub shutdown: watch::Sender<bool>,
}

pub async fn create_app(settings: &Arc<Settings>) -> anyhow::Result<App> {
    let storage = Arc::new(
        Storage::new(settings.database.clone(), SchemaManager::default())
            .await
            .context("failed to open the database")?,
    );

    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let device = create_device(settings, clock.clone())?;
    let notifier = create_notifier(settings)?;
    let telemetry = Arc::new(TelemetryService::new(
        Some(EventRepository::new(storage.clone())),
        EVENT_CHANNEL_CAPACITY,
    ));

    let (control_task, control) = spawn_control_loop(
        Collaborators {
            device,
            notifier,
            telemetry: telemetry.clone(),
            store: Arc::new(AdjustmentRepository::new(storage.clone())),
            clock,
        },
        ControlSettings::from(settings.as_ref()),
    );

    let (shutdown, shutdown_rx) = watch::channel(false);

    Ok(App {
        router: create_router(control.clone(), telemetry.clone(), shutdown_rx),
        control_task,
        control,
        telemetry,
        shutdown,
    })
}

pub fn create_router(
    control: ControlHandle,
    telemetry: Arc<TelemetryService>,
    shutdown: watch::Receiver<bool>,
) -> Router {
    Router::new()
        .merge(health_router(HealthState {
            control: control.clone(),
            telemetry: telemetry.clone(),
        }))
        .merge(event_router(EventState {
            telemetry,
            shutdown,
        }))
        .merge(reading_router(ReadingState {
            control: control.clone(),
        }))
        .merge(adjustment_router(AdjustmentState { control }))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

fn create_device(
    settings: &Settings,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<Arc<dyn DeviceGateway>> {
    let timeout = Duration::from_secs(settings.retry.attempt_timeout_secs);

    let device: Arc<dyn DeviceGateway> = match &settings.device {
        Device::Simulated {
            device_id,
            initial_target,
        } => Arc::new(SimulatedThermostat::new(
            device_id.clone(),
            *initial_target,
            clock,
        )),
        Device::Nest {
            client_id,
            client_secret,
            refresh_token,
            project_id,
        } => Arc::new(
            NestGateway::new(
                NestCredentials {
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                    refresh_token: refresh_token.clone(),
                    project_id: project_id.clone(),
                },
                timeout,
            )
            .context("failed to create the nest client")?,
        ),
    };

    Ok(device)
}

fn create_notifier(settings: &Settings) -> anyhow::Result<Arc<dyn NotificationGateway>> {
    let notification = &settings.notification;

    match (&notification.webhook_url, &notification.recipient) {
        (Some(url), Some(recipient)) => Ok(Arc::new(
            WebhookNotifier::new(
                url.clone(),
                recipient.clone(),
                Duration::from_secs(settings.retry.attempt_timeout_secs),
            )
            .context("failed to create the webhook notifier")?,
        )),
        _ => {
            if notification.enabled {
                tracing::info!("no notification webhook configured, notifications go to the log");
            }
            Ok(Arc::new(LogNotifier))
        }
    }
}
