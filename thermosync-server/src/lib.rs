use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;

use crate::app::{App, create_app};
use crate::configs::Settings;
use crate::control::{DrainOutcome, cancelled};

pub mod app;
pub mod configs;
pub mod control;
pub mod errors;
pub mod handles;
pub mod models;
pub mod repositories;
pub mod services;

pub async fn run(settings: &Arc<Settings>) -> anyhow::Result<()> {
    let app = create_app(settings).await?;

    let ip_addr = settings
        .server
        .host
        .parse::<IpAddr>()
        .with_context(|| format!("invalid server host {}", settings.server.host))?;

    let address = SocketAddr::from((ip_addr, settings.server.port));

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    tracing::info!("listening on {:?}", address);

    serve(
        app,
        listener,
        settings.control.drain_timeout(),
        shutdown_signal(),
    )
    .await
}

/// Serves `app` until `signal` resolves. The control loop and the open HTTP
/// connections are then drained, each within `drain_timeout`.
pub async fn serve(
    app: App,
    listener: TcpListener,
    drain_timeout: Duration,
    signal: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let App {
        router,
        control_task,
        shutdown,
        ..
    } = app;

    let mut http_shutdown = shutdown.subscribe();
    let mut server = tokio::spawn(
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { cancelled(&mut http_shutdown).await })
            .into_future(),
    );

    let exited_early = tokio::select! {
        _ = signal => None,
        result = &mut server => Some(result),
    };

    tracing::info!("shutdown requested, draining the control loop");
    shutdown.send_replace(true);

    match control_task.shutdown(drain_timeout).await {
        DrainOutcome::Drained => tracing::info!("control loop drained"),
        DrainOutcome::Aborted => tracing::warn!("control loop aborted after the drain timeout"),
    }

    let result = match exited_early {
        Some(result) => result,
        None => match tokio::time::timeout(drain_timeout, &mut server).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("http connections still open after the drain timeout");
                server.abort();
                return Ok(());
            }
        },
    };

    result
        .context("http server task failed")?
        .context("http server failed")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!("failed to listen for SIGTERM: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
