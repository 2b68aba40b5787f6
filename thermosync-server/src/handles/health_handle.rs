use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::control::ControlHandle;
use crate::services::TelemetryService;

#[derive(Clone)]
pub struct HealthState {
    pub control: ControlHandle,
    pub telemetry: Arc<TelemetryService>,
}

pub fn health_router(health_state: HealthState) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(get_health))
        .route("/ready", get(get_readiness))
        .route("/metrics", get(get_metrics))
        .with_state(health_state)
}

pub async fn service_info() -> impl IntoResponse {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/health", "/ready", "/metrics", "/readings", "/readings/latest", "/adjustments", "/events"]
    }))
}

/// 200 when healthy, 503 when degraded. The body is the same report either way.
pub async fn get_health(State(state): State<HealthState>) -> impl IntoResponse {
    let report = state.control.health();
    let status = if report.status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(report))
}

pub async fn get_readiness(State(state): State<HealthState>) -> impl IntoResponse {
    let report = state.control.readiness();
    let status = if report.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(report))
}

pub async fn get_metrics(State(state): State<HealthState>) -> impl IntoResponse {
    let body = state
        .telemetry
        .render_metrics(&state.control.health(), &state.control.snapshot());

    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
