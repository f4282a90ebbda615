//! The thin HTTP surface. Contains no core logic: `/healthz`, `/metrics`,
//! and `/trigger` are glue around `CycleCoordinator`, shaped like
//! `otlp2parquet-runtime::server`'s `health_check`/`ready_check` routes.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use locus_pipeline::{CycleCoordinator, CycleOutcome};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::sync::Arc;

#[derive(Clone)]
struct AppState {
    coordinator: Arc<CycleCoordinator>,
    metrics_handle: PrometheusHandle,
}

pub fn router(coordinator: Arc<CycleCoordinator>, metrics_handle: PrometheusHandle) -> Router {
    let state = AppState {
        coordinator,
        metrics_handle,
    };

    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/trigger", axum::routing::post(trigger))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics_handle.render()
}

/// Manually fires one cycle, outside the scheduler's cadence. Useful for
/// operator-triggered drains and integration testing against a live process.
async fn trigger(State(state): State<AppState>) -> impl IntoResponse {
    match state.coordinator.run_cycle().await {
        CycleOutcome::Completed(result) => (
            StatusCode::OK,
            Json(json!({"status": "completed", "cycle_id": result.cycle_id})),
        ),
        CycleOutcome::SkippedBusy => (
            StatusCode::CONFLICT,
            Json(json!({"status": "skipped_busy"})),
        ),
        CycleOutcome::ReplayFatal(reason) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"status": "replay_fatal", "reason": reason})),
        ),
    }
}
