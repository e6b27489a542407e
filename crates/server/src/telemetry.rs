//! Prometheus recorder and `/metrics` endpoint.
//!
//! Installs a process-wide `metrics` recorder; the pipeline crate emits
//! counters/histograms directly through the `metrics` facade (segments
//! produced/synthesized/skipped, gate-open latency), this module only owns
//! the recorder and renders it at `/metrics`.

use std::sync::OnceLock;

use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::state::AppState;

static RECORDER: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the process-wide Prometheus recorder, or return the existing
/// handle if already installed. Idempotent so tests in the same binary can
/// each build an `AppState` without racing to install the global recorder.
pub fn init_metrics() -> PrometheusHandle {
    RECORDER
        .get_or_init(|| PrometheusBuilder::new().install_recorder().expect("failed to install Prometheus recorder"))
        .clone()
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics_handle.render()
}
