//! Prometheus exposition endpoint. Run counters and gauges are registered by
//! the components that emit them; this module only installs the recorder and
//! serves the rendered snapshot.

use axum::{routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder. Call once at startup, before
/// anything records.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("prometheus: install recorder")
}

/// Router serving `GET /metrics` in the Prometheus exposition format.
pub fn exposition_router(handle: PrometheusHandle) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let h = handle.clone();
            async move { h.render() }
        }),
    )
}
