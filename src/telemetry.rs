// src/telemetry.rs
//! Prometheus exposition for the news pipeline counters.

use axum::{routing::get, Router};
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide recorder. Fails if one is already installed.
    ///
    /// `news_cache_ttl_ms` is published once so dashboards can relate hit rates to the
    /// configured cache window.
    pub fn init(cache_ttl_ms: u64) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("installing prometheus recorder: {e}"))?;

        gauge!("news_cache_ttl_ms").set(cache_ttl_ms as f64);

        Ok(Self { handle })
    }

    /// `GET /metrics`, merged into the app router by the binary.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        )
    }
}
