//! Brand news service: binary entrypoint.
//! Boots the Axum HTTP server serving the static site and the news widget endpoints.

use anyhow::Context;
use brand_news::{telemetry::Metrics, NewsConfig};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default; JSON lines when NEWS_LOG_JSON=1.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("brand_news=info,news=info,proxy=info,warn"));

    let json = std::env::var("NEWS_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    // Shuttle may already have installed a subscriber; keep theirs in that case.
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = NewsConfig::load_default().context("loading news config")?;
    tracing::info!(
        brand = %cfg.brand,
        sources = cfg.sources.len(),
        proxies = cfg.proxies.len(),
        ttl_ms = cfg.cache_ttl_ms,
        static_dir = %cfg.static_dir,
        "news config loaded"
    );

    let mut router = brand_news::app(&cfg)?;
    match Metrics::init(cfg.cache_ttl_ms) {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(error = %e, "metrics disabled"),
    }

    Ok(router.into())
}
