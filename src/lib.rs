// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod telemetry;

// RSS news pipeline: relay rotation, parsing, relevance, aggregation, rendering
pub mod news;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;

pub use crate::api::{create_router, AppState};
pub use crate::config::NewsConfig;
pub use crate::news::aggregator::{Aggregator, FeedStatus, NewsSnapshot};
pub use crate::news::types::{NewsError, NewsItem, SourceConfig};

use crate::news::proxy::{HttpTransport, ReqwestTransport};

/// Shared state over an explicit transport (tests pass a scripted one).
pub fn build_state(cfg: &NewsConfig, transport: Arc<dyn HttpTransport>) -> anyhow::Result<AppState> {
    let news = Aggregator::from_config(cfg, transport).context("building news aggregator")?;
    Ok(AppState {
        news: Arc::new(news),
        static_dir: PathBuf::from(&cfg.static_dir),
    })
}

/// Router wired to real relays over `reqwest`.
pub fn app(cfg: &NewsConfig) -> anyhow::Result<Router> {
    let transport = ReqwestTransport::new(&cfg.user_agent).context("building http client")?;
    let state = build_state(cfg, Arc::new(transport))?;
    Ok(create_router(state))
}
