use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::HeaderName, HeaderValue, StatusCode},
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::news::aggregator::{Aggregator, FeedStatus};
use crate::news::render;
use crate::news::types::NewsItem;

pub const CACHE_HEADER: &str = "x-news-cache";

/// Placeholders in `index.html` replaced by the server-rendered widget views.
pub const LOADING_MARKER: &str = "<!-- news:loading -->";
pub const ERROR_MARKER: &str = "<!-- news:error -->";

#[derive(Clone)]
pub struct AppState {
    pub news: Arc<Aggregator>,
    pub static_dir: PathBuf,
}

pub fn create_router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.static_dir);

    Router::new()
        .route("/", get(index_page))
        .route("/health", get(|| async { "OK" }))
        .route("/api/news", get(news_json))
        .route("/api/news/status", get(news_status))
        .route("/news", get(news_fragment))
        .fallback_service(static_files)
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct NewsResp {
    status: &'static str,
    items: Vec<NewsItem>,
}

fn cache_header(hit: bool) -> [(HeaderName, HeaderValue); 1] {
    let v = if hit { "HIT" } else { "MISS" };
    [(
        HeaderName::from_static(CACHE_HEADER),
        HeaderValue::from_static(v),
    )]
}

async fn news_json(State(state): State<AppState>) -> impl IntoResponse {
    let snap = state.news.fetch().await;
    let status = match snap.status() {
        FeedStatus::Failed => "failed",
        _ => "ready",
    };
    (
        cache_header(snap.cache_hit),
        Json(NewsResp {
            status,
            items: snap.items,
        }),
    )
}

async fn news_fragment(State(state): State<AppState>) -> impl IntoResponse {
    let snap = state.news.fetch().await;
    let html = render::render_status(&snap.status(), &snap.items, chrono::Utc::now());
    (cache_header(snap.cache_hit), Html(html))
}

async fn news_status(State(state): State<AppState>) -> Json<FeedStatus> {
    Json(state.news.status())
}

/// Site entry page with the loading view in place and the error view ready for the
/// client script.
async fn index_page(State(state): State<AppState>) -> impl IntoResponse {
    let path = state.static_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(page) => Html(
            page.replace(LOADING_MARKER, &render::render_loading())
                .replace(ERROR_MARKER, &render::render_error()),
        )
        .into_response(),
        Err(e) => {
            tracing::warn!(target: "news", path = %path.display(), error = %e, "index page missing");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}
