// tests/metrics.rs
//
// The Prometheus recorder is process-global, so this binary holds a single test.

use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use brand_news::news::proxy::{Reply, ScriptedTransport};
use brand_news::telemetry::Metrics;
use brand_news::{build_state, create_router, NewsConfig, SourceConfig};

#[tokio::test]
async fn metrics_endpoint_exposes_news_series() {
    let cfg = NewsConfig {
        cache_ttl_ms: 60_000,
        proxies: vec!["https://relay.test/?".into(), "https://relay-b.test/?".into()],
        sources: vec![SourceConfig::new("Test Auto", "https://feed.test/rss", true)],
        ..NewsConfig::default()
    };
    let metrics = Metrics::init(cfg.cache_ttl_ms).expect("recorder installs once");

    let transport = Arc::new(
        ScriptedTransport::new()
            .route("https://relay.test/", Reply::Status(500))
            .route(
                "https://relay-b.test/",
                Reply::Body(
                    "<rss><channel><item><title>Audi A3</title>\
                     <link>https://feed.test/a3</link></item></channel></rss>"
                        .into(),
                ),
            ),
    );
    let state = build_state(&cfg, transport).expect("state");
    let app = create_router(state).merge(metrics.router());

    for _ in 0..2 {
        let resp = app
            .clone()
            .oneshot(Request::get("/api/news").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for series in [
        "news_cache_ttl_ms 6",
        "news_fetch_cycles_total 1",
        "news_cache_hits_total 1",
        "news_proxy_failures_total 1",
        "news_items_total 1",
        "news_fetch_ms",
    ] {
        assert!(text.contains(series), "missing `{series}` in:\n{text}");
    }
}
