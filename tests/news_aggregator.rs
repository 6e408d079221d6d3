// tests/news_aggregator.rs
//
// Aggregation cycle against a scripted relay transport (no sockets).
//
// Covered:
// - cache hit within TTL issues zero requests and returns identical items
// - re-fetch after TTL expiry
// - relay rotation remembered across independent calls
// - all relays failing -> ProxyExhausted, zero items, Failed state
// - cross-source title dedupe, relevance filter only on flagged sources
// - early stop once enough items accumulated
// - empty result refreshes the TTL
// - concurrent callers share one fetch cycle

use std::sync::Arc;
use std::time::Duration;

use brand_news::news::cache::NewsCache;
use brand_news::news::proxy::{build_proxy_url, ProxyRotator, Reply, ScriptedTransport};
use brand_news::news::relevance::RelevanceFilter;
use brand_news::{Aggregator, FeedStatus, NewsError, SourceConfig};

const P0: &str = "https://relay-0.test/raw?url=";
const P1: &str = "https://relay-1.test/?";
const P2: &str = "https://relay-2.test/proxy?quest=";
const P3: &str = "https://relay-3.test/fetch/";
const PROXIES: [&str; 4] = [P0, P1, P2, P3];

const IDNES: &str = "https://www.idnes.cz/rss/auto.xml";
const AUTO_CZ: &str = "https://www.auto.cz/rss";
const MEDIA: &str = "https://media.test/feed.atom";

const TTL: Duration = Duration::from_secs(300);

fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{name}"))
        .unwrap_or_else(|_| panic!("missing tests/fixtures/{name}"))
}

fn rss(items: &[(&str, &str)]) -> String {
    let mut s = String::from("<rss><channel>");
    for (title, link) in items {
        s.push_str(&format!(
            "<item><title>{title}</title><link>{link}</link></item>"
        ));
    }
    s.push_str("</channel></rss>");
    s
}

fn aggregator(
    transport: Arc<ScriptedTransport>,
    sources: Vec<SourceConfig>,
    max_items: usize,
) -> Aggregator {
    let rotator = ProxyRotator::new(PROXIES.iter().map(|p| p.to_string()).collect(), transport);
    Aggregator::new(
        sources,
        rotator,
        RelevanceFilter::new("Audi").unwrap(),
        max_items,
        NewsCache::new(TTL),
    )
}

fn idnes() -> SourceConfig {
    SourceConfig::new("iDNES Auto", IDNES, true)
}

fn auto_cz() -> SourceConfig {
    SourceConfig::new("Auto.cz", AUTO_CZ, true)
}

fn media() -> SourceConfig {
    SourceConfig::new("Audi Media", MEDIA, false)
}

#[tokio::test(start_paused = true)]
async fn second_call_within_ttl_is_served_from_cache() {
    let t = Arc::new(
        ScriptedTransport::new().route(
            build_proxy_url(P0, IDNES),
            Reply::Body(fixture("idnes_auto.xml")),
        ),
    );
    let agg = aggregator(t.clone(), vec![idnes()], 6);

    let first = agg.fetch().await;
    assert!(!first.cache_hit);
    assert!(!first.items.is_empty());
    let calls_after_first = t.call_count();

    tokio::time::advance(Duration::from_secs(299)).await;
    let second = agg.fetch().await;
    assert!(second.cache_hit);
    assert_eq!(t.call_count(), calls_after_first, "no network on cache hit");
    assert_eq!(second.items, first.items);
}

#[tokio::test(start_paused = true)]
async fn call_after_ttl_triggers_fresh_fetch() {
    let t = Arc::new(
        ScriptedTransport::new().route(
            build_proxy_url(P0, IDNES),
            Reply::Body(fixture("idnes_auto.xml")),
        ),
    );
    let agg = aggregator(t.clone(), vec![idnes()], 6);

    let first = agg.get_news().await;
    assert!(!first.is_empty());
    let calls_after_first = t.call_count();

    tokio::time::advance(TTL + Duration::from_millis(1)).await;
    let again = agg.fetch().await;
    assert!(!again.cache_hit);
    assert!(t.call_count() > calls_after_first);
}

#[tokio::test]
async fn rotation_starts_from_last_successful_relay() {
    let t = Arc::new(
        ScriptedTransport::new()
            .route(P0, Reply::Status(500))
            .route(P1, Reply::Body(rss(&[("Audi A4", "https://a.test/a4")])))
            .route(P2, Reply::Body(rss(&[("Audi A5", "https://a.test/a5")]))),
    );
    let agg = aggregator(t.clone(), vec![idnes()], 6);

    let first = agg.get_news().await;
    assert_eq!(first.len(), 1);
    assert_eq!(agg.rotator().last_successful_index(), 1);
    let calls = t.calls();
    assert!(calls[0].starts_with(P0));
    assert!(calls[1].starts_with(P1));

    // next independent fetch tries relay 1 first
    let body = agg.rotator().fetch_via_proxy(AUTO_CZ).await.unwrap();
    assert!(body.contains("Audi A4"));
    let calls = t.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[2].starts_with(P1));
}

#[tokio::test]
async fn all_relays_500_means_exhausted_and_failed_state() {
    let mut t = ScriptedTransport::new();
    for p in PROXIES {
        t = t.route(p, Reply::Status(500));
    }
    let t = Arc::new(t);
    let agg = aggregator(t.clone(), vec![idnes()], 6);

    let err = agg.rotator().fetch_via_proxy(IDNES).await.unwrap_err();
    assert!(matches!(err, NewsError::ProxyExhausted { attempts: 4, .. }));
    assert_eq!(t.call_count(), 4);

    let mut rx = agg.subscribe();
    let snap = agg.fetch().await;
    assert!(snap.items.is_empty());
    assert!(snap.is_total_failure());
    assert_eq!(agg.status(), FeedStatus::Failed);
    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), FeedStatus::Failed);
}

#[tokio::test]
async fn duplicate_titles_across_sources_collapse() {
    let t = Arc::new(
        ScriptedTransport::new()
            .route(
                build_proxy_url(P0, IDNES),
                Reply::Body(rss(&[("Nový Audi A6", "https://idnes.test/a6")])),
            )
            .route(
                build_proxy_url(P0, AUTO_CZ),
                Reply::Body(rss(&[("nový  AUDI a6 ", "https://auto.test/a6")])),
            ),
    );
    let agg = aggregator(t, vec![idnes(), auto_cz()], 6);

    let items = agg.get_news().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].link, "https://idnes.test/a6", "first occurrence wins");
}

#[tokio::test]
async fn fixtures_merge_sorted_filtered_and_deduped() {
    let t = Arc::new(
        ScriptedTransport::new()
            .route(
                build_proxy_url(P0, IDNES),
                Reply::Body(fixture("idnes_auto.xml")),
            )
            .route(
                build_proxy_url(P0, AUTO_CZ),
                Reply::Body(fixture("auto_cz.xml")),
            )
            .route(
                build_proxy_url(P0, MEDIA),
                Reply::Body(fixture("audi_media_atom.xml")),
            ),
    );
    let agg = aggregator(t, vec![idnes(), auto_cz(), media()], 10);

    let items = agg.get_news().await;
    let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();

    // Octavia is filtered out; BMW test stays because its description mentions Audi
    assert!(!titles.iter().any(|t| t.contains("Octavia")));
    assert!(titles.iter().any(|t| t.contains("BMW X3")));
    // A6 from Auto.cz is a duplicate of the iDNES one
    assert_eq!(titles.iter().filter(|t| t.to_lowercase().contains("a6 avant")).count(), 1);
    // newest first, undated RS 6 last
    assert_eq!(titles[0], "Audi quattro slaví 44 let");
    assert_eq!(*titles.last().unwrap(), "Audi RS 6 GT: limitovaná edice");
    assert!(items
        .windows(2)
        .all(|w| w[0].sort_key() >= w[1].sort_key()));
    assert_eq!(agg.status(), FeedStatus::Ready { count: items.len() });
}

#[tokio::test]
async fn unflagged_source_skips_relevance_filter() {
    let body = rss(&[("Tiskové fotografie", "https://media.test/photos")]);
    let t = Arc::new(ScriptedTransport::new().route(P0, Reply::Body(body)));

    let filtered = aggregator(t.clone(), vec![auto_cz()], 6);
    assert!(filtered.get_news().await.is_empty());

    let unfiltered = aggregator(t, vec![media()], 6);
    assert_eq!(unfiltered.get_news().await.len(), 1);
}

#[tokio::test]
async fn stops_querying_once_enough_items() {
    let t = Arc::new(
        ScriptedTransport::new()
            .route(
                build_proxy_url(P0, IDNES),
                Reply::Body(rss(&[
                    ("Audi A1", "https://a.test/1"),
                    ("Audi A3", "https://a.test/3"),
                ])),
            )
            .route(
                build_proxy_url(P0, AUTO_CZ),
                Reply::Body(rss(&[("Audi A8", "https://a.test/8")])),
            ),
    );
    let agg = aggregator(t.clone(), vec![idnes(), auto_cz()], 2);

    let items = agg.get_news().await;
    assert_eq!(items.len(), 2);
    assert_eq!(t.call_count(), 1, "second source never requested");
}

#[tokio::test]
async fn failing_source_does_not_abort_the_cycle() {
    let t = Arc::new(
        ScriptedTransport::new()
            .route(build_proxy_url(P0, IDNES), Reply::Body("not xml at all".into()))
            .route(
                build_proxy_url(P0, AUTO_CZ),
                Reply::Body(rss(&[("Audi A8", "https://a.test/8")])),
            ),
    );
    let agg = aggregator(t, vec![idnes(), auto_cz()], 6);

    let items = agg.get_news().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].source_name, "Auto.cz");
}

#[tokio::test(start_paused = true)]
async fn empty_result_still_refreshes_ttl() {
    let t = Arc::new(ScriptedTransport::new().route(P0, Reply::Status(404)));
    let agg = aggregator(t.clone(), vec![idnes()], 6);

    assert!(agg.get_news().await.is_empty());
    let calls = t.call_count();

    let again = agg.fetch().await;
    assert!(again.cache_hit);
    assert!(again.items.is_empty());
    assert_eq!(t.call_count(), calls);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_callers_share_one_cycle() {
    let t = Arc::new(
        ScriptedTransport::new().route(
            build_proxy_url(P0, IDNES),
            Reply::Body(fixture("idnes_auto.xml")),
        ),
    );
    let agg = Arc::new(aggregator(t.clone(), vec![idnes()], 6));

    let (a, b) = tokio::join!(
        {
            let agg = agg.clone();
            async move { agg.fetch().await }
        },
        {
            let agg = agg.clone();
            async move { agg.fetch().await }
        }
    );
    assert_eq!(a.items, b.items);
    assert!(a.cache_hit ^ b.cache_hit, "exactly one caller fetched");
    assert_eq!(t.call_count(), 1);
}
