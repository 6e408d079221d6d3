// src/news/aggregator.rs
//! Multi-source news aggregation with a time-bounded cache.
//!
//! One fetch cycle: LOADING -> per-source fetch (sequential) -> merge -> dedupe -> sort
//! -> truncate -> cache write. Sources are queried strictly in configured order so the
//! relay index remembered after one source is where the next source starts.

use metrics::{counter, histogram};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::NewsConfig;
use crate::news::cache::NewsCache;
use crate::news::parser::parse_feed;
use crate::news::proxy::{HttpTransport, ProxyRotator};
use crate::news::relevance::RelevanceFilter;
use crate::news::types::{NewsItem, Result, SourceConfig, SourceOutcome};
use crate::news::{dedupe_by_title, ensure_metrics_described, sort_newest_first};

/// Observable aggregation state for presentation consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FeedStatus {
    Idle,
    Loading,
    Ready { count: usize },
    /// Every source yielded zero items.
    Failed,
}

#[derive(Debug, Clone)]
pub struct NewsSnapshot {
    pub items: Vec<NewsItem>,
    pub cache_hit: bool,
}

impl NewsSnapshot {
    pub fn is_total_failure(&self) -> bool {
        self.items.is_empty()
    }

    /// Settled state this snapshot represents.
    pub fn status(&self) -> FeedStatus {
        if self.is_total_failure() {
            FeedStatus::Failed
        } else {
            FeedStatus::Ready {
                count: self.items.len(),
            }
        }
    }
}

pub struct Aggregator {
    sources: Vec<SourceConfig>,
    rotator: ProxyRotator,
    relevance: RelevanceFilter,
    max_items: usize,
    cache: RwLock<NewsCache>,
    // At most one fetch cycle in flight; waiters re-check the cache.
    refresh: Mutex<()>,
    status: watch::Sender<FeedStatus>,
}

impl Aggregator {
    pub fn new(
        sources: Vec<SourceConfig>,
        rotator: ProxyRotator,
        relevance: RelevanceFilter,
        max_items: usize,
        cache: NewsCache,
    ) -> Self {
        let (status, _) = watch::channel(FeedStatus::Idle);
        Self {
            sources,
            rotator,
            relevance,
            max_items: max_items.max(1),
            cache: RwLock::new(cache),
            refresh: Mutex::new(()),
            status,
        }
    }

    pub fn from_config(cfg: &NewsConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        let mut rotator = ProxyRotator::new(cfg.proxies.clone(), transport);
        if let Some(t) = cfg.fetch_timeout() {
            rotator = rotator.with_attempt_timeout(t);
        }
        Ok(Self::new(
            cfg.sources.clone(),
            rotator,
            RelevanceFilter::new(&cfg.brand)?,
            cfg.max_items,
            NewsCache::new(cfg.cache_ttl()),
        ))
    }

    pub fn rotator(&self) -> &ProxyRotator {
        &self.rotator
    }

    pub fn status(&self) -> FeedStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedStatus> {
        self.status.subscribe()
    }

    /// Aggregated items, newest first, at most `max_items`. Never fails; an empty
    /// result means every source came back empty.
    pub async fn get_news(&self) -> Vec<NewsItem> {
        self.fetch().await.items
    }

    /// Like [`Aggregator::get_news`], also reporting whether the cache answered.
    pub async fn fetch(&self) -> NewsSnapshot {
        ensure_metrics_described();

        if let Some(items) = self.cached().await {
            return NewsSnapshot {
                items,
                cache_hit: true,
            };
        }

        let _guard = self.refresh.lock().await;
        // Another caller may have refreshed while we waited.
        if let Some(items) = self.cached().await {
            return NewsSnapshot {
                items,
                cache_hit: true,
            };
        }

        self.status.send_replace(FeedStatus::Loading);
        let t0 = std::time::Instant::now();
        counter!("news_fetch_cycles_total").increment(1);

        let outcomes = self.query_sources().await;
        let failed = outcomes
            .iter()
            .filter(|o| matches!(o, SourceOutcome::Failed { .. }))
            .count();
        let queried = outcomes.len();
        let items = merge_outcomes(outcomes, self.max_items);

        self.cache.write().await.store(items.clone());

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("news_fetch_ms").record(ms);
        counter!("news_items_total").increment(items.len() as u64);

        if items.is_empty() {
            warn!(
                target: "news",
                queried,
                failed,
                "no news items from any source"
            );
            self.status.send_replace(FeedStatus::Failed);
        } else {
            info!(
                target: "news",
                queried,
                failed,
                kept = items.len(),
                ms,
                "news refreshed"
            );
            self.status.send_replace(FeedStatus::Ready { count: items.len() });
        }

        NewsSnapshot {
            items,
            cache_hit: false,
        }
    }

    async fn cached(&self) -> Option<Vec<NewsItem>> {
        let items = self.cache.read().await.fresh()?;
        counter!("news_cache_hits_total").increment(1);
        debug!(target: "news", count = items.len(), "serving cached news");
        Some(items)
    }

    /// Query sources in order, stopping once enough items have accumulated.
    async fn query_sources(&self) -> Vec<SourceOutcome> {
        let mut outcomes = Vec::with_capacity(self.sources.len());
        let mut accumulated = 0usize;
        for source in &self.sources {
            let outcome = self.query_source(source).await;
            accumulated += outcome.item_count();
            outcomes.push(outcome);
            if accumulated >= self.max_items {
                debug!(target: "news", accumulated, "enough items, skipping remaining sources");
                break;
            }
        }
        outcomes
    }

    async fn query_source(&self, source: &SourceConfig) -> SourceOutcome {
        match self.fetch_source(source).await {
            Ok(items) => {
                debug!(target: "news", source = %source.name, items = items.len(), "source ok");
                SourceOutcome::Fetched {
                    source: source.name.clone(),
                    items,
                }
            }
            Err(reason) => {
                warn!(target: "news", source = %source.name, error = %reason, "source failed");
                counter!("news_source_errors_total").increment(1);
                SourceOutcome::Failed {
                    source: source.name.clone(),
                    reason,
                }
            }
        }
    }

    async fn fetch_source(&self, source: &SourceConfig) -> Result<Vec<NewsItem>> {
        let raw = self.rotator.fetch_via_proxy(&source.feed_url).await?;
        let items = parse_feed(&raw, &source.name)?;
        if !source.requires_relevance_filter {
            return Ok(items);
        }
        let (kept, dropped) = self.relevance.retain(items);
        debug!(
            target: "news",
            source = %source.name,
            brand = self.relevance.brand(),
            dropped,
            "relevance filter applied"
        );
        Ok(kept)
    }
}

/// Merge per-source outcomes: concatenate in source order, dedupe by normalized title,
/// sort newest first and cap at `max_items`.
pub fn merge_outcomes(outcomes: Vec<SourceOutcome>, max_items: usize) -> Vec<NewsItem> {
    let mut all = Vec::new();
    for outcome in outcomes {
        match outcome {
            SourceOutcome::Fetched { items, .. } => all.extend(items),
            SourceOutcome::Failed { .. } => {}
        }
    }
    let (mut unique, dups) = dedupe_by_title(all);
    if dups > 0 {
        debug!(target: "news", dups, "dropped duplicate titles");
    }
    sort_newest_first(&mut unique);
    unique.truncate(max_items);
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::types::NewsError;
    use chrono::TimeZone;

    fn item(title: &str, ts: Option<i64>, source: &str) -> NewsItem {
        NewsItem {
            title: title.into(),
            link: format!("https://{source}.test/{}", title.len()),
            published_at: ts.and_then(|t| chrono::Utc.timestamp_opt(t, 0).single()),
            description: String::new(),
            source_name: source.into(),
        }
    }

    #[test]
    fn merge_skips_failures_dedupes_sorts_truncates() {
        let outcomes = vec![
            SourceOutcome::Fetched {
                source: "a".into(),
                items: vec![
                    item("Nový Audi A6", Some(100), "a"),
                    item("Audi Q8", None, "a"),
                ],
            },
            SourceOutcome::Failed {
                source: "b".into(),
                reason: NewsError::ParseFailure("boom".into()),
            },
            SourceOutcome::Fetched {
                source: "c".into(),
                items: vec![
                    item("nový  AUDI a6", Some(500), "c"),
                    item("Audi RS3", Some(300), "c"),
                    item("Audi A1", Some(200), "c"),
                ],
            },
        ];
        let out = merge_outcomes(outcomes, 3);
        let titles: Vec<_> = out.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Audi RS3", "Audi A1", "Nový Audi A6"]);
        // first occurrence won the dedupe
        assert_eq!(out[2].source_name, "a");
    }

    #[test]
    fn snapshot_status_follows_items() {
        let empty = NewsSnapshot {
            items: Vec::new(),
            cache_hit: true,
        };
        assert_eq!(empty.status(), FeedStatus::Failed);

        let one = NewsSnapshot {
            items: vec![item("Audi A4", Some(1), "a")],
            cache_hit: false,
        };
        assert_eq!(one.status(), FeedStatus::Ready { count: 1 });
    }

    #[test]
    fn merge_of_only_failures_is_empty() {
        let outcomes = vec![SourceOutcome::Failed {
            source: "a".into(),
            reason: NewsError::NoProxies,
        }];
        assert!(merge_outcomes(outcomes, 6).is_empty());
    }
}
