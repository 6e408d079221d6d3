// src/news/mod.rs
pub mod aggregator;
pub mod cache;
pub mod parser;
pub mod proxy;
pub mod relevance;
pub mod render;
pub mod types;

use crate::news::types::NewsItem;
use metrics::{describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use std::collections::HashSet;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "news_fetch_cycles_total",
            "Aggregation cycles that went to the network."
        );
        describe_counter!(
            "news_cache_hits_total",
            "Aggregation calls answered from cache."
        );
        describe_counter!(
            "news_proxy_failures_total",
            "Single relay attempts that failed."
        );
        describe_counter!(
            "news_source_errors_total",
            "Sources that contributed zero items due to fetch/parse errors."
        );
        describe_counter!("news_items_total", "Items stored after a fetch cycle.");
        describe_histogram!("news_fetch_ms", "Duration of a full fetch cycle in ms.");
    });
}

/// Strip markup from feed text: drop tags, decode entities, collapse whitespace.
pub fn strip_markup(s: &str) -> String {
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    let no_tags = re_tags.replace_all(s, " ");

    let decoded = html_escape::decode_html_entities(&no_tags).replace('\u{00A0}', " ");

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&decoded, " ").trim().to_string()
}

/// Cap text at `max_chars` characters, appending an ellipsis when cut.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}…", head.trim_end())
}

/// Dedup key: lowercase title with all whitespace removed.
pub fn title_key(title: &str) -> String {
    title
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Keep the first item per normalized title, regardless of source.
/// Returns the kept items and the number dropped.
pub fn dedupe_by_title(items: Vec<NewsItem>) -> (Vec<NewsItem>, usize) {
    let mut seen: HashSet<String> = HashSet::with_capacity(items.len());
    let mut keep = Vec::with_capacity(items.len());
    let mut dropped = 0usize;
    for it in items {
        if seen.insert(title_key(&it.title)) {
            keep.push(it);
        } else {
            dropped += 1;
        }
    }
    (keep, dropped)
}

/// Newest first; undated items sink to the end. Stable for equal timestamps.
pub fn sort_newest_first(items: &mut [NewsItem]) {
    items.sort_by_key(|it| std::cmp::Reverse(it.sort_key()));
}
