// src/news/cache.rs
use std::time::Duration;
use tokio::time::Instant;

use crate::news::types::NewsItem;

/// Single-slot result cache with an absolute TTL (no sliding refresh).
///
/// Contents are only ever replaced wholesale; a hit returns the stored items verbatim.
#[derive(Debug)]
pub struct NewsCache {
    ttl: Duration,
    slot: Option<CacheEntry>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    items: Vec<NewsItem>,
    fetched_at: Instant,
}

impl NewsCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, slot: None }
    }

    /// Items stored by the last write, if that write is younger than the TTL.
    pub fn fresh(&self) -> Option<Vec<NewsItem>> {
        self.slot
            .as_ref()
            .filter(|e| e.fetched_at.elapsed() < self.ttl)
            .map(|e| e.items.clone())
    }

    pub fn store(&mut self, items: Vec<NewsItem>) {
        self.slot = Some(CacheEntry {
            items,
            fetched_at: Instant::now(),
        });
    }
}
