// src/news/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single normalized article, as produced by the feed parser.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>, // None = unparseable/missing, sorts as epoch
    pub description: String,
    pub source_name: String,
}

impl NewsItem {
    /// Timestamp used for ordering; missing dates count as the Unix epoch.
    pub fn sort_key(&self) -> DateTime<Utc> {
        self.published_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

/// Static description of one feed source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    pub name: String,
    pub feed_url: String,
    #[serde(default)]
    pub requires_relevance_filter: bool,
}

impl SourceConfig {
    pub fn new(name: &str, feed_url: &str, requires_relevance_filter: bool) -> Self {
        Self {
            name: name.to_string(),
            feed_url: feed_url.to_string(),
            requires_relevance_filter,
        }
    }
}

/// Result of querying one source during an aggregation cycle.
#[derive(Debug)]
pub enum SourceOutcome {
    Fetched { source: String, items: Vec<NewsItem> },
    Failed { source: String, reason: NewsError },
}

impl SourceOutcome {
    pub fn item_count(&self) -> usize {
        match self {
            SourceOutcome::Fetched { items, .. } => items.len(),
            SourceOutcome::Failed { .. } => 0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NewsError {
    #[error("proxy {proxy} answered HTTP {status}")]
    Http { proxy: String, status: u16 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("proxy {proxy} timed out after {after:?}")]
    Timeout { proxy: String, after: Duration },

    #[error("all {attempts} proxies failed for {target}: {last}")]
    ProxyExhausted {
        target: String,
        attempts: usize,
        last: Box<NewsError>,
    },

    #[error("no proxies configured")]
    NoProxies,

    #[error("feed parse error: {0}")]
    ParseFailure(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for NewsError {
    fn from(e: reqwest::Error) -> Self {
        NewsError::Transport(e.to_string())
    }
}

impl From<quick_xml::Error> for NewsError {
    fn from(e: quick_xml::Error) -> Self {
        NewsError::ParseFailure(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NewsError>;
