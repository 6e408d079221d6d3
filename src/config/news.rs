// src/config/news.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::news::types::SourceConfig;

pub const ENV_CONFIG_PATH: &str = "NEWS_CONFIG_PATH";
pub const ENV_CACHE_TTL_MS: &str = "NEWS_CACHE_TTL_MS";
pub const ENV_MAX_ITEMS: &str = "NEWS_MAX_ITEMS";

pub const DEFAULT_MAX_ITEMS: usize = 6;
pub const DEFAULT_CACHE_TTL_MS: u64 = 5 * 60 * 1000;

fn default_proxies() -> Vec<String> {
    [
        "https://api.allorigins.win/raw?url=",
        "https://corsproxy.io/?",
        "https://api.codetabs.com/v1/proxy?quest=",
        "https://thingproxy.freeboard.io/fetch/",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::new("iDNES Auto", "https://www.idnes.cz/rss/auto.xml", true),
        SourceConfig::new("Auto.cz", "https://www.auto.cz/rss", true),
        SourceConfig::new(
            "Seznam Auto-Moto",
            "https://www.seznamzpravy.cz/rss/auto-moto",
            true,
        ),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NewsConfig {
    /// Brand name used by the relevance filter.
    pub brand: String,
    pub max_items: usize,
    pub cache_ttl_ms: u64,
    /// Per relay attempt; 0 disables the bound.
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    /// Relay templates; `{url}` is replaced by the encoded feed URL, otherwise appended.
    pub proxies: Vec<String>,
    pub sources: Vec<SourceConfig>,
    /// Directory with the static site (index.html, css, js, img).
    pub static_dir: String,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            brand: "Audi".to_string(),
            max_items: DEFAULT_MAX_ITEMS,
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            fetch_timeout_secs: 10,
            user_agent: concat!("brand-news/", env!("CARGO_PKG_VERSION")).to_string(),
            proxies: default_proxies(),
            sources: default_sources(),
            static_dir: "public".to_string(),
        }
    }
}

impl NewsConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        (self.fetch_timeout_secs > 0).then(|| Duration::from_secs(self.fetch_timeout_secs))
    }

    /// Load from an explicit path. TOML or JSON, chosen by extension.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading news config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&content, &ext)
            .with_context(|| format!("parsing news config {}", path.display()))?;
        Ok(cfg.sanitized())
    }

    /// Resolve config using env var + fallbacks, then apply env overrides:
    /// 1) $NEWS_CONFIG_PATH
    /// 2) config/news.toml
    /// 3) config/news.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let toml_p = PathBuf::from("config/news.toml");
            let json_p = PathBuf::from("config/news.json");
            if toml_p.exists() {
                Self::load_from(&toml_p)?
            } else if json_p.exists() {
                Self::load_from(&json_p)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides();
        Ok(cfg.sanitized())
    }

    fn apply_env_overrides(&mut self) {
        if let Some(ms) = env_u64(ENV_CACHE_TTL_MS) {
            self.cache_ttl_ms = ms;
        }
        if let Some(n) = env_u64(ENV_MAX_ITEMS) {
            self.max_items = usize::try_from(n).unwrap_or(DEFAULT_MAX_ITEMS);
        }
    }

    fn sanitized(mut self) -> Self {
        if self.max_items == 0 {
            self.max_items = DEFAULT_MAX_ITEMS;
        }
        self.brand = self.brand.trim().to_string();
        if self.brand.is_empty() {
            self.brand = Self::default().brand;
        }
        self.proxies = self
            .proxies
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        self.sources.retain(|s| !s.name.trim().is_empty() && !s.feed_url.trim().is_empty());
        self
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<NewsConfig> {
    match hint_ext {
        "json" => Ok(serde_json::from_str(s)?),
        "toml" => Ok(toml::from_str(s)?),
        // Unknown extension: JSON if it looks like an object, TOML otherwise.
        _ if s.trim_start().starts_with('{') => Ok(serde_json::from_str(s)?),
        _ => Ok(toml::from_str(s)?),
    }
}
