// src/news/relevance.rs
//! Brand relevance gate for general-purpose automotive feeds.

use regex::Regex;

use crate::news::types::{NewsError, NewsItem, Result};

#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    brand: String,
    re: Regex,
}

impl RelevanceFilter {
    /// Build a case-insensitive matcher for `brand` (matched as a substring).
    pub fn new(brand: &str) -> Result<Self> {
        let brand = brand.trim();
        if brand.is_empty() {
            return Err(NewsError::Config("brand must not be empty".into()));
        }
        let re = Regex::new(&format!("(?iu){}", regex::escape(brand)))
            .map_err(|e| NewsError::Config(format!("brand pattern: {e}")))?;
        Ok(Self {
            brand: brand.to_string(),
            re,
        })
    }

    pub fn brand(&self) -> &str {
        &self.brand
    }

    pub fn is_relevant(&self, item: &NewsItem) -> bool {
        self.re
            .is_match(&format!("{} {}", item.title, item.description))
    }

    /// Keep only relevant items; returns (kept, dropped count).
    pub fn retain(&self, items: Vec<NewsItem>) -> (Vec<NewsItem>, usize) {
        let before = items.len();
        let kept: Vec<NewsItem> = items.into_iter().filter(|it| self.is_relevant(it)).collect();
        let dropped = before - kept.len();
        (kept, dropped)
    }
}
