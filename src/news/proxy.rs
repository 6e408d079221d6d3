// src/news/proxy.rs
//! Relay ("CORS proxy") rotation for fetching remote feeds.
//!
//! The rotator keeps the index of the last relay that answered successfully and starts
//! the next fetch there, wrapping around the list. A relay that failed earlier is still
//! tried on later fetches. Each relay gets exactly one attempt per fetch.
//!
//! `last_successful_index` is shared mutable state; it lives in an `AtomicUsize` so the
//! rotator can sit behind an `Arc` on a multi-threaded runtime. Callers that need the
//! update from one fetch to be visible to the next must await them in sequence.

use async_trait::async_trait;
use metrics::counter;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::news::types::{NewsError, Result};

pub const ACCEPT_FEEDS: &str = "application/xml, text/xml, */*";

/// Same reserved set as JavaScript's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal HTTP GET surface the pipeline depends on.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, accept: &str) -> Result<HttpResponse>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, accept: &str) -> Result<HttpResponse> {
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, accept)
            .send()
            .await?;
        let status = resp.status().as_u16();
        // Error bodies from relays are never parsed.
        let body = if resp.status().is_success() {
            resp.text().await?
        } else {
            String::new()
        };
        Ok(HttpResponse { status, body })
    }
}

/// Substitute `target` into a relay template: `{url}` placeholder or plain suffix.
pub fn build_proxy_url(template: &str, target: &str) -> String {
    let encoded = utf8_percent_encode(target, URI_COMPONENT).to_string();
    if template.contains("{url}") {
        template.replace("{url}", &encoded)
    } else {
        format!("{template}{encoded}")
    }
}

pub struct ProxyRotator {
    proxies: Vec<String>,
    transport: Arc<dyn HttpTransport>,
    last_ok: AtomicUsize,
    attempt_timeout: Option<Duration>,
}

impl ProxyRotator {
    pub fn new(proxies: Vec<String>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            proxies,
            transport,
            last_ok: AtomicUsize::new(0),
            attempt_timeout: None,
        }
    }

    /// Bound every single relay attempt; a timeout counts as that relay failing.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn last_successful_index(&self) -> usize {
        self.last_ok.load(Ordering::Acquire)
    }

    /// Relay indices in the order the next fetch will try them.
    pub fn trial_order(&self) -> Vec<usize> {
        let n = self.proxies.len();
        if n == 0 {
            return Vec::new();
        }
        let start = self.last_successful_index() % n;
        (0..n).map(|i| (start + i) % n).collect()
    }

    async fn attempt(&self, proxy: &str, url: &str) -> Result<HttpResponse> {
        let fut = self.transport.get(url, ACCEPT_FEEDS);
        match self.attempt_timeout {
            Some(after) => tokio::time::timeout(after, fut)
                .await
                .map_err(|_| NewsError::Timeout {
                    proxy: proxy.to_string(),
                    after,
                })?,
            None => fut.await,
        }
    }

    /// Fetch `target` through the relays, starting at the last one that worked.
    pub async fn fetch_via_proxy(&self, target: &str) -> Result<String> {
        let order = self.trial_order();
        if order.is_empty() {
            return Err(NewsError::NoProxies);
        }

        let mut last_err = None;
        for (n, idx) in order.iter().copied().enumerate() {
            let proxy = &self.proxies[idx];
            let url = build_proxy_url(proxy, target);
            debug!(
                target: "proxy",
                attempt = n + 1,
                of = order.len(),
                proxy = %proxy,
                "trying relay"
            );

            let err = match self.attempt(proxy, &url).await {
                Ok(resp) if resp.is_success() => {
                    self.last_ok.store(idx, Ordering::Release);
                    info!(target: "proxy", proxy = %proxy, index = idx, "relay ok");
                    return Ok(resp.body);
                }
                Ok(resp) => NewsError::Http {
                    proxy: proxy.clone(),
                    status: resp.status,
                },
                Err(e) => e,
            };

            warn!(target: "proxy", proxy = %proxy, error = %err, "relay failed");
            counter!("news_proxy_failures_total").increment(1);
            last_err = Some(err);
        }

        Err(NewsError::ProxyExhausted {
            target: target.to_string(),
            attempts: order.len(),
            last: Box::new(last_err.unwrap_or(NewsError::NoProxies)),
        })
    }
}

// --- Test helper ---

/// Canned answer for `ScriptedTransport`.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16),
    Body(String),
    Fail(String),
    /// Never resolves; exercises attempt timeouts.
    Hang,
}

/// In-memory transport answering by longest matching URL prefix and recording calls.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<(String, Reply)>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the answer for `prefix`.
    pub fn route(self, prefix: impl Into<String>, reply: Reply) -> Self {
        let prefix = prefix.into();
        {
            let mut routes = self.routes.lock().unwrap_or_else(|p| p.into_inner());
            routes.retain(|(p, _)| *p != prefix);
            routes.push((prefix, reply));
        }
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    fn reply_for(&self, url: &str) -> Option<Reply> {
        let routes = self.routes.lock().unwrap_or_else(|p| p.into_inner());
        routes
            .iter()
            .filter(|(p, _)| url.starts_with(p.as_str()))
            .max_by_key(|(p, _)| p.len())
            .map(|(_, r)| r.clone())
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, url: &str, _accept: &str) -> Result<HttpResponse> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(url.to_string());
        match self.reply_for(url) {
            Some(Reply::Status(status)) => Ok(HttpResponse {
                status,
                body: String::new(),
            }),
            Some(Reply::Body(body)) => Ok(HttpResponse { status: 200, body }),
            Some(Reply::Fail(msg)) => Err(NewsError::Transport(msg)),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(NewsError::Transport(format!("no route for {url}"))),
        }
    }
}
