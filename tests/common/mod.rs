//! Shared fixtures for engine tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use marketscrape::config::ScrapeConfig;
use marketscrape::models::ProxyIdentity;
use marketscrape::scrape::{FetchResponse, Fetcher};
use marketscrape::{ProxyRotator, Quota, RateLimiter, ScrapeEngine, TransportError};

type Scripted = Result<FetchResponse, TransportError>;

/// Fetcher that replays scripted outcomes, then a fallback, and records every call
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Scripted>>,
    fallback: FetchResponse,
    calls: Mutex<Vec<(Url, Option<String>)>>,
}

impl ScriptedFetcher {
    pub fn new(script: Vec<Scripted>, fallback: FetchResponse) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call answers 200 with `body`
    pub fn always(body: impl Into<String>) -> Self {
        Self::new(Vec::new(), ok(body))
    }

    /// URLs and proxy ids of every call so far
    pub fn calls(&self) -> Vec<(Url, Option<String>)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn get(
        &self,
        url: &Url,
        proxy: Option<&ProxyIdentity>,
    ) -> Result<FetchResponse, TransportError> {
        self.calls
            .lock()
            .push((url.clone(), proxy.map(|p| p.id.clone())));
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

pub fn ok(body: impl Into<String>) -> FetchResponse {
    FetchResponse {
        status: 200,
        body: body.into(),
    }
}

pub fn status(code: u16) -> Scripted {
    Ok(FetchResponse {
        status: code,
        body: String::new(),
    })
}

pub fn proxy(port: u16) -> ProxyIdentity {
    ProxyIdentity::new("127.0.0.1", port)
}

/// Enabled rotator holding `ports` in order
pub fn rotator_with(ports: &[u16]) -> Arc<ProxyRotator> {
    let rotator = ProxyRotator::new(true);
    for &port in ports {
        rotator.add(proxy(port)).unwrap();
    }
    Arc::new(rotator)
}

/// Limiter allowing `max_requests` per `interval_ms` on every platform
pub fn limiter(max_requests: u32, interval_ms: u64) -> RateLimiter {
    RateLimiter::new(Quota::new(max_requests, Duration::from_millis(interval_ms)))
}

pub fn engine(
    limiter: RateLimiter,
    rotator: Arc<ProxyRotator>,
    fetcher: Arc<ScriptedFetcher>,
) -> ScrapeEngine {
    ScrapeEngine::new(&ScrapeConfig::default(), limiter, rotator, fetcher)
}

/// One eBay result card; `sold` is the caption shown on sold listings
pub fn ebay_card(id: &str, title: &str, price: &str, sold: Option<&str>) -> String {
    let caption = sold
        .map(|s| format!(r#"<span class="s-item__caption--signal">Sold {}</span>"#, s))
        .unwrap_or_default();
    format!(
        r#"<li class="s-item"><div class="s-item__wrapper">
             <a class="s-item__link" href="https://www.ebay.com/itm/{id}">
               <div class="s-item__title">{title}</div>
             </a>
             <span class="s-item__price">{price}</span>
             {caption}
           </div></li>"#
    )
}

pub fn ebay_page(cards: &[String]) -> String {
    format!(
        r#"<html><body><ul class="srp-results">{}</ul></body></html>"#,
        cards.concat()
    )
}
