//! Scrape orchestration
//!
//! Composes the rate limiter, the proxy rotator and a [`Fetcher`] around one
//! listing query, then hands the body to the platform's extractor.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};
use url::Url;

use super::extract::{extractor_for, ListingExtractor, QueryKind, SearchOptions};
use super::transport::Fetcher;
use crate::config::ScrapeConfig;
use crate::error::{Result, ScrapeError, TransportError};
use crate::models::{ListingRecord, Platform};
use crate::proxy::ProxyRotator;
use crate::rate_limit::RateLimiter;

/// First attempt plus one retry through a rotated identity
const MAX_ATTEMPTS: u32 = 2;

/// Fetches and parses marketplace listings
pub struct ScrapeEngine {
    limiter: RateLimiter,
    rotator: Arc<ProxyRotator>,
    fetcher: Arc<dyn Fetcher>,
    extractors: HashMap<Platform, Arc<dyn ListingExtractor>>,
    base_urls: HashMap<Platform, Url>,
}

impl ScrapeEngine {
    pub fn new(
        config: &ScrapeConfig,
        limiter: RateLimiter,
        rotator: Arc<ProxyRotator>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let extractors = Platform::ALL
            .into_iter()
            .map(|p| (p, extractor_for(p)))
            .collect();
        let base_urls = Platform::ALL
            .into_iter()
            .map(|p| (p, config.platform(p).base_url))
            .collect();

        Self {
            limiter,
            rotator,
            fetcher,
            extractors,
            base_urls,
        }
    }

    /// Replace the extraction strategy for the extractor's platform
    pub fn with_extractor(mut self, extractor: Arc<dyn ListingExtractor>) -> Self {
        self.extractors.insert(extractor.platform(), extractor);
        self
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn rotator(&self) -> &Arc<ProxyRotator> {
        &self.rotator
    }

    /// Active listings matching `query`. No results is an empty vec.
    pub async fn search(
        &self,
        platform: Platform,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<ListingRecord>> {
        self.run(platform, query, options, QueryKind::Active).await
    }

    /// Sold listings completed within the trailing `within_days` days
    pub async fn completed_sales(
        &self,
        platform: Platform,
        query: &str,
        within_days: u32,
    ) -> Result<Vec<ListingRecord>> {
        let listings = self
            .run(platform, query, &SearchOptions::default(), QueryKind::Completed)
            .await?;

        let cutoff = Utc::now() - chrono::Duration::days(i64::from(within_days));
        let total = listings.len();
        let recent: Vec<ListingRecord> = listings
            .into_iter()
            .filter(|l| l.completed_at.is_some_and(|at| at >= cutoff))
            .collect();

        debug!(
            "Kept {} of {} {} sales from the last {} days",
            recent.len(),
            total,
            platform,
            within_days
        );
        Ok(recent)
    }

    async fn run(
        &self,
        platform: Platform,
        query: &str,
        options: &SearchOptions,
        kind: QueryKind,
    ) -> Result<Vec<ListingRecord>> {
        let extractor = self
            .extractors
            .get(&platform)
            .cloned()
            .unwrap_or_else(|| extractor_for(platform));
        let base = self
            .base_urls
            .get(&platform)
            .ok_or_else(|| ScrapeError::Internal(format!("no base URL for {}", platform)))?;

        let url = extractor
            .build_url(base, query, options, kind)
            .ok_or(ScrapeError::UnsupportedQuery {
                platform,
                kind: kind.as_str(),
            })?;

        let body = self.fetch(platform, &url).await?;
        Ok(extractor.extract(&body, base, kind))
    }

    /// Throttled GET with one rotated retry
    ///
    /// Every attempt takes its own rate limit grant.
    #[instrument(skip_all, fields(platform = %platform, url = %url))]
    async fn fetch(&self, platform: Platform, url: &Url) -> Result<String> {
        let mut attempts = 0;

        loop {
            attempts += 1;
            self.limiter.throttle(platform.as_str()).await?;

            let proxy = self.rotator.current();
            let proxy_id = proxy.as_ref().map(|p| p.id.as_str()).unwrap_or("direct");
            debug!(
                "Fetching via {} (attempt {}/{})",
                proxy_id, attempts, MAX_ATTEMPTS
            );

            let outcome = match self.fetcher.get(url, proxy.as_ref()).await {
                Ok(response) if response.is_success() => Ok(response.body),
                Ok(response) => Err(TransportError::Status(response.status)),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(body) => {
                    if let Some(proxy) = &proxy {
                        self.rotator.reward(&proxy.id);
                    }
                    return Ok(body);
                }
                Err(source) => {
                    if let Some(proxy) = &proxy {
                        self.rotator.penalize(&proxy.id);
                    }
                    warn!(
                        "Fetch via {} failed: {} (attempt {}/{})",
                        proxy_id, source, attempts, MAX_ATTEMPTS
                    );

                    if attempts >= MAX_ATTEMPTS {
                        return Err(ScrapeError::FetchFailed {
                            platform,
                            url: url.to_string(),
                            source,
                        });
                    }
                    self.rotator.rotate();
                }
            }
        }
    }
}
