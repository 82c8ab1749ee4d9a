//! Marketscrape - rate limited marketplace scraping
//!
//! Fetches trading card listings from third-party marketplaces without
//! tripping their anti-scraping defenses.
//!
//! ## Features
//!
//! - Per-platform rolling window rate limits with FIFO fairness
//! - Proxy rotation driven by adaptive health scores
//! - Pluggable extraction for eBay, TCGplayer and Cardmarket
//! - Typed errors carrying platform, URL and transport cause

pub mod config;
pub mod error;
pub mod models;
pub mod proxy;
pub mod rate_limit;
pub mod scrape;

pub use config::Config;
pub use error::{Result, ScrapeError, TransportError};
pub use models::{ListingRecord, Platform, ProxyEvent, ProxyIdentity, ProxyScheme, Seller};
pub use proxy::ProxyRotator;
pub use rate_limit::{Quota, RateLimiter};
pub use scrape::{ScrapeEngine, SearchOptions};
