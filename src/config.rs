use std::collections::HashMap;
use std::env;
use std::time::Duration;

use url::Url;

use crate::error::{Result, ScrapeError};
use crate::models::{Platform, ProxyIdentity};
use crate::rate_limit::Quota;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Scraping and rate limit configuration
    pub scrape: ScrapeConfig,
    /// Outbound proxy pool
    pub proxy: ProxyPoolConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Per-platform rate limits and endpoints
    pub platforms: HashMap<Platform, PlatformConfig>,
    /// Maximum queued throttle calls per platform (None = unbounded)
    pub max_queue_depth: Option<usize>,
    /// Connect timeout in seconds for outbound requests
    pub connect_timeout: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Requests allowed per interval
    pub max_requests: u32,
    /// Rolling window length in milliseconds
    pub interval_ms: u64,
    /// Base URL that search paths are resolved against
    pub base_url: Url,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyPoolConfig {
    /// Route requests through the pool; false means direct connections
    pub enabled: bool,
    /// Upstream proxies in rotation order
    pub providers: Vec<ProxyIdentity>,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut platforms = HashMap::new();
        for platform in Platform::ALL {
            platforms.insert(platform, PlatformConfig::from_env(platform)?);
        }

        let max_queue_depth = match env::var("SCRAPE_MAX_QUEUE_DEPTH") {
            Ok(raw) if !raw.trim().is_empty() => Some(raw.trim().parse().map_err(|_| {
                ScrapeError::InvalidConfig("SCRAPE_MAX_QUEUE_DEPTH must be a valid number".into())
            })?),
            _ => None,
        };
        let connect_timeout = get_env_or("SCRAPE_CONNECT_TIMEOUT", "10")
            .trim()
            .parse()
            .map_err(|_| {
                ScrapeError::InvalidConfig("SCRAPE_CONNECT_TIMEOUT must be a valid number".into())
            })?;
        let enabled = get_env_or("PROXY_ENABLED", "false")
            .trim()
            .parse()
            .map_err(|_| ScrapeError::InvalidConfig("PROXY_ENABLED must be true or false".into()))?;

        Ok(Config {
            scrape: ScrapeConfig {
                platforms,
                max_queue_depth,
                connect_timeout,
            },
            proxy: ProxyPoolConfig {
                enabled,
                providers: parse_providers(&get_env_or("PROXY_PROVIDERS", ""))?,
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }
}

impl ScrapeConfig {
    /// Quota for targets without their own configuration
    pub fn default_quota(&self) -> Quota {
        Quota::per_minute(10)
    }

    pub fn platform(&self, platform: Platform) -> PlatformConfig {
        self.platforms
            .get(&platform)
            .cloned()
            .unwrap_or_else(|| PlatformConfig::default_for(platform))
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            platforms: Platform::ALL
                .into_iter()
                .map(|p| (p, PlatformConfig::default_for(p)))
                .collect(),
            max_queue_depth: None,
            connect_timeout: 10,
        }
    }
}

impl PlatformConfig {
    pub fn default_for(platform: Platform) -> Self {
        let (max_requests, base_url) = match platform {
            Platform::Ebay => (10, "https://www.ebay.com"),
            Platform::TcgPlayer => (5, "https://mp-search-api.tcgplayer.com"),
            Platform::Cardmarket => (5, "https://www.cardmarket.com"),
        };
        Self {
            max_requests,
            interval_ms: 60_000,
            base_url: Url::parse(base_url).expect("static base URL"),
        }
    }

    fn from_env(platform: Platform) -> Result<Self> {
        let defaults = Self::default_for(platform);
        let prefix = platform.env_prefix();

        let max_key = format!("{}_MAX_REQUESTS", prefix);
        let max_requests = match env::var(&max_key) {
            Ok(raw) => raw.trim().parse().map_err(|_| {
                ScrapeError::InvalidConfig(format!("{} must be a valid number", max_key))
            })?,
            Err(_) => defaults.max_requests,
        };

        let interval_key = format!("{}_INTERVAL_MS", prefix);
        let interval_ms = match env::var(&interval_key) {
            Ok(raw) => raw.trim().parse().map_err(|_| {
                ScrapeError::InvalidConfig(format!("{} must be a valid number", interval_key))
            })?,
            Err(_) => defaults.interval_ms,
        };
        if interval_ms == 0 {
            return Err(ScrapeError::InvalidConfig(format!(
                "{} must be greater than zero",
                interval_key
            )));
        }

        let url_key = format!("{}_BASE_URL", prefix);
        let base_url = match env::var(&url_key) {
            Ok(raw) if !raw.trim().is_empty() => Url::parse(raw.trim()).map_err(|e| {
                ScrapeError::InvalidConfig(format!("{} must be a valid URL: {}", url_key, e))
            })?,
            _ => defaults.base_url,
        };

        Ok(Self {
            max_requests,
            interval_ms,
            base_url,
        })
    }

    pub fn quota(&self) -> Quota {
        Quota::new(self.max_requests, Duration::from_millis(self.interval_ms))
    }
}

fn parse_providers(raw: &str) -> Result<Vec<ProxyIdentity>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ProxyIdentity::parse)
        .collect()
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
