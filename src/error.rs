use thiserror::Error;

use crate::models::Platform;

/// Underlying cause of a failed fetch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Network failure, timeout, or a body that could not be read
    #[error("request failed: {0}")]
    Request(String),

    /// The target answered with a non-2xx status
    #[error("unexpected status {0}")]
    Status(u16),
}

/// Unified error type for the scraping core
#[derive(Error, Debug)]
pub enum ScrapeError {
    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Proxy already registered: {id}")]
    DuplicateProxy { id: String },

    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("{platform} does not support {kind} queries")]
    UnsupportedQuery { platform: Platform, kind: &'static str },

    // Transport errors
    #[error("Fetch failed for {platform} at {url}: {source}")]
    FetchFailed {
        platform: Platform,
        url: String,
        #[source]
        source: TransportError,
    },

    // Rate limiter
    #[error("Rate limiter closed while waiting for {target}")]
    LimiterClosed { target: String },

    #[error("Rate limiter queue for {target} is full ({depth} waiting)")]
    QueueFull { target: String, depth: usize },

    // HTTP client construction
    #[error("HTTP error: {0}")]
    Http(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for scraping operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

impl ScrapeError {
    /// Configuration errors are surfaced immediately and never retried
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ScrapeError::InvalidConfig(_)
                | ScrapeError::DuplicateProxy { .. }
                | ScrapeError::UnknownPlatform(_)
                | ScrapeError::UnsupportedQuery { .. }
        )
    }

    /// Check if this error came from the network or the remote site
    pub fn is_transport_error(&self) -> bool {
        matches!(self, ScrapeError::FetchFailed { .. } | ScrapeError::Http(_))
    }

    /// Whether a caller may reasonably retry the operation later
    pub fn is_retryable(&self) -> bool {
        match self {
            ScrapeError::FetchFailed { .. } | ScrapeError::QueueFull { .. } => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        ScrapeError::Http(err.to_string())
    }
}

impl From<url::ParseError> for ScrapeError {
    fn from(err: url::ParseError) -> Self {
        ScrapeError::InvalidConfig(err.to_string())
    }
}
