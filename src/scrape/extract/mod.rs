//! Per-platform listing extraction
//!
//! Every platform gets one [`ListingExtractor`] that knows how to build its
//! search URLs and how to turn a response body into [`ListingRecord`]s.
//! Extraction is best effort: missing optional fields fall back to their
//! defaults, and a page without the expected container yields no records.

mod cardmarket;
mod ebay;
mod tcgplayer;

pub use cardmarket::CardmarketExtractor;
pub use ebay::EbayExtractor;
pub use tcgplayer::TcgPlayerExtractor;

use std::sync::Arc;

use scraper::{ElementRef, Selector};
use url::Url;
use uuid::Uuid;

use crate::models::{ListingRecord, Platform};

/// Which listings a query asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Currently active listings
    Active,
    /// Sold or completed listings
    Completed,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Active => "search",
            QueryKind::Completed => "completed sales",
        }
    }
}

/// Optional search refinements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Platform specific category or game filter
    pub category: Option<String>,
    /// 1-based result page
    pub page: Option<u32>,
}

impl SearchOptions {
    pub fn page(page: u32) -> Self {
        Self {
            page: Some(page),
            ..Default::default()
        }
    }
}

/// Platform specific URL building and parsing rules
pub trait ListingExtractor: Send + Sync {
    fn platform(&self) -> Platform;

    /// Build the request URL, or `None` when the platform cannot serve `kind`
    fn build_url(
        &self,
        base: &Url,
        query: &str,
        options: &SearchOptions,
        kind: QueryKind,
    ) -> Option<Url>;

    /// Parse listings out of a response body. Never fails.
    fn extract(&self, body: &str, base: &Url, kind: QueryKind) -> Vec<ListingRecord>;
}

/// Default extractor for a platform
pub fn extractor_for(platform: Platform) -> Arc<dyn ListingExtractor> {
    match platform {
        Platform::Ebay => Arc::new(EbayExtractor),
        Platform::TcgPlayer => Arc::new(TcgPlayerExtractor),
        Platform::Cardmarket => Arc::new(CardmarketExtractor),
    }
}

/// Stable listing id from the URL path segment following `marker`
///
/// Uses the last non-empty segment after the marker. Falls back to a fresh
/// UUID when the URL has no such segment, never to title or price.
pub(crate) fn listing_id(url: &str, marker: &str) -> String {
    stable_segment(url, marker).unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Listing id from every path segment following `marker`, joined with `/`
///
/// For sites where the final segment alone repeats across listings, such as
/// one card name shared by several printings.
pub(crate) fn listing_path_id(url: &str, marker: &str) -> String {
    segments_after(url, marker)
        .filter(|segments| !segments.is_empty())
        .map(|segments| segments.join("/"))
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn stable_segment(url: &str, marker: &str) -> Option<String> {
    segments_after(url, marker)?.pop()
}

/// Non-empty path segments after the first `marker` segment
fn segments_after(url: &str, marker: &str) -> Option<Vec<String>> {
    let parsed = Url::parse(url).ok()?;
    let segments: Vec<&str> = parsed.path_segments()?.collect();
    let start = segments.iter().position(|s| *s == marker)?;
    Some(
        segments[start + 1..]
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect(),
    )
}

/// Resolve a possibly relative link against the platform base
pub(crate) fn resolve_link(base: &Url, href: &str) -> String {
    base.join(href.trim())
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.trim().to_string())
}

pub(crate) fn selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {}: {:?}", css, e))
}

/// Whitespace-normalized text of the first match, empty when absent
pub(crate) fn text_of(element: ElementRef<'_>, selector: &Selector) -> String {
    element
        .select(selector)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

/// Non-empty attribute of the first match
pub(crate) fn attr_of(element: ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    element
        .select(selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
