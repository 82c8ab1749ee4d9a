//! Listing scraping
//!
//! [`ScrapeEngine`] is the entry point. Transport and per-platform
//! extraction sit behind the [`Fetcher`] and [`ListingExtractor`] traits.

pub mod engine;
pub mod extract;
pub mod price;
pub mod transport;

pub use engine::ScrapeEngine;
pub use extract::{
    extractor_for, CardmarketExtractor, EbayExtractor, ListingExtractor, QueryKind, SearchOptions,
    TcgPlayerExtractor,
};
pub use price::{extract_euro_price, extract_price};
pub use transport::{FetchResponse, Fetcher, HttpFetcher};
