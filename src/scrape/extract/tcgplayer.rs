//! TCGplayer marketplace search API

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::{listing_id, ListingExtractor, QueryKind, SearchOptions};
use crate::models::{ListingRecord, Platform, Seller};

const PRODUCT_BASE: &str = "https://www.tcgplayer.com/product";
const IMAGE_BASE: &str = "https://tcgplayer-cdn.tcgplayer.com/product";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ResultGroup>,
}

#[derive(Debug, Deserialize)]
struct ResultGroup {
    #[serde(default)]
    results: Vec<Product>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Product {
    product_id: Option<f64>,
    product_name: String,
    product_url_name: String,
    set_name: String,
    market_price: Option<f64>,
    lowest_price: Option<f64>,
    lowest_price_with_shipping: Option<f64>,
}

impl Product {
    fn into_record(self, now: chrono::DateTime<Utc>) -> Option<ListingRecord> {
        let title = self.product_name.trim().to_string();
        if title.is_empty() {
            return None;
        }

        let product_id = self.product_id.map(|id| id as u64);
        let url = match product_id {
            Some(id) => format!("{}/{}/{}", PRODUCT_BASE, id, self.product_url_name),
            None => String::new(),
        };
        let price = self.lowest_price.or(self.market_price).unwrap_or(0.0);
        let shipping = self
            .lowest_price_with_shipping
            .map(|total| (total - price).max(0.0))
            .unwrap_or(0.0);

        Some(ListingRecord {
            id: product_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| listing_id(&url, "product")),
            title,
            price,
            shipping,
            condition: self.set_name,
            seller: Seller::default(),
            platform: Platform::TcgPlayer,
            image_url: product_id.map(|id| format!("{}/{}_200w.jpg", IMAGE_BASE, id)),
            url,
            is_auction: false,
            bids: None,
            completed_at: None,
            last_updated: now,
        })
    }
}

pub struct TcgPlayerExtractor;

impl ListingExtractor for TcgPlayerExtractor {
    fn platform(&self) -> Platform {
        Platform::TcgPlayer
    }

    fn build_url(
        &self,
        base: &Url,
        query: &str,
        options: &SearchOptions,
        kind: QueryKind,
    ) -> Option<Url> {
        // The search API only exposes current market listings
        if kind == QueryKind::Completed {
            return None;
        }

        let mut url = base.join("/v1/search/request").ok()?;
        {
            let mut params = url.query_pairs_mut();
            params.append_pair("q", query);
            params.append_pair("isList", "false");
            if let Some(line) = &options.category {
                params.append_pair("productLineName", line);
            }
            if let Some(page) = options.page {
                params.append_pair("page", &page.to_string());
            }
        }
        Some(url)
    }

    fn extract(&self, body: &str, _base: &Url, _kind: QueryKind) -> Vec<ListingRecord> {
        let response: SearchResponse = match serde_json::from_str(body) {
            Ok(response) => response,
            Err(e) => {
                warn!("TCGplayer response was not valid search JSON: {}", e);
                return Vec::new();
            }
        };

        let now = Utc::now();
        let listings: Vec<ListingRecord> = response
            .results
            .into_iter()
            .flat_map(|group| group.results)
            .filter_map(|product| product.into_record(now))
            .collect();

        debug!("Extracted {} TCGplayer products", listings.len());
        listings
    }
}
