//! Cardmarket product search pages

use std::sync::LazyLock;

use chrono::Utc;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::{attr_of, listing_path_id, resolve_link, selector, text_of, ListingExtractor, QueryKind, SearchOptions};
use crate::models::{ListingRecord, Platform, Seller};
use crate::scrape::price::extract_euro_price;

/// Game segment used when no category is given
const DEFAULT_GAME: &str = "Magic";

static ROW: LazyLock<Selector> = LazyLock::new(|| selector("div.table-body > div.row"));
static LINK: LazyLock<Selector> = LazyLock::new(|| selector("a[href*='/Products/']"));
static PRICE: LazyLock<Selector> = LazyLock::new(|| selector(".col-price"));
static IMAGE: LazyLock<Selector> = LazyLock::new(|| selector("img"));
static CONDITION: LazyLock<Selector> = LazyLock::new(|| selector(".article-condition, .badge"));
static SELLER: LazyLock<Selector> = LazyLock::new(|| selector(".seller-name a"));

pub struct CardmarketExtractor;

impl ListingExtractor for CardmarketExtractor {
    fn platform(&self) -> Platform {
        Platform::Cardmarket
    }

    fn build_url(
        &self,
        base: &Url,
        query: &str,
        options: &SearchOptions,
        kind: QueryKind,
    ) -> Option<Url> {
        if kind == QueryKind::Completed {
            return None;
        }

        let game = options.category.as_deref().unwrap_or(DEFAULT_GAME);
        let mut url = base.join(&format!("/en/{}/Products/Search", game)).ok()?;
        {
            let mut params = url.query_pairs_mut();
            params.append_pair("searchString", query);
            if let Some(page) = options.page {
                params.append_pair("site", &page.to_string());
            }
        }
        Some(url)
    }

    fn extract(&self, body: &str, base: &Url, _kind: QueryKind) -> Vec<ListingRecord> {
        let document = Html::parse_document(body);
        let now = Utc::now();

        let mut listings = Vec::new();
        let mut rows = 0;
        for row in document.select(&ROW) {
            rows += 1;

            let title = text_of(row, &LINK);
            if title.is_empty() {
                continue;
            }

            let url = attr_of(row, &LINK, "href")
                .map(|href| resolve_link(base, &href))
                .unwrap_or_default();
            // Thumbnails are lazy loaded; the real source sits in data-echo
            let image_url = attr_of(row, &IMAGE, "data-echo").or_else(|| attr_of(row, &IMAGE, "src"));
            let seller_name = text_of(row, &SELLER);

            listings.push(ListingRecord {
                id: listing_path_id(&url, "Products"),
                title,
                price: extract_euro_price(&text_of(row, &PRICE)),
                shipping: 0.0,
                condition: text_of(row, &CONDITION),
                seller: Seller {
                    id: seller_name.clone(),
                    name: seller_name,
                    ..Default::default()
                },
                platform: Platform::Cardmarket,
                image_url: image_url.map(|src| resolve_link(base, &src)),
                url,
                is_auction: false,
                bids: None,
                completed_at: None,
                last_updated: now,
            });
        }

        if rows == 0 {
            warn!("Cardmarket page had no result table; markup may have changed");
        } else {
            debug!("Extracted {} of {} Cardmarket rows", listings.len(), rows);
        }
        listings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_PAGE: &str = r#"
        <html><body><div class="table table-striped">
          <div class="table-header"><div class="row">Name</div></div>
          <div class="table-body">
            <div id="productRow1" class="row">
              <div class="col-icon"><img data-echo="//static.cardmarket.com/img/lotus.jpg" src="/img/blank.gif"></div>
              <div class="col"><a href="/en/Magic/Products/Singles/Alpha/Black-Lotus">Black Lotus</a></div>
              <div class="col-price">1.234,56 €</div>
            </div>
            <div id="productRow2" class="row">
              <div class="col"><a href="/en/Magic/Products/Singles/Beta/Mox-Ruby">Mox Ruby</a></div>
              <div class="col-price">N/A</div>
            </div>
            <div id="productRow3" class="row">
              <div class="col-price">0,25 €</div>
            </div>
          </div>
        </div></body></html>"#;

    fn base() -> Url {
        Url::parse("https://www.cardmarket.com").unwrap()
    }

    #[test]
    fn test_build_search_url() {
        let url = CardmarketExtractor
            .build_url(&base(), "black lotus", &SearchOptions::page(2), QueryKind::Active)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.cardmarket.com/en/Magic/Products/Search?searchString=black+lotus&site=2"
        );

        let options = SearchOptions {
            category: Some("Pokemon".to_string()),
            page: None,
        };
        let url = CardmarketExtractor
            .build_url(&base(), "charizard", &options, QueryKind::Active)
            .unwrap();
        assert_eq!(url.path(), "/en/Pokemon/Products/Search");
    }

    #[test]
    fn test_extract_rows() {
        let listings = CardmarketExtractor.extract(SEARCH_PAGE, &base(), QueryKind::Active);
        assert_eq!(listings.len(), 2);

        let lotus = &listings[0];
        assert_eq!(lotus.id, "Singles/Alpha/Black-Lotus");
        assert_eq!(lotus.title, "Black Lotus");
        assert_eq!(lotus.price, 1234.56);
        assert_eq!(
            lotus.url,
            "https://www.cardmarket.com/en/Magic/Products/Singles/Alpha/Black-Lotus"
        );
        assert_eq!(
            lotus.image_url.as_deref(),
            Some("https://static.cardmarket.com/img/lotus.jpg")
        );
        assert_eq!(lotus.platform, Platform::Cardmarket);
        assert!(!lotus.is_auction);

        assert_eq!(listings[1].title, "Mox Ruby");
        assert_eq!(listings[1].price, 0.0);
        assert_eq!(listings[1].image_url, None);
    }

    #[test]
    fn test_same_card_in_different_sets_gets_distinct_ids() {
        let page = r#"
            <div class="table-body">
              <div class="row"><a href="/en/Magic/Products/Singles/Alpha/Black-Lotus">Black Lotus</a></div>
              <div class="row"><a href="/en/Magic/Products/Singles/Beta/Black-Lotus">Black Lotus</a></div>
            </div>"#;
        let listings = CardmarketExtractor.extract(page, &base(), QueryKind::Active);
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].title, listings[1].title);
        assert_ne!(listings[0].id, listings[1].id);
        assert_eq!(listings[1].id, "Singles/Beta/Black-Lotus");
    }

    #[test]
    fn test_missing_table_yields_nothing() {
        let listings = CardmarketExtractor.extract("<html><body>Maintenance</body></html>", &base(), QueryKind::Active);
        assert!(listings.is_empty());
    }
}
