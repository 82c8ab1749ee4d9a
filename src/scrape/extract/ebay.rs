//! eBay search result pages

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::{attr_of, listing_id, resolve_link, selector, text_of, ListingExtractor, QueryKind, SearchOptions};
use crate::models::{ListingRecord, Platform, Seller};
use crate::scrape::price::{extract_count, extract_price};

static CARD: LazyLock<Selector> = LazyLock::new(|| selector(".s-item__wrapper"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector(".s-item__title"));
static PRICE: LazyLock<Selector> = LazyLock::new(|| selector(".s-item__price"));
static SHIPPING: LazyLock<Selector> = LazyLock::new(|| selector(".s-item__shipping"));
static IMAGE: LazyLock<Selector> = LazyLock::new(|| selector(".s-item__image-img"));
static LINK: LazyLock<Selector> = LazyLock::new(|| selector(".s-item__link"));
static BIDS: LazyLock<Selector> = LazyLock::new(|| selector(".s-item__bids"));
static CONDITION: LazyLock<Selector> = LazyLock::new(|| selector(".s-item__condition, .SECONDARY_INFO"));
static SELLER: LazyLock<Selector> = LazyLock::new(|| selector(".s-item__seller-info-text"));
static ENDED: LazyLock<Selector> =
    LazyLock::new(|| selector(".s-item__ended-date, .s-item__caption--signal"));

/// `name (1,234) 99.5%`
static SELLER_INFO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\S+)(?:\s*\(([\d,]+)\))?(?:\s*([\d.]+)%)?").expect("valid seller pattern")
});

/// Placeholder card eBay renders ahead of real results
const PLACEHOLDER_TITLE: &str = "Shop on eBay";

const SOLD_DATE_FORMATS: &[&str] = &["%b %d, %Y", "%b %e, %Y", "%d %b %Y", "%Y-%m-%d", "%m/%d/%Y"];

pub struct EbayExtractor;

impl ListingExtractor for EbayExtractor {
    fn platform(&self) -> Platform {
        Platform::Ebay
    }

    fn build_url(
        &self,
        base: &Url,
        query: &str,
        options: &SearchOptions,
        kind: QueryKind,
    ) -> Option<Url> {
        let mut url = base.join("/sch/i.html").ok()?;
        {
            let mut params = url.query_pairs_mut();
            params.append_pair("_nkw", query);
            if let Some(category) = &options.category {
                params.append_pair("_sacat", category);
            }
            if let Some(page) = options.page {
                params.append_pair("_pgn", &page.to_string());
            }
            if kind == QueryKind::Completed {
                params.append_pair("LH_Complete", "1");
                params.append_pair("LH_Sold", "1");
            }
        }
        Some(url)
    }

    fn extract(&self, body: &str, base: &Url, kind: QueryKind) -> Vec<ListingRecord> {
        let document = Html::parse_document(body);
        let now = Utc::now();

        let mut listings = Vec::new();
        let mut cards = 0;
        for card in document.select(&CARD) {
            cards += 1;

            let title = text_of(card, &TITLE);
            let title = title.strip_prefix("New Listing").unwrap_or(&title).trim();
            if title.is_empty() || title == PLACEHOLDER_TITLE {
                continue;
            }

            let url = attr_of(card, &LINK, "href")
                .map(|href| resolve_link(base, &href))
                .unwrap_or_default();
            let bids_text = text_of(card, &BIDS);
            let is_auction = kind == QueryKind::Active && !bids_text.is_empty();

            let completed_at = match kind {
                QueryKind::Completed => parse_sold_date(&text_of(card, &ENDED)),
                QueryKind::Active => None,
            };

            listings.push(ListingRecord {
                id: listing_id(&url, "itm"),
                title: title.to_string(),
                price: extract_price(&text_of(card, &PRICE)),
                shipping: extract_price(&text_of(card, &SHIPPING)),
                condition: text_of(card, &CONDITION),
                seller: parse_seller(&text_of(card, &SELLER)),
                platform: Platform::Ebay,
                image_url: attr_of(card, &IMAGE, "src"),
                url,
                is_auction,
                bids: is_auction.then(|| {
                    extract_count(&bids_text)
                        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
                        .unwrap_or(0)
                }),
                completed_at,
                last_updated: now,
            });
        }

        if cards == 0 {
            warn!("eBay page had no listing container; markup may have changed");
        } else {
            debug!("Extracted {} of {} eBay cards", listings.len(), cards);
        }
        listings
    }
}

fn parse_seller(text: &str) -> Seller {
    let Some(caps) = SELLER_INFO.captures(text) else {
        return Seller::default();
    };

    let name = caps[1].to_string();
    Seller {
        id: name.clone(),
        name,
        rating: caps
            .get(3)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0.0),
        total_sales: caps
            .get(2)
            .and_then(|m| m.as_str().replace(',', "").parse().ok())
            .unwrap_or(0),
    }
}

/// Parse captions like `Sold  Oct 3, 2024` as midnight UTC on that day
fn parse_sold_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    let text = text.strip_prefix("Sold").unwrap_or(text).trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    SOLD_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    const SEARCH_PAGE: &str = r#"
        <html><body><ul class="srp-results">
          <li class="s-item"><div class="s-item__wrapper">
            <a class="s-item__link" href="https://ebay.com/itm/123"></a>
            <div class="s-item__title">Shop on eBay</div>
            <span class="s-item__price">$20.00</span>
          </div></li>
          <li class="s-item"><div class="s-item__wrapper">
            <img class="s-item__image-img" src="https://i.ebayimg.com/lotus.jpg">
            <a class="s-item__link" href="https://www.ebay.com/itm/1234567890?hash=item1">
              <div class="s-item__title"><span>New Listing</span> Black Lotus Alpha</div>
            </a>
            <span class="SECONDARY_INFO">Pre-Owned</span>
            <span class="s-item__price">$1,234.56</span>
            <span class="s-item__shipping">+$4.99 shipping</span>
            <span class="s-item__bids">7 bids</span>
            <span class="s-item__seller-info-text">lotus_dealer (1,024) 99.6%</span>
          </div></li>
          <li class="s-item"><div class="s-item__wrapper">
            <a class="s-item__link" href="/itm/555"></a>
            <div class="s-item__title">Mox Pearl</div>
            <span class="s-item__price">Price unavailable</span>
            <span class="s-item__shipping">Free shipping</span>
          </div></li>
          <li class="s-item"><div class="s-item__wrapper">
            <span class="s-item__price">$3.00</span>
          </div></li>
        </ul></body></html>"#;

    fn base() -> Url {
        Url::parse("https://www.ebay.com").unwrap()
    }

    #[test]
    fn test_build_search_url() {
        let options = SearchOptions {
            category: Some("183454".to_string()),
            page: Some(3),
        };
        let url = EbayExtractor
            .build_url(&base(), "black lotus", &options, QueryKind::Active)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.ebay.com/sch/i.html?_nkw=black+lotus&_sacat=183454&_pgn=3"
        );
    }

    #[test]
    fn test_build_completed_url() {
        let url = EbayExtractor
            .build_url(&base(), "mox", &SearchOptions::default(), QueryKind::Completed)
            .unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("LH_Complete".to_string(), "1".to_string())));
        assert!(pairs.contains(&("LH_Sold".to_string(), "1".to_string())));
    }

    #[test]
    fn test_extract_search_results() {
        let listings = EbayExtractor.extract(SEARCH_PAGE, &base(), QueryKind::Active);
        assert_eq!(listings.len(), 2);

        let lotus = &listings[0];
        assert_eq!(lotus.id, "1234567890");
        assert_eq!(lotus.title, "Black Lotus Alpha");
        assert_eq!(lotus.price, 1234.56);
        assert_eq!(lotus.shipping, 4.99);
        assert_eq!(lotus.condition, "Pre-Owned");
        assert_eq!(lotus.image_url.as_deref(), Some("https://i.ebayimg.com/lotus.jpg"));
        assert!(lotus.is_auction);
        assert_eq!(lotus.bids, Some(7));
        assert_eq!(lotus.seller.name, "lotus_dealer");
        assert_eq!(lotus.seller.total_sales, 1024);
        assert_eq!(lotus.seller.rating, 99.6);
        assert_eq!(lotus.completed_at, None);

        // Missing optional fields fall back to defaults instead of dropping the card
        let mox = &listings[1];
        assert_eq!(mox.id, "555");
        assert_eq!(mox.url, "https://www.ebay.com/itm/555");
        assert_eq!(mox.price, 0.0);
        assert!(!mox.has_price());
        assert_eq!(mox.shipping, 0.0);
        assert_eq!(mox.image_url, None);
        assert!(!mox.is_auction);
        assert_eq!(mox.bids, None);
        assert_eq!(mox.seller, Seller::default());
    }

    #[test]
    fn test_missing_container_yields_nothing() {
        let listings = EbayExtractor.extract("<html><body><h1>Captcha</h1></body></html>", &base(), QueryKind::Active);
        assert!(listings.is_empty());
        assert!(EbayExtractor.extract("", &base(), QueryKind::Active).is_empty());
    }

    #[test]
    fn test_oversized_bid_count_saturates() {
        let page = r#"
            <div class="s-item__wrapper">
              <a class="s-item__link" href="https://www.ebay.com/itm/77"></a>
              <div class="s-item__title">Mox Sapphire</div>
              <span class="s-item__price">$5,000.00</span>
              <span class="s-item__bids">4,294,967,297 bids</span>
            </div>"#;
        let listings = EbayExtractor.extract(page, &base(), QueryKind::Active);
        assert_eq!(listings.len(), 1);
        assert!(listings[0].is_auction);
        assert_eq!(listings[0].bids, Some(u32::MAX));
    }

    #[test]
    fn test_extract_completed_sets_sold_date() {
        let page = r#"
            <div class="s-item__wrapper">
              <a class="s-item__link" href="https://www.ebay.com/itm/42"></a>
              <div class="s-item__title">Time Walk</div>
              <span class="s-item__price">$900.00</span>
              <span class="s-item__bids">3 bids</span>
              <span class="s-item__caption--signal">Sold  Oct 3, 2024</span>
            </div>"#;
        let listings = EbayExtractor.extract(page, &base(), QueryKind::Completed);
        assert_eq!(listings.len(), 1);
        assert_eq!(
            listings[0].completed_at,
            Some(Utc.with_ymd_and_hms(2024, 10, 3, 0, 0, 0).unwrap())
        );
        assert!(!listings[0].is_auction);
        assert_eq!(listings[0].bids, None);
    }

    #[test]
    fn test_parse_sold_date_formats() {
        assert_eq!(parse_sold_date("Sold Jan 15, 2025").map(|d| d.day()), Some(15));
        assert_eq!(parse_sold_date("2025-01-15").map(|d| d.month()), Some(1));
        assert!(parse_sold_date("2025-01-15T10:30:00Z").is_some());
        assert_eq!(parse_sold_date("Ended recently"), None);
        assert_eq!(parse_sold_date(""), None);
    }

    #[test]
    fn test_parse_seller_partial() {
        let seller = parse_seller("cardshop");
        assert_eq!(seller.name, "cardshop");
        assert_eq!(seller.total_sales, 0);
        assert_eq!(seller.rating, 0.0);
        assert_eq!(parse_seller(""), Seller::default());
    }
}
