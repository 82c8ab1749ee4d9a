use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marketplace a listing was scraped from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ebay,
    TcgPlayer,
    Cardmarket,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Ebay, Platform::TcgPlayer, Platform::Cardmarket];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ebay => "ebay",
            Platform::TcgPlayer => "tcgplayer",
            Platform::Cardmarket => "cardmarket",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ebay" => Some(Platform::Ebay),
            "tcgplayer" | "tcg" => Some(Platform::TcgPlayer),
            "cardmarket" | "mkm" => Some(Platform::Cardmarket),
            _ => None,
        }
    }

    /// Prefix used for this platform's environment variables
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Platform::Ebay => "SCRAPE_EBAY",
            Platform::TcgPlayer => "SCRAPE_TCGPLAYER",
            Platform::Cardmarket => "SCRAPE_CARDMARKET",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Seller details as shown on the listing card
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Seller {
    pub id: String,
    pub name: String,
    /// Positive feedback percentage, 0 when not shown
    pub rating: f64,
    pub total_sales: u64,
}

/// A single normalized marketplace listing
///
/// Built fresh from each scrape response. `bids` is only set for auctions and
/// `completed_at` only for sold-listing queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub id: String,
    pub title: String,
    /// Listed price; 0 means the price text could not be parsed
    pub price: f64,
    pub shipping: f64,
    pub condition: String,
    pub seller: Seller,
    pub platform: Platform,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub url: String,
    pub is_auction: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bids: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
}

impl ListingRecord {
    /// Price including shipping
    pub fn total_price(&self) -> f64 {
        self.price + self.shipping
    }

    /// Whether the listing's price text was recognised
    pub fn has_price(&self) -> bool {
        self.price > 0.0
    }
}
