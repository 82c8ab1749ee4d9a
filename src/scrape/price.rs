//! Free-text amount parsing for listing cards

use std::sync::LazyLock;

use regex::Regex;

static SYMBOL_PRICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[$£€]\s*(\d[\d,]*(?:\.\d+)?)").expect("valid price pattern"));

static EURO_SUFFIX_PRICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d[\d.]*(?:,\d+)?)\s*€").expect("valid euro pattern"));

static COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,]*").expect("valid count pattern"));

/// Parse the first currency-prefixed amount, e.g. `"$1,234.56 shipping"`
///
/// Returns 0 when nothing matches. A 0 means "unparsed", not "free".
pub fn extract_price(text: &str) -> f64 {
    SYMBOL_PRICE
        .captures(text)
        .and_then(|caps| caps[1].replace(',', "").parse().ok())
        .unwrap_or(0.0)
}

/// Parse a European formatted amount with a trailing euro sign, e.g. `"1.234,56 €"`
pub fn extract_euro_price(text: &str) -> f64 {
    EURO_SUFFIX_PRICE
        .captures(text)
        .and_then(|caps| caps[1].replace('.', "").replace(',', ".").parse().ok())
        .unwrap_or(0.0)
}

/// First integer in `text`, ignoring thousands separators, e.g. `"1,024 bids"`
pub fn extract_count(text: &str) -> Option<u64> {
    COUNT
        .find(text)
        .and_then(|m| m.as_str().replace(',', "").parse().ok())
}
