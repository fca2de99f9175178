//! Price string handling.
//!
//! Prices are stored exactly as the site renders them ("$1,299.99",
//! "12.34", or the "-Infinity" sentinel the mobile list uses for items
//! with no offer). Numbers are only derived when comparing or displaying.

use std::str::FromStr;

use rust_decimal::Decimal;

/// Placeholder rendered for missing or non-numeric prices.
pub const PRICE_NOT_AVAILABLE: &str = "Not Available";

/// True for the site's "no price" sentinels.
pub fn is_unknown_price(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    lowered.is_empty() || lowered.contains("infinity") || lowered.contains("nan")
}

/// Parse a site price into an exact decimal, ignoring currency symbols and
/// thousands separators. Returns `None` for sentinels and anything that
/// does not contain a number.
pub fn parse_price(raw: &str) -> Option<Decimal> {
    if is_unknown_price(raw) {
        return None;
    }

    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    Decimal::from_str(&cleaned).ok()
}

/// Render a price as `$12.34`, or `Not Available` when it cannot be parsed.
pub fn format_price(raw: Option<&str>) -> String {
    match raw.and_then(parse_price) {
        Some(value) => format!("${:.2}", value.round_dp(2)),
        None => PRICE_NOT_AVAILABLE.to_string(),
    }
}
