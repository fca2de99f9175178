//! Wishlist item model.

use serde::{Deserialize, Serialize};

/// One listing on a wishlist, as scraped from a list page.
///
/// All fields are optional because the markup is not guaranteed to carry
/// them. Prices are kept in the site's own formatting; see
/// [`crate::utils::parse_price`] for the numeric view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Item title.
    pub name: Option<String>,
    /// Canonical absolute product link (query string stripped).
    #[serde(rename = "url")]
    pub identity_url: Option<String>,
    /// Site-formatted price text.
    pub price: Option<String>,
}

impl Item {
    /// Display placeholder for items without a title.
    pub const UNTITLED: &'static str = "(untitled item)";

    pub fn new(
        name: Option<String>,
        identity_url: Option<String>,
        price: Option<String>,
    ) -> Self {
        Self {
            name,
            identity_url,
            price,
        }
    }

    /// Key used to match this item across snapshots.
    ///
    /// The link wins over the name. Returns `None` when neither is present
    /// (or both are empty); such items cannot be matched and are always
    /// treated as new.
    pub fn identity_key(&self) -> Option<&str> {
        non_empty(self.identity_url.as_deref()).or_else(|| non_empty(self.name.as_deref()))
    }

    /// Name for display, with a placeholder when the title is missing.
    pub fn display_name(&self) -> &str {
        non_empty(self.name.as_deref()).unwrap_or(Self::UNTITLED)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
