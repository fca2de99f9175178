//! Wishlist configuration entries.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

/// List id patterns on desktop wishlist URLs.
static LIST_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"/hz/wishlist/ls/([A-Za-z0-9]+)/?").unwrap(),
        Regex::new(r"/gp/registry/(?:wishlist|list)/([A-Za-z0-9]+)/?").unwrap(),
    ]
});

/// A named, URL-addressed wishlist to monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WishlistConfig {
    pub name: String,
    pub url: String,
}

impl WishlistConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Parse the comma-separated `name|url` (or bare `url`) wishlist list.
///
/// Blank entries are ignored and entries without a url are dropped.
pub fn parse_wishlists(raw: &str) -> Vec<WishlistConfig> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let wishlist = match entry.split_once('|') {
                Some((name, url)) => WishlistConfig::new(name.trim(), url.trim()),
                None => WishlistConfig::new(entry, entry),
            };
            if wishlist.url.is_empty() {
                warn!("Skipping wishlist '{}': no url configured", wishlist.name);
                None
            } else {
                Some(wishlist)
            }
        })
        .collect()
}

/// Rewrite desktop wishlist URLs to the lighter mobile list view.
///
/// URLs that do not carry a recognizable list id are returned unchanged.
pub fn normalize_list_url(url: &str, origin: &str) -> String {
    LIST_ID_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|id| {
            format!(
                "{}/gp/aw/ls?lid={}&ty=wishlist",
                origin.trim_end_matches('/'),
                id.as_str()
            )
        })
        .unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_named_and_bare_entries() {
        let lists = parse_wishlists(
            " Birthday | https://www.amazon.com/hz/wishlist/ls/ABC123 ,https://example.com/list,,",
        );
        assert_eq!(
            lists,
            vec![
                WishlistConfig::new("Birthday", "https://www.amazon.com/hz/wishlist/ls/ABC123"),
                WishlistConfig::new("https://example.com/list", "https://example.com/list"),
            ]
        );
    }

    #[test]
    fn test_splits_on_first_pipe_only() {
        let lists = parse_wishlists("Tools|https://example.com/a|b");
        assert_eq!(lists[0].url, "https://example.com/a|b");
    }

    #[test]
    fn test_drops_entries_without_url() {
        assert!(parse_wishlists("Empty|").is_empty());
        assert!(parse_wishlists("").is_empty());
    }

    #[test]
    fn test_normalizes_desktop_urls() {
        let origin = "https://www.amazon.com";
        assert_eq!(
            normalize_list_url("https://www.amazon.com/hz/wishlist/ls/3KXQ9Z?ref_=wl_share", origin),
            "https://www.amazon.com/gp/aw/ls?lid=3KXQ9Z&ty=wishlist"
        );
        assert_eq!(
            normalize_list_url("https://www.amazon.com/gp/registry/wishlist/1AB2C/", origin),
            "https://www.amazon.com/gp/aw/ls?lid=1AB2C&ty=wishlist"
        );
    }

    #[test]
    fn test_leaves_other_urls_alone() {
        let url = "https://www.amazon.com/gp/aw/ls?lid=XYZ&ty=wishlist";
        assert_eq!(normalize_list_url(url, "https://www.amazon.com/"), url);
    }
}
