//! Plain-text rendering of a wishlist diff.

use std::fmt::Write;

use crate::models::{DiffResult, Item};
use crate::utils::format_price;

/// Shown in place of a product link the page did not provide.
pub const MISSING_LINK: &str = "URL not found";

/// Render a diff into an email `(subject, body)` pair.
pub fn compose(wishlist_name: &str, wishlist_url: &str, diff: &DiffResult) -> (String, String) {
    let subject = format!("Wishlist Update: {}", wishlist_name);

    let mut body = String::new();
    writeln!(body, "Changes in '{}': {}", wishlist_name, wishlist_url).ok();
    writeln!(
        body,
        "Summary: {} added, {} removed, {} price changes, {} unchanged",
        diff.added.len(),
        diff.removed.len(),
        diff.changed.len(),
        diff.unchanged
    )
    .ok();

    if !diff.added.is_empty() {
        body.push_str("\n✅ Added:\n");
        for item in &diff.added {
            push_item_line(&mut body, item);
        }
    }

    if !diff.removed.is_empty() {
        body.push_str("\n❌ Removed:\n");
        for item in &diff.removed {
            push_item_line(&mut body, item);
        }
    }

    if !diff.changed.is_empty() {
        body.push_str("\n🔄 Price changes:\n");
        for change in &diff.changed {
            writeln!(
                body,
                "- {}: {} -> {} | {}",
                change.name.as_deref().unwrap_or(Item::UNTITLED),
                format_price(change.old_price.as_deref()),
                format_price(change.new_price.as_deref()),
                change.identity_url.as_deref().unwrap_or(MISSING_LINK)
            )
            .ok();
        }
    }

    (subject, body)
}

fn push_item_line(body: &mut String, item: &Item) {
    writeln!(
        body,
        "- {} | {} | {}",
        item.display_name(),
        format_price(item.price.as_deref()),
        item.identity_url.as_deref().unwrap_or(MISSING_LINK)
    )
    .ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceChange;

    #[test]
    fn test_compose_all_sections() {
        let diff = DiffResult {
            added: vec![Item::new(
                Some("Skillet".into()),
                Some("https://www.amazon.com/dp/B1".into()),
                Some("24.99".into()),
            )],
            removed: vec![Item::new(Some("Lamp".into()), None, Some("-Infinity".into()))],
            changed: vec![PriceChange {
                name: Some("Knife".into()),
                identity_url: Some("https://www.amazon.com/dp/B2".into()),
                old_price: Some("$100.00".into()),
                new_price: Some("$1,250.5".into()),
            }],
            unchanged: 4,
        };

        let (subject, body) = compose("Kitchen", "https://www.amazon.com/hz/wishlist/ls/X", &diff);
        assert_eq!(subject, "Wishlist Update: Kitchen");
        assert_eq!(
            body,
            "Changes in 'Kitchen': https://www.amazon.com/hz/wishlist/ls/X\n\
             Summary: 1 added, 1 removed, 1 price changes, 4 unchanged\n\
             \n✅ Added:\n\
             - Skillet | $24.99 | https://www.amazon.com/dp/B1\n\
             \n❌ Removed:\n\
             - Lamp | Not Available | URL not found\n\
             \n🔄 Price changes:\n\
             - Knife: $100.00 -> $1250.50 | https://www.amazon.com/dp/B2\n"
        );
    }

    #[test]
    fn test_compose_omits_empty_sections() {
        let diff = DiffResult {
            added: vec![Item::new(None, Some("u1".into()), None)],
            ..Default::default()
        };
        let (_, body) = compose("L", "url", &diff);
        assert!(body.contains("✅ Added:"));
        assert!(body.contains("- (untitled item) | Not Available | u1"));
        assert!(!body.contains("❌"));
        assert!(!body.contains("🔄"));
    }
}
