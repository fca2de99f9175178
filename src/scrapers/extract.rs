//! Wishlist page extraction.
//!
//! Understands both the mobile list view (`li#itemWrapper_*` rows) and the
//! desktop list view (`li.g-item-sortable` rows). Only the fields the
//! monitor compares are pulled out: title, canonical product link, price.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::models::Item;

/// Lower-cased phrases that mark an anti-automation challenge page.
pub const BLOCK_MARKERS: &[&str] = &[
    "captcha",
    "enter the characters you see",
    "type the characters you see",
];

static ROW_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("li[id^='itemWrapper_'], li.g-item-sortable").unwrap()
});
static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".awl-item-title, a[id^='itemName_']").unwrap());
static LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a.a-touch-link-image[href], a[id^='itemName_'][href]").unwrap()
});
static PRICE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.a-offscreen").unwrap());
static SHOW_MORE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input[name='showMoreUrl'][value]").unwrap());
static END_OF_LIST_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#endOfListMarker").unwrap());

/// How to reach the page after this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    /// Request the next page number of the same list.
    NextPage,
    /// Follow an explicit "show more" URL embedded in the page.
    Url(String),
}

/// Everything extracted from one page body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageExtract {
    pub items: Vec<Item>,
    pub continuation: Option<Continuation>,
    /// The body is a CAPTCHA/verification page rather than list content.
    pub blocked: bool,
}

/// Extracts items from list pages of one site.
#[derive(Debug, Clone)]
pub struct ItemExtractor {
    origin: Url,
}

impl ItemExtractor {
    /// Create an extractor resolving relative links against `origin`.
    pub fn new(origin: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            origin: Url::parse(origin)?,
        })
    }

    /// Site origin used for resolving links.
    pub fn origin(&self) -> &str {
        self.origin.as_str()
    }

    /// Extract items and the continuation from a page body.
    ///
    /// Challenge markers are only consulted when the page has no item rows;
    /// list pages routinely mention "captcha" in inline scripts.
    pub fn extract(&self, body: &str) -> PageExtract {
        let document = Html::parse_document(body);
        let items: Vec<Item> = document
            .select(&ROW_SELECTOR)
            .map(|row| self.extract_item(row))
            .collect();

        if items.is_empty() {
            return PageExtract {
                blocked: is_blocked(body),
                ..Default::default()
            };
        }

        PageExtract {
            continuation: self.continuation(&document),
            items,
            blocked: false,
        }
    }

    fn extract_item(&self, row: ElementRef<'_>) -> Item {
        let name = row
            .select(&TITLE_SELECTOR)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty());

        let identity_url = row
            .select(&LINK_SELECTOR)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| self.canonical_link(href));

        let price = row
            .value()
            .attr("data-price")
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .or_else(|| {
                row.select(&PRICE_SELECTOR)
                    .next()
                    .map(element_text)
                    .filter(|t| !t.is_empty())
            });

        Item::new(name, identity_url, price)
    }

    /// Resolve a product link to an absolute URL without query or fragment.
    pub fn canonical_link(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        let mut url = self.origin.join(href).ok()?;
        url.set_query(None);
        url.set_fragment(None);
        Some(url.to_string())
    }

    fn continuation(&self, document: &Html) -> Option<Continuation> {
        let show_more = document
            .select(&SHOW_MORE_SELECTOR)
            .next()
            .and_then(|input| input.value().attr("value"))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .and_then(|v| self.origin.join(v).ok());

        if let Some(url) = show_more {
            return Some(Continuation::Url(url.to_string()));
        }

        if document.select(&END_OF_LIST_SELECTOR).next().is_some() {
            None
        } else {
            Some(Continuation::NextPage)
        }
    }
}

/// Whether the body is an anti-automation challenge.
pub fn is_blocked(body: &str) -> bool {
    let lowered = body.to_lowercase();
    BLOCK_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Visible text of an element with whitespace collapsed.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build the URL for page `page` of a list by setting its `page` parameter.
pub fn page_url(list_url: &str, page: u32) -> Result<String, url::ParseError> {
    let mut url = Url::parse(list_url)?;
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair("page", &page.to_string());
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://www.amazon.com";

    fn extractor() -> ItemExtractor {
        ItemExtractor::new(ORIGIN).unwrap()
    }

    const MOBILE_PAGE: &str = r#"
        <html><body><ul>
          <li id="itemWrapper_I1" data-price="24.99">
            <a class="a-touch-link-image" href="/dp/B0001/?coliid=I1&ref_=lv_ov">img</a>
            <h3 class="awl-item-title">  Cast Iron
               Skillet </h3>
          </li>
          <li id="itemWrapper_I2">
            <a class="a-touch-link-image" href="https://www.amazon.com/dp/B0002?th=1">img</a>
            <span class="awl-item-title">Chef Knife</span>
            <span class="a-price"><span class="a-offscreen">$1,299.00</span></span>
          </li>
          <li id="itemWrapper_I3" data-price="-Infinity">
            <span class="awl-item-title">Unavailable Thing</span>
          </li>
          <li id="itemWrapper_I4"></li>
        </ul></body></html>
    "#;

    #[test]
    fn test_extracts_mobile_rows() {
        let page = extractor().extract(MOBILE_PAGE);
        assert!(!page.blocked);
        assert_eq!(page.items.len(), 4);

        assert_eq!(
            page.items[0],
            Item::new(
                Some("Cast Iron Skillet".into()),
                Some("https://www.amazon.com/dp/B0001/".into()),
                Some("24.99".into()),
            )
        );
        assert_eq!(
            page.items[1],
            Item::new(
                Some("Chef Knife".into()),
                Some("https://www.amazon.com/dp/B0002".into()),
                Some("$1,299.00".into()),
            )
        );
        assert_eq!(page.items[2].identity_url, None);
        assert_eq!(page.items[2].price.as_deref(), Some("-Infinity"));
        assert_eq!(page.items[3], Item::default());
        assert_eq!(page.continuation, Some(Continuation::NextPage));
    }

    #[test]
    fn test_extracts_desktop_rows() {
        let body = r#"
            <ul id="g-items">
              <li class="a-spacing-none g-item-sortable" data-price="15.5">
                <h2><a id="itemName_X1" href="/dp/B0009/ref=wl_it_dp?coliid=X1">Desk Lamp</a></h2>
              </li>
            </ul>
            <div id="endOfListMarker"></div>
        "#;
        let page = extractor().extract(body);
        assert_eq!(
            page.items,
            vec![Item::new(
                Some("Desk Lamp".into()),
                Some("https://www.amazon.com/dp/B0009/ref=wl_it_dp".into()),
                Some("15.5".into()),
            )]
        );
        assert_eq!(page.continuation, None);
    }

    #[test]
    fn test_show_more_continuation() {
        let body = r#"
            <li id="itemWrapper_A"><span class="awl-item-title">A</span></li>
            <input type="hidden" name="showMoreUrl"
                   value="/hz/wishlist/slv/items?filter=unpurchased&amp;paginationToken=abc">
        "#;
        let page = extractor().extract(body);
        assert_eq!(
            page.continuation,
            Some(Continuation::Url(
                "https://www.amazon.com/hz/wishlist/slv/items?filter=unpurchased&paginationToken=abc"
                    .to_string()
            ))
        );
    }

    #[test]
    fn test_blocked_page() {
        let body = "<html><form action='/errors/validateCaptcha'>\
                    Enter the characters you see below</form></html>";
        let page = extractor().extract(body);
        assert!(page.blocked);
        assert!(page.items.is_empty());
        assert_eq!(page.continuation, None);
    }

    #[test]
    fn test_marker_ignored_when_rows_present() {
        let body = r#"
            <script>var captchaHandler = null;</script>
            <li id="itemWrapper_A"><span class="awl-item-title">A</span></li>
        "#;
        let page = extractor().extract(body);
        assert!(!page.blocked);
        assert_eq!(page.items.len(), 1);
    }

    #[test]
    fn test_no_rows_means_no_continuation() {
        let page = extractor().extract("<html><body><p>Hello</p></body></html>");
        assert!(!page.blocked);
        assert!(page.items.is_empty());
        assert_eq!(page.continuation, None);
    }

    #[test]
    fn test_canonical_link() {
        let ex = extractor();
        assert_eq!(
            ex.canonical_link("/dp/B01?psc=1#reviews").as_deref(),
            Some("https://www.amazon.com/dp/B01")
        );
        assert_eq!(
            ex.canonical_link("https://smile.amazon.com/dp/B02?x=y").as_deref(),
            Some("https://smile.amazon.com/dp/B02")
        );
        assert_eq!(ex.canonical_link("   "), None);
    }

    #[test]
    fn test_page_url() {
        assert_eq!(
            page_url("https://www.amazon.com/gp/aw/ls?lid=ABC&ty=wishlist", 2).unwrap(),
            "https://www.amazon.com/gp/aw/ls?lid=ABC&ty=wishlist&page=2"
        );
        assert_eq!(
            page_url("https://www.amazon.com/gp/aw/ls?lid=ABC&page=2", 3).unwrap(),
            "https://www.amazon.com/gp/aw/ls?lid=ABC&page=3"
        );
        assert_eq!(
            page_url("https://example.com/list", 1).unwrap(),
            "https://example.com/list?page=1"
        );
    }
}
