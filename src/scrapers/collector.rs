//! Multi-page collection of one wishlist.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::extract::{page_url, Continuation, ItemExtractor};
use super::fetcher::{FetchOutcome, PageFetcher};
use super::pacing::{Cancelled, Pacer};
use crate::models::{normalize_list_url, Item, WishlistConfig};

/// Hard stop for runaway pagination.
pub const MAX_PAGES: u32 = 200;

/// Characters of a raw body included in structural-failure logs.
const SNIPPET_LEN: usize = 300;

/// Why a wishlist could not be collected this cycle.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("page {page} failed after {attempts} attempts")]
    Exhausted { page: u32, attempts: u32 },

    #[error("blocked by a verification challenge on page {page}")]
    Blocked { page: u32 },

    #[error("page {page} had no items and no challenge marker")]
    Structural { page: u32 },

    #[error("invalid list url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("shutdown requested")]
    Cancelled,
}

impl From<Cancelled> for CollectError {
    fn from(_: Cancelled) -> Self {
        CollectError::Cancelled
    }
}

/// Drives the fetcher and extractor across the pages of one wishlist.
pub struct ListCollector<'a> {
    fetcher: PageFetcher<'a>,
    extractor: &'a ItemExtractor,
    pacer: &'a Pacer,
    page_delay: Duration,
    blocked_delay: Duration,
    dump_dir: Option<PathBuf>,
}

impl<'a> ListCollector<'a> {
    pub fn new(
        fetcher: PageFetcher<'a>,
        extractor: &'a ItemExtractor,
        pacer: &'a Pacer,
        page_delay: Duration,
        blocked_delay: Duration,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            pacer,
            page_delay,
            blocked_delay,
            dump_dir: None,
        }
    }

    /// Write raw bodies of structurally unexpected pages into `dir`.
    pub fn with_dump_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.dump_dir = dir;
        self
    }

    /// Collect every item of a wishlist, deduplicated by identity key.
    ///
    /// Any failed, blocked or structurally empty first page aborts the whole
    /// collection so the caller keeps its previous snapshot.
    pub async fn collect(
        &self,
        wishlist: &WishlistConfig,
        user_agent: &str,
    ) -> Result<Vec<Item>, CollectError> {
        let list_url = normalize_list_url(&wishlist.url, self.extractor.origin());
        if list_url != wishlist.url {
            info!("Using mobile URL: {}", list_url);
        }

        let invalid = |source: url::ParseError| CollectError::InvalidUrl {
            url: list_url.clone(),
            source,
        };

        let mut page = 1;
        let mut url = page_url(&list_url, page).map_err(invalid)?;
        let mut seen: HashSet<String> = HashSet::new();
        let mut items: Vec<Item> = Vec::new();

        loop {
            self.pacer.check()?;

            let body = match self.fetcher.fetch(&url, user_agent).await {
                FetchOutcome::Success(body) => body,
                FetchOutcome::Failed { attempts } => {
                    return Err(CollectError::Exhausted { page, attempts })
                }
                FetchOutcome::Cancelled => return Err(CollectError::Cancelled),
            };

            let extract = self.extractor.extract(&body);

            if extract.blocked {
                warn!(page, "CAPTCHA detected on page {} of '{}'", page, wishlist.name);
                self.pacer
                    .pause(self.blocked_delay, "after CAPTCHA challenge")
                    .await?;
                return Err(CollectError::Blocked { page });
            }

            if extract.items.is_empty() {
                if page == 1 {
                    warn!(
                        page,
                        "Unexpected empty HTML for '{}': {}",
                        wishlist.name,
                        snippet(&body)
                    );
                    self.dump_body(&wishlist.name, &body);
                    self.pacer
                        .pause(self.blocked_delay, "after unexpected page structure")
                        .await?;
                    return Err(CollectError::Structural { page });
                }
                info!(page, "No items found on page {}", page);
                break;
            }

            let found = extract.items.len();
            let new_items = accumulate(&mut seen, &mut items, extract.items);
            debug!(page, "Page {}: {} rows, {} new", page, found, new_items);

            if new_items == 0 {
                info!(page, "Page {} repeated already-seen items; stopping", page);
                break;
            }

            let Some(continuation) = extract.continuation else {
                break;
            };

            if page >= MAX_PAGES {
                warn!(
                    "Stopping '{}' at page limit {}; list may be incomplete",
                    wishlist.name, MAX_PAGES
                );
                break;
            }

            self.pacer
                .pause(
                    self.page_delay,
                    &format!("after retrieving page {} (found {} items)", page, found),
                )
                .await?;

            page += 1;
            url = match continuation {
                Continuation::NextPage => page_url(&list_url, page).map_err(invalid)?,
                Continuation::Url(next) => next,
            };
        }

        info!(
            "Collected {} items from '{}' across {} pages",
            items.len(),
            wishlist.name,
            page
        );
        Ok(items)
    }

    fn dump_body(&self, name: &str, body: &str) {
        let Some(dir) = &self.dump_dir else {
            return;
        };
        let safe_name: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let path = dir.join(format!(
            "{}-{}.html",
            safe_name,
            Utc::now().format("%Y%m%dT%H%M%S")
        ));

        let written = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, body));
        match written {
            Ok(()) => info!("Saved unexpected page to {}", path.display()),
            Err(e) => warn!("Failed to save page dump {}: {}", path.display(), e),
        }
    }
}

/// Append items whose identity key has not been seen yet.
///
/// Returns how many identifiable items were new. Items without any
/// identity key are always kept but never count as progress.
fn accumulate(seen: &mut HashSet<String>, items: &mut Vec<Item>, page_items: Vec<Item>) -> usize {
    let mut new_items = 0;
    for item in page_items {
        match item.identity_key() {
            Some(key) => {
                if seen.insert(key.to_string()) {
                    items.push(item);
                    new_items += 1;
                }
            }
            None => items.push(item),
        }
    }
    new_items
}

/// First characters of a body with whitespace collapsed, for logs.
fn snippet(body: &str) -> String {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(SNIPPET_LEN).collect()
}
