//! Fetching and extracting wishlist pages.
//!
//! Layered leaf-first: [`PageSource`] does one GET, [`PageFetcher`] adds
//! retries and failure backoff, [`ItemExtractor`] turns a body into items,
//! and [`ListCollector`] walks the pages of one wishlist.

pub mod collector;
pub mod extract;
pub mod fetcher;
mod http_client;
pub mod pacing;
pub mod retry;

pub use collector::{CollectError, ListCollector};
pub use extract::{Continuation, ItemExtractor, PageExtract};
pub use fetcher::{FetchOutcome, PageFetcher};
pub use http_client::{resolve_user_agent, FetchError, HttpClient, PageSource, MOBILE_USER_AGENTS};
pub use pacing::{Cancelled, Pacer};
pub use retry::{Attempt, RetryError, RetryPolicy};
