//! Data models for wishwatch.

mod diff;
mod item;
mod wishlist;

pub use diff::{DiffResult, PriceChange};
pub use item::Item;
pub use wishlist::{normalize_list_url, parse_wishlists, WishlistConfig};
