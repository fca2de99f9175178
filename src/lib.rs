//! wishwatch - wishlist monitor.
//!
//! Periodically scrapes public wishlists, diffs them against the last
//! reported snapshot and emails additions, removals and price changes.

pub mod config;
pub mod models;
pub mod scrapers;
pub mod services;
pub mod storage;
pub mod utils;
