//! Shared utility functions.
//!
//! - `price`: parsing and canonical formatting of site price strings

mod price;

#[cfg(test)]
pub(crate) mod log_capture;

pub use price::{format_price, is_unknown_price, parse_price};
