//! Snapshot reconciliation.
//!
//! Diffs a stored item set against a freshly collected one. Items are
//! matched by identity key; price movements are only reported when they
//! reach the configured percentage threshold, except when a price cannot
//! be read as a number, in which case the change is always reported.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::warn;

use crate::models::{DiffResult, Item, PriceChange};
use crate::utils::parse_price;

/// Verdict on one matched item's price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceComparison {
    /// Identical price text, or the same amount written differently.
    Same,
    /// Numeric move of `pct` percent, at or above the threshold.
    Changed { pct: Decimal },
    /// Numeric move of `pct` percent, below the threshold.
    BelowThreshold { pct: Decimal },
    /// At least one side is missing, a sentinel, or not a number.
    Unparseable,
}

impl PriceComparison {
    pub fn is_reportable(&self) -> bool {
        matches!(self, Self::Changed { .. } | Self::Unparseable)
    }
}

/// Compare two site price strings against a percentage threshold.
///
/// Amounts are compared as exact decimals: a move is reported when
/// `|new - old| * 100 >= threshold * |old|`, and always when `old` is zero.
pub fn compare_prices(old: Option<&str>, new: Option<&str>, threshold_pct: f64) -> PriceComparison {
    if old == new {
        return PriceComparison::Same;
    }

    let (Some(old_value), Some(new_value)) = (old.and_then(parse_price), new.and_then(parse_price))
    else {
        return PriceComparison::Unparseable;
    };

    let delta = (new_value - old_value).abs();
    if delta.is_zero() {
        return PriceComparison::Same;
    }

    let threshold = Decimal::try_from(threshold_pct).unwrap_or(Decimal::MAX);
    let base = old_value.abs();
    if base.is_zero() {
        return verdict(Decimal::ONE_HUNDRED >= threshold, Decimal::ONE_HUNDRED);
    }

    let Some(scaled_delta) = delta.checked_mul(Decimal::ONE_HUNDRED) else {
        return PriceComparison::Changed { pct: Decimal::MAX };
    };
    let pct = scaled_delta.checked_div(base).unwrap_or(Decimal::MAX);
    // Cross-multiplied so the boundary does not depend on division rounding.
    let reached = threshold
        .checked_mul(base)
        .is_some_and(|required| scaled_delta >= required);
    verdict(reached, pct)
}

fn verdict(reached: bool, pct: Decimal) -> PriceComparison {
    if reached {
        PriceComparison::Changed { pct }
    } else {
        PriceComparison::BelowThreshold { pct }
    }
}

/// Index items by identity key, first occurrence wins.
fn by_identity(items: &[Item]) -> BTreeMap<&str, &Item> {
    let mut map = BTreeMap::new();
    for item in items {
        if let Some(key) = item.identity_key() {
            map.entry(key).or_insert(item);
        }
    }
    map
}

/// Diff the previous snapshot against a fresh collection.
///
/// Items with no identity key in `new` are always reported as added;
/// such items in `old` can never be matched and are ignored.
pub fn diff(old: &[Item], new: &[Item], threshold_pct: f64) -> DiffResult {
    let old_map = by_identity(old);
    let new_map = by_identity(new);
    let mut result = DiffResult::default();

    for (key, item) in &new_map {
        if !old_map.contains_key(key) {
            result.added.push((*item).clone());
        }
    }
    result.added.extend(
        new.iter()
            .filter(|item| item.identity_key().is_none())
            .cloned(),
    );

    for (key, item) in &old_map {
        if !new_map.contains_key(key) {
            result.removed.push((*item).clone());
        }
    }

    for (key, new_item) in &new_map {
        let Some(old_item) = old_map.get(key) else {
            continue;
        };

        let comparison = compare_prices(
            old_item.price.as_deref(),
            new_item.price.as_deref(),
            threshold_pct,
        );
        if comparison == PriceComparison::Unparseable {
            warn!(
                price_fail_open = true,
                old_price = ?old_item.price,
                new_price = ?new_item.price,
                "Price for {} is not numeric; reporting change unconditionally",
                key
            );
        }

        if comparison.is_reportable() {
            result.changed.push(PriceChange {
                name: new_item.name.clone(),
                identity_url: new_item.identity_url.clone(),
                old_price: old_item.price.clone(),
                new_price: new_item.price.clone(),
            });
        } else {
            result.unchanged += 1;
        }
    }

    result
}
