//! Snapshot diff results.

use super::Item;

/// A price movement on an item present in both snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceChange {
    pub name: Option<String>,
    pub identity_url: Option<String>,
    pub old_price: Option<String>,
    pub new_price: Option<String>,
}

/// Outcome of reconciling a stored snapshot with a fresh collection.
///
/// Buckets are ordered by identity key so the same inputs always render
/// the same notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    pub added: Vec<Item>,
    pub removed: Vec<Item>,
    pub changed: Vec<PriceChange>,
    /// Items matched in both sets with no reportable price change.
    pub unchanged: usize,
}

impl DiffResult {
    /// True when nothing worth notifying about happened.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}
