//! Canonical display order for agenda snapshots.
//!
//! Items sort by importance, highest first, then by creation time, oldest
//! first. ISO-8601 timestamps with a fixed offset compare correctly as plain
//! text, so `time` is compared lexicographically.

use std::cmp::Ordering;

use crate::domain::item::AgendaItem;

pub fn compare_items(left: &AgendaItem, right: &AgendaItem) -> Ordering {
    right.importance.cmp(&left.importance).then_with(|| left.time.cmp(&right.time))
}

/// Sorts in place. `sort_by` is stable, so items with equal importance and
/// time keep their scan order.
pub fn sort_items(items: &mut [AgendaItem]) {
    items.sort_by(compare_items);
}
