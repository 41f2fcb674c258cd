// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Set difference of found and existing registrations.
//!
//! Both sides are keyed by the logical identity of a registration, never by
//! full equality:
//!
//! ```text
//! remove    = existing - found
//! add       = found - existing
//! unchanged = existing ∩ found   (paired with the found record)
//! ```
//!
//! Duplicate keys on either side collapse to the first occurrence.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// Result of diffing found against existing records.
#[derive(Debug)]
pub struct Diff<T> {
    /// Existing records that were not found.
    pub remove: Vec<T>,
    /// Found records that do not exist yet.
    pub add: Vec<T>,
    /// Existing records that were found again, with the found record.
    pub unchanged: Vec<(T, T)>,
}

impl<T> Default for Diff<T> {
    fn default() -> Self {
        Self {
            remove: Vec::new(),
            add: Vec::new(),
            unchanged: Vec::new(),
        }
    }
}

/// Diffs `found` against `existing` using `key` as identity.
pub fn diff<T, K, F>(existing: Vec<T>, found: Vec<T>, key: F) -> Diff<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut found_by_key: HashMap<K, T> = HashMap::with_capacity(found.len());
    let mut found_order: Vec<K> = Vec::with_capacity(found.len());
    for item in found {
        let k = key(&item);
        if !found_by_key.contains_key(&k) {
            found_order.push(key(&item));
            found_by_key.insert(k, item);
        }
    }

    let mut result = Diff::default();
    let mut seen: HashSet<K> = HashSet::with_capacity(existing.len());
    for item in existing {
        let k = key(&item);
        if seen.contains(&k) {
            continue;
        }
        match found_by_key.remove(&k) {
            Some(found) => result.unchanged.push((item, found)),
            None => result.remove.push(item),
        }
        seen.insert(k);
    }
    for k in found_order {
        if let Some(item) = found_by_key.remove(&k) {
            result.add.push(item);
        }
    }
    result
}

/// Counters of one reconciliation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Records created.
    pub added: usize,
    /// Records patched.
    pub updated: usize,
    /// Records disabled or deleted.
    pub removed: usize,
    /// Records left alone, including failed items.
    pub unchanged: usize,
}

impl ReconcileReport {
    /// Returns `true` if the sweep created or removed anything.
    #[inline]
    pub fn has_structural_changes(&self) -> bool {
        self.added != 0 || self.removed != 0
    }

    /// Returns `true` if the sweep changed anything.
    #[inline]
    pub fn has_changes(&self) -> bool {
        self.has_structural_changes() || self.updated != 0
    }

    /// Returns the number of items processed.
    pub fn total(&self) -> usize {
        self.added + self.updated + self.removed + self.unchanged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        key: &'static str,
        value: u32,
    }

    fn item(key: &'static str, value: u32) -> Item {
        Item { key, value }
    }

    #[test]
    fn test_diff_classifies_by_key() {
        let existing = vec![item("a", 1), item("b", 1)];
        let found = vec![item("b", 2), item("c", 1)];
        let diff = diff(existing, found, |i| i.key);

        assert_eq!(diff.remove, vec![item("a", 1)]);
        assert_eq!(diff.add, vec![item("c", 1)]);
        assert_eq!(diff.unchanged, vec![(item("b", 1), item("b", 2))]);
    }

    #[test]
    fn test_duplicates_collapse_to_first() {
        let existing = vec![item("a", 1), item("a", 2)];
        let found = vec![item("b", 1), item("b", 2), item("a", 3)];
        let diff = diff(existing, found, |i| i.key);

        assert!(diff.remove.is_empty());
        assert_eq!(diff.add, vec![item("b", 1)]);
        assert_eq!(diff.unchanged, vec![(item("a", 1), item("a", 3))]);
    }

    #[test]
    fn test_report_flags() {
        let mut report = ReconcileReport::default();
        assert!(!report.has_changes());
        report.updated = 1;
        assert!(report.has_changes());
        assert!(!report.has_structural_changes());
        report.removed = 1;
        assert!(report.has_structural_changes());
        assert_eq!(report.total(), 2);
    }
}
