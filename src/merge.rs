//! Duplicate-free merge of two already-ordered entry sequences.

use crate::entry::Entry;
use crate::ordering::Order;

/// Merge two chronologically ordered sequences, dropping duplicates.
pub fn merge_entries(u: &[Entry], v: &[Entry]) -> Vec<Entry> {
    merge(u, v, Order::Chronological)
}

/// Merge two sequences that are both sorted in `order`.
///
/// The result is in the same order and contains each distinct entry of
/// `u` and `v` once. An entry is dropped when it equals the last one
/// emitted, so duplicates inside either input and across both inputs
/// collapse alike. Inputs that are not sorted in `order` give an
/// unspecified (but memory-safe) result.
pub fn merge(u: &[Entry], v: &[Entry], order: Order) -> Vec<Entry> {
    let mut merged: Vec<Entry> = Vec::with_capacity(u.len() + v.len());
    let mut push = |entry: &Entry| {
        if merged.last() != Some(entry) {
            merged.push(entry.clone());
        }
    };

    let (mut i, mut j) = (0, 0);
    while i < u.len() || j < v.len() {
        if j == v.len() || (i < u.len() && order.precedes(&u[i], &v[j])) {
            push(&u[i]);
            i += 1;
            continue;
        }
        if i == u.len() || order.precedes(&v[j], &u[i]) {
            push(&v[j]);
            j += 1;
            continue;
        }
        // Same position in the order: take both, the second is usually
        // dropped as a duplicate of the first.
        push(&u[i]);
        i += 1;
        push(&v[j]);
        j += 1;
    }

    tracing::trace!(
        left = u.len(),
        right = v.len(),
        merged = merged.len(),
        "merged entry sequences"
    );
    merged
}
