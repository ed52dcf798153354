//! Total orders over entries and the sort/trim helpers built on them.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::entry::Entry;
use crate::time;

/// Direction of an ordered entry sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// Oldest first; ties broken by ascending kind.
    #[default]
    Chronological,
    /// Newest first; ties broken by descending kind.
    ReverseChronological,
}

impl Order {
    /// Compare two entries in this order.
    pub fn compare(&self, a: &Entry, b: &Entry) -> Ordering {
        match self {
            Order::Chronological => chronological(a, b),
            Order::ReverseChronological => chronological(b, a),
        }
    }

    /// Whether `a` strictly precedes `b` in this order.
    pub fn precedes(&self, a: &Entry, b: &Entry) -> bool {
        self.compare(a, b) == Ordering::Less
    }

    /// Whether no adjacent pair of `entries` is out of order.
    pub fn is_sorted(&self, entries: &[Entry]) -> bool {
        entries
            .windows(2)
            .all(|pair| self.compare(&pair[0], &pair[1]) != Ordering::Greater)
    }
}

/// Chronological comparison: `date` first, then `kind`.
pub fn chronological(a: &Entry, b: &Entry) -> Ordering {
    a.date.cmp(&b.date).then(a.kind.cmp(&b.kind))
}

impl Entry {
    /// Whether `self` precedes `other` chronologically.
    pub fn before(&self, other: &Entry) -> bool {
        chronological(self, other) == Ordering::Less
    }
}

/// Return a chronologically sorted copy of `entries`.
pub fn sort_ascending(entries: &[Entry]) -> Vec<Entry> {
    sorted(entries, Order::Chronological)
}

/// Return a reverse-chronologically sorted copy of `entries`.
pub fn sort_descending(entries: &[Entry]) -> Vec<Entry> {
    sorted(entries, Order::ReverseChronological)
}

/// Return a stably sorted copy of `entries` in the given order.
pub fn sorted(entries: &[Entry], order: Order) -> Vec<Entry> {
    let mut v = entries.to_vec();
    v.sort_by(|a, b| order.compare(a, b));
    v
}

/// Entries strictly newer than `cutoff`, from a chronological sequence.
pub fn trim_after(entries: &[Entry], cutoff: DateTime<Utc>) -> &[Entry] {
    let d = time::to_epoch_millis(cutoff);
    let n = entries.partition_point(|e| e.date <= d);
    &entries[n..]
}

/// Entries not older than `cutoff`, from a reverse-chronological
/// sequence. An entry dated exactly at `cutoff` is kept.
pub fn trim_after_descending(entries: &[Entry], cutoff: DateTime<Utc>) -> &[Entry] {
    let d = time::to_epoch_millis(cutoff);
    let n = entries.partition_point(|e| e.date >= d);
    &entries[..n]
}
