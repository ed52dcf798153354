//! Recovery of entries that fall inside detected gaps.

use chrono::Duration;

use crate::entry::Entry;
use crate::gaps::Gap;

/// Collect the entries that fill `gaps`.
///
/// Both `entries` and `gaps` must be newest first. An entry is taken when
/// it lies more than `margin` inside both boundaries of a gap; entries
/// closer to a boundary most likely duplicate the reading that bounds the
/// gap. One cursor walks `entries` across all gaps and never rewinds, so
/// each entry is examined at most once.
pub fn missing(entries: &[Entry], gaps: &[Gap], margin: Duration) -> Vec<Entry> {
    let mut found = Vec::new();
    let mut i = 0;

    for gap in gaps {
        let newest = gap.finish - margin;
        let oldest = gap.start + margin;

        while i < entries.len() && entries[i].time() >= newest {
            i += 1;
        }
        while i < entries.len() && entries[i].time() > oldest {
            found.push(entries[i].clone());
            i += 1;
        }
    }

    tracing::debug!(
        gaps = gaps.len(),
        candidates = entries.len(),
        found = found.len(),
        "recovered entries inside gaps"
    );
    found
}
