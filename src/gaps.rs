//! Detection of intervals with no readings.

use std::fmt;

use chrono::{DateTime, Duration, Utc};

use crate::time;

/// A stretch of time with no observed entries.
///
/// `finish` is the newer boundary, `start` the older one; both are
/// observed (or sentinel) instants and are not part of the gap itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub start: DateTime<Utc>,
    pub finish: DateTime<Utc>,
}

impl Gap {
    pub fn duration(&self) -> Duration {
        self.finish - self.start
    }

    /// Whether `time` lies strictly between the boundaries.
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.start < time && time < self.finish
    }
}

impl fmt::Display for Gap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format("%H:%M"),
            self.finish.format("%H:%M")
        )
    }
}

/// Build the instant list scanned by [`find_gaps`].
///
/// `now` is placed first so an ongoing gap is closed off, and `since` last
/// so a gap right after the start of the query window is found.
/// `observed` must already be newest first.
pub fn search_times<I>(now: DateTime<Utc>, observed: I, since: DateTime<Utc>) -> Vec<DateTime<Utc>>
where
    I: IntoIterator<Item = i64>,
{
    let observed = observed.into_iter();
    let mut times = Vec::with_capacity(observed.size_hint().0 + 2);
    times.push(now);
    times.extend(observed.map(time::to_timestamp));
    times.push(since);
    times
}

/// Find gaps of at least `min_gap` between adjacent instants.
///
/// `times` must be newest first. A pair is skipped when its older instant
/// is at or before the Unix epoch, which only shows up as an unset
/// placeholder. Gaps are returned in input order, most recent first.
pub fn find_gaps(times: &[DateTime<Utc>], min_gap: Duration) -> Vec<Gap> {
    let gaps: Vec<Gap> = times
        .windows(2)
        .filter_map(|pair| {
            let (cur, prev) = (pair[0], pair[1]);
            if is_placeholder(prev) {
                return None;
            }
            (cur - prev >= min_gap).then_some(Gap {
                start: prev,
                finish: cur,
            })
        })
        .collect();

    tracing::debug!(
        instants = times.len(),
        gaps = gaps.len(),
        "scanned for gaps"
    );
    gaps
}

fn is_placeholder(time: DateTime<Utc>) -> bool {
    time.timestamp_millis() <= 0
}
