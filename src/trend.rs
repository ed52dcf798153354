//! Glucose trend arrows derived from the most recent sensor readings.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use thiserror::Error;

use crate::entry::Entry;
use crate::regression::{self, Points};

/// Maximum number of readings used for a trend.
pub const TREND_ENTRIES: usize = 4;

/// Nominal sensor sampling interval in minutes.
pub const SAMPLE_INTERVAL_MINUTES: i64 = 5;

const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// How far back from the newest reading the trend may look.
pub fn trend_window() -> Duration {
    Duration::minutes(TREND_ENTRIES as i64 * SAMPLE_INTERVAL_MINUTES)
}

/// Direction of glucose movement, using Nightscout's arrow names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trend {
    DoubleUp,
    SingleUp,
    FortyFiveUp,
    Flat,
    FortyFiveDown,
    SingleDown,
    DoubleDown,
}

impl Trend {
    pub const ALL: [Trend; 7] = [
        Trend::DoubleUp,
        Trend::SingleUp,
        Trend::FortyFiveUp,
        Trend::Flat,
        Trend::FortyFiveDown,
        Trend::SingleDown,
        Trend::DoubleDown,
    ];

    /// Classify a slope in glucose units per minute.
    pub fn from_slope(slope: f64) -> Self {
        if slope > 3.0 {
            Trend::DoubleUp
        } else if slope > 2.0 {
            Trend::SingleUp
        } else if slope > 1.0 {
            Trend::FortyFiveUp
        } else if slope >= -1.0 {
            Trend::Flat
        } else if slope >= -2.0 {
            Trend::FortyFiveDown
        } else if slope >= -3.0 {
            Trend::SingleDown
        } else {
            Trend::DoubleDown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::DoubleUp => "DoubleUp",
            Trend::SingleUp => "SingleUp",
            Trend::FortyFiveUp => "FortyFiveUp",
            Trend::Flat => "Flat",
            Trend::FortyFiveDown => "FortyFiveDown",
            Trend::SingleDown => "SingleDown",
            Trend::DoubleDown => "DoubleDown",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown trend direction: {0}")]
pub struct ParseTrendError(String);

impl FromStr for Trend {
    type Err = ParseTrendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Trend::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseTrendError(s.to_string()))
    }
}

/// Recent sensor readings with time measured in minutes from the newest.
struct History<'a> {
    entries: Vec<&'a Entry>,
    origin: i64,
}

impl Points for History<'_> {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn x(&self, i: usize) -> f64 {
        (self.entries[i].date - self.origin) as f64 / MILLIS_PER_MINUTE
    }

    fn y(&self, i: usize) -> f64 {
        self.entries[i].sgv.map_or(0.0, f64::from)
    }
}

/// Select the readings a trend is computed from.
///
/// Starts from the newest entry and adds older sensor readings until
/// [`TREND_ENTRIES`] are collected or one is more than [`trend_window`]
/// older than the newest.
fn history(entries: &[Entry]) -> History<'_> {
    let mut selected = Vec::with_capacity(TREND_ENTRIES);
    let Some(newest) = entries.first() else {
        return History {
            entries: selected,
            origin: 0,
        };
    };
    let limit = newest.time() - trend_window();

    selected.push(newest);
    for e in entries[1..].iter().filter(|e| has_reading(e)) {
        if selected.len() == TREND_ENTRIES {
            break;
        }
        if e.time() < limit {
            break;
        }
        // Equal dates would leave the regression without a defined slope.
        if selected.iter().any(|s| s.date == e.date) {
            continue;
        }
        selected.push(e);
    }

    History {
        entries: selected,
        origin: newest.date,
    }
}

fn has_reading(e: &Entry) -> bool {
    e.is_sgv() && e.sgv.is_some()
}

/// Compute the trend at the first of `entries`, which must be newest first.
///
/// Returns `None` when the newest entry is not a sensor reading or there
/// are not at least two usable readings within the window.
pub fn trend(entries: &[Entry]) -> Option<Trend> {
    let cur = entries.first()?;
    if !has_reading(cur) {
        return None;
    }
    let history = history(entries);
    if history.len() < 2 {
        return None;
    }
    Some(Trend::from_slope(regression::fit(&history).slope))
}

/// Like [`trend`], but as the label string; empty when unknown.
pub fn trend_label(entries: &[Entry]) -> &'static str {
    trend(entries).map_or("", |t| t.as_str())
}

/// Fill in `direction` on every sensor entry that lacks one.
///
/// `entries` must be newest first; each trend only looks at the entry and
/// those older than it. Returns the number of entries annotated.
pub fn annotate(entries: &mut [Entry]) -> usize {
    let mut annotated = 0;
    for i in 0..entries.len() {
        if !entries[i].is_sgv() || entries[i].direction.is_some() {
            continue;
        }
        if let Some(t) = trend(&entries[i..]) {
            entries[i].direction = Some(t.as_str().to_string());
            annotated += 1;
        }
    }
    annotated
}

/// A computed trend that disagrees with the recorded direction.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendMismatch {
    pub entry: Entry,
    pub computed: &'static str,
    pub recorded: String,
}

/// How well computed trends agree with the directions stored on entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrendReport {
    pub total: usize,
    pub wrong: usize,
    pub mismatches: Vec<TrendMismatch>,
}

impl TrendReport {
    /// Percentage of sensor entries whose trend matched, rounded down.
    pub fn percent_correct(&self) -> usize {
        if self.total == 0 {
            return 100;
        }
        100 * (self.total - self.wrong) / self.total
    }
}

/// Recompute the trend of every sensor entry and compare it with the
/// recorded `direction`. `entries` must be newest first.
pub fn evaluate(entries: &[Entry]) -> TrendReport {
    let mut report = TrendReport::default();
    for (i, e) in entries.iter().enumerate() {
        if !e.is_sgv() {
            continue;
        }
        report.total += 1;
        let computed = trend_label(&entries[i..]);
        let recorded = e.direction.as_deref().unwrap_or("");
        if computed != recorded {
            report.wrong += 1;
            report.mismatches.push(TrendMismatch {
                entry: e.clone(),
                computed,
                recorded: recorded.to_string(),
            });
        }
    }
    tracing::debug!(
        total = report.total,
        wrong = report.wrong,
        "evaluated recorded trends"
    );
    report
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::entry::EntryKind;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 6, 30, 12, 0, 0).unwrap()
    }

    /// Sensor entries five minutes apart, newest first.
    fn sgv_entries(values: &[u16]) -> Vec<Entry> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| Entry::sgv(noon() - Duration::minutes(5 * i as i64), v, "test"))
            .collect()
    }

    #[test]
    fn test_reference_trends() {
        let cases = [
            (&[126, 108, 93, 79], 3.12, Trend::DoubleUp),
            (&[108, 93, 79, 77], 2.14, Trend::SingleUp),
            (&[141, 135, 126, 121], 1.38, Trend::FortyFiveUp),
            (&[102, 98, 97, 99], 0.2, Trend::Flat),
            (&[82, 87, 93, 99], -1.14, Trend::FortyFiveDown),
            (&[117, 117, 129, 147], -2.04, Trend::SingleDown),
            (&[117, 129, 147, 164], -3.18, Trend::DoubleDown),
        ];
        for (values, slope, expected) in cases {
            let entries = sgv_entries(values);
            let history = history(&entries);
            let actual = regression::fit(&history).slope;
            assert!(
                (actual - slope).abs() < 1e-9,
                "{}: slope {}, want {}",
                expected,
                actual,
                slope
            );
            assert_eq!(trend(&entries), Some(expected));
            assert_eq!(trend_label(&entries), expected.as_str());
        }
    }

    #[test]
    fn test_slope_thresholds() {
        assert_eq!(Trend::from_slope(3.01), Trend::DoubleUp);
        assert_eq!(Trend::from_slope(3.0), Trend::SingleUp);
        assert_eq!(Trend::from_slope(2.0), Trend::FortyFiveUp);
        assert_eq!(Trend::from_slope(1.0), Trend::Flat);
        assert_eq!(Trend::from_slope(-1.0), Trend::Flat);
        assert_eq!(Trend::from_slope(-1.01), Trend::FortyFiveDown);
        assert_eq!(Trend::from_slope(-2.0), Trend::FortyFiveDown);
        assert_eq!(Trend::from_slope(-3.0), Trend::SingleDown);
        assert_eq!(Trend::from_slope(-3.01), Trend::DoubleDown);
    }

    #[test]
    fn test_newest_not_a_sensor_reading() {
        let mut entries = sgv_entries(&[120, 110, 100]);
        entries.insert(0, Entry::mbg(noon() + Duration::minutes(1), 118, "meter"));
        assert_eq!(trend(&entries), None);
        assert_eq!(trend_label(&entries), "");
    }

    #[test]
    fn test_empty_and_single_entry() {
        assert_eq!(trend(&[]), None);
        assert_eq!(trend(&sgv_entries(&[120])), None);
    }

    #[test]
    fn test_window_limits_history() {
        let newest = Entry::sgv(noon(), 150, "test");
        let stale = Entry::sgv(noon() - Duration::minutes(21), 100, "test");
        assert_eq!(trend(&[newest.clone(), stale]), None);

        let edge = Entry::sgv(noon() - Duration::minutes(20), 80, "test");
        assert_eq!(trend(&[newest, edge]), Some(Trend::DoubleUp));
    }

    #[test]
    fn test_window_is_measured_from_newest_reading() {
        // Each step is 8 minutes, but the last one is 24 minutes from the newest.
        let entries: Vec<Entry> = [0, 8, 16, 24]
            .into_iter()
            .map(|m| Entry::sgv(noon() - Duration::minutes(m), 100, "test"))
            .collect();
        let history = history(&entries);
        assert_eq!(history.len(), 3);
        assert_eq!(history.entries.last().map(|e| e.time()), Some(noon() - Duration::minutes(16)));
    }

    #[test]
    fn test_history_holds_at_most_four_readings() {
        let entries = sgv_entries(&[100, 100, 100, 100, 10]);
        assert_eq!(history(&entries).len(), TREND_ENTRIES);
        assert_eq!(trend(&entries), Some(Trend::Flat));
    }

    #[test]
    fn test_non_sensor_entries_are_skipped() {
        let mut entries = sgv_entries(&[126, 108, 93, 79]);
        entries.insert(2, Entry::new(EntryKind::Cal, noon() - Duration::minutes(7)));
        entries.insert(1, Entry::mbg(noon() - Duration::minutes(2), 60, "meter"));
        assert_eq!(history(&entries).len(), 4);
        assert_eq!(trend(&entries), Some(Trend::DoubleUp));
    }

    #[test]
    fn test_duplicate_dates_do_not_break_the_fit() {
        let mut entries = sgv_entries(&[126, 108]);
        let dup = entries[0].clone();
        entries.insert(1, dup);
        assert_eq!(history(&entries).len(), 2);
        assert!(trend(&entries).is_some());

        let same_instant = vec![entries[0].clone(), entries[0].clone()];
        assert_eq!(trend(&same_instant), None);
    }

    #[test]
    fn test_parse_and_display() {
        for t in Trend::ALL {
            assert_eq!(t.to_string().parse::<Trend>(), Ok(t));
        }
        assert!("Sideways".parse::<Trend>().is_err());
    }

    #[test]
    fn test_annotate_fills_missing_directions() {
        let mut entries = sgv_entries(&[126, 108, 93, 79]);
        entries[1].direction = Some("SingleUp".to_string());

        let count = annotate(&mut entries);
        // The oldest entry has no predecessor, so no trend.
        assert_eq!(count, 2);
        assert_eq!(entries[0].direction.as_deref(), Some("DoubleUp"));
        assert_eq!(entries[1].direction.as_deref(), Some("SingleUp"));
        assert!(entries[2].direction.is_some());
        assert_eq!(entries[3].direction, None);
    }

    #[test]
    fn test_evaluate_counts_mismatches() {
        let mut entries = sgv_entries(&[126, 108, 93, 79]);
        annotate(&mut entries);
        entries[2].direction = Some("Flat".to_string());
        entries.insert(1, Entry::mbg(noon() - Duration::minutes(1), 110, "meter"));

        let report = evaluate(&entries);
        // Four sensor entries; the oldest has no trend and no direction.
        assert_eq!(report.total, 4);
        assert_eq!(report.wrong, 1);
        assert_eq!(report.mismatches[0].recorded, "Flat");
        assert_eq!(report.percent_correct(), 75);
    }

    #[test]
    fn test_evaluate_empty() {
        let report = evaluate(&[]);
        assert_eq!(report.total, 0);
        assert_eq!(report.percent_correct(), 100);
    }
}
