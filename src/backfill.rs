//! Backfill Module
//!
//! Finds gaps in the target site's recent readings and fills them with
//! entries held by the source site:
//! - Query the target for entry times since the start of the window
//! - Detect gaps of at least `sync.gap_minutes` (including an ongoing one)
//! - Pull the source's sensor entries and keep those inside a gap
//! - Fill in trend directions and device names, then upload

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};

use crate::api::NightscoutClient;
use crate::config::SyncConfig;
use crate::entry::Entry;
use crate::gaps::{self, Gap};
use crate::missing;
use crate::ordering;
use crate::time;
use crate::traits::Clock;
use crate::trend;

/// Summary of a completed backfill.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackfillSummary {
    pub gaps: Vec<Gap>,
    pub recovered: usize,
    pub uploaded: usize,
}

/// Moves readings from a source site into gaps on a target site.
pub struct Backfiller<C: Clock> {
    target: NightscoutClient,
    source: NightscoutClient,
    sync: SyncConfig,
    device: String,
    clock: C,
}

impl<C: Clock> Backfiller<C> {
    pub fn new(
        target: NightscoutClient,
        source: NightscoutClient,
        sync: SyncConfig,
        device: impl Into<String>,
        clock: C,
    ) -> Self {
        Self {
            target,
            source,
            sync,
            device: device.into(),
            clock,
        }
    }

    /// Gaps in the target's readings since `since`, most recent first.
    pub async fn find_gaps(&self, since: DateTime<Utc>) -> Result<Vec<Gap>> {
        let now = self.clock.now();
        let count = fetch_count(now - since);
        tracing::info!(
            minutes = (now - since).num_minutes(),
            site = %self.target.site(),
            "retrieving entry times"
        );

        let mut observed = self
            .target
            .entry_times_since(since, count)
            .await
            .context("Failed to retrieve target entry times")?;
        observed.sort_by(|a, b| b.date.cmp(&a.date));

        let times = gaps::search_times(now, observed.iter().map(|t| t.date), since);
        let found = gaps::find_gaps(&times, self.sync.min_gap());
        for gap in &found {
            tracing::info!(%gap, minutes = gap.duration().num_minutes(), "gap found");
        }
        Ok(found)
    }

    /// Find gaps since `since` and upload the source's readings that fill them.
    pub async fn run(&self, since: DateTime<Utc>) -> Result<BackfillSummary> {
        let gaps = self.find_gaps(since).await?;
        if gaps.is_empty() {
            tracing::info!("no gaps found");
            return Ok(BackfillSummary::default());
        }

        let fetched = self
            .source
            .sgv_entries()
            .await
            .context("Failed to retrieve source entries")?;
        tracing::info!(count = fetched.len(), site = %self.source.site(), "source entries retrieved");

        // Trends are computed against the full source history, so annotate
        // before narrowing down to the gaps.
        let mut source = ordering::sort_descending(&fetched);
        let annotated = trend::annotate(&mut source);
        tracing::debug!(annotated, "trend directions filled in");

        let mut recovered = missing::missing(&source, &gaps, self.sync.edge_margin());
        for entry in &mut recovered {
            self.normalize(entry);
        }
        tracing::info!(count = recovered.len(), "entries recovered");

        let uploaded = self
            .target
            .upload_entries(&recovered)
            .await
            .context("Failed to upload recovered entries")?;
        if uploaded > 0 {
            tracing::info!(uploaded, "entries uploaded");
        }

        Ok(BackfillSummary {
            gaps,
            recovered: recovered.len(),
            uploaded,
        })
    }

    fn normalize(&self, entry: &mut Entry) {
        if entry.device.as_deref().is_none_or(str::is_empty) {
            entry.device = Some(self.device.clone());
        }
        if entry.date_string.is_empty() {
            entry.date_string = time::date_string(entry.time());
        }
    }
}

/// Entries to request for a window: two per minute leaves headroom over the
/// usual five-minute sensor interval.
fn fetch_count(window: Duration) -> i64 {
    2 * window.num_minutes().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_count_is_two_per_minute() {
        assert_eq!(fetch_count(Duration::hours(24)), 2880);
        assert_eq!(fetch_count(Duration::minutes(35)), 70);
    }

    #[test]
    fn test_fetch_count_has_a_floor() {
        assert_eq!(fetch_count(Duration::zero()), 2);
        assert_eq!(fetch_count(Duration::seconds(-30)), 2);
    }
}
