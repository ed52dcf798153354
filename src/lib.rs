//! Glucose Sync Library
//!
//! Nightscout entry handling: time conversion, ordering and merging of
//! entry sequences, gap detection in recorded readings, recovery of the
//! readings that fill them, and trend estimation by linear regression.

pub mod api;
pub mod backfill;
pub mod config;
pub mod entry;
pub mod gaps;
pub mod merge;
pub mod missing;
pub mod ordering;
pub mod regression;
pub mod time;
pub mod traits;
pub mod trend;

// Re-export commonly used types
pub use api::{ApiError, NightscoutClient};
pub use backfill::{BackfillSummary, Backfiller};
pub use config::{AppConfig, ConfigError};
pub use entry::{Entry, EntryKind, EntryTime, read_entries, write_entries};
pub use gaps::{Gap, find_gaps, search_times};
pub use merge::{merge, merge_entries};
pub use missing::missing;
pub use ordering::{Order, sort_ascending, sort_descending, sorted, trim_after, trim_after_descending};
pub use regression::{Line, Points, fit};
pub use time::{date_string, to_epoch_millis, to_timestamp};
pub use traits::{Clock, MockClock, SystemClock};
pub use trend::{Trend, TrendReport, annotate, evaluate, trend, trend_label};
