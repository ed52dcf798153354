//! Time source abstraction so gap searches can be tested deterministically.
//!
//! The "now" sentinel that closes an ongoing gap comes from a [`Clock`];
//! production code uses [`SystemClock`], tests pin the time with
//! [`MockClock`].

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

// ==================== Clock Trait ====================

/// Trait for abstracting time access.
pub trait Clock: Send + Sync {
    /// Get the current time in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// System clock implementation using real time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock clock for testing with controllable time.
///
/// Clones share the same underlying time, so a test can keep a handle
/// while the clock it passed into a [`crate::backfill::Backfiller`] is
/// advanced.
#[derive(Debug, Clone)]
pub struct MockClock {
    time: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a new mock clock set to the given time.
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: Arc::new(Mutex::new(time)),
        }
    }

    /// Set the mock clock to a new time.
    pub fn set_time(&self, time: DateTime<Utc>) {
        *self.lock() = time;
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: Duration) {
        let mut time = self.lock();
        *time += duration;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        // A poisoned lock still holds a valid timestamp.
        self.time.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }
}
