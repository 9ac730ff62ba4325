//! # Time Utilities
//!
//! Elapsed-duration math and formatting, plus the [`Clock`] seam that makes
//! "now" injectable.
//!
//! Durations are always recomputed from two absolute timestamps. Nothing in
//! this crate keeps a running counter, so a late or skipped tick can never
//! make a displayed duration drift.
//!
//! ```text
//!   start_time (immutable)            now
//!        │◄──────── elapsed_ms ────────►│
//!        │                              │
//!        └── clamp(< 0 → 0) ── format ──► "HH:MM:SS" (hours unbounded)
//! ```

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

// =============================================================================
// Elapsed Time
// =============================================================================

/// Milliseconds between `start` and `end`, clamped at zero.
///
/// Clock skew between the remote store and this host can put `end` before
/// `start`; that reads as zero elapsed time rather than a negative one.
pub fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_milliseconds().max(0)
}

/// Formats a millisecond duration as `HH:MM:SS`.
///
/// Each component is floored and zero-padded; hours keep growing past 24.
/// Negative input formats as `00:00:00`.
///
/// ```rust
/// use tabletime_core::time::format_elapsed;
///
/// assert_eq!(format_elapsed(5_400_000), "01:30:00");
/// assert_eq!(format_elapsed(90_000_000), "25:00:00");
/// assert_eq!(format_elapsed(-10), "00:00:00");
/// ```
pub fn format_elapsed(ms: i64) -> String {
    let total_secs = ms.max(0) / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Formats the clamped duration between two timestamps.
pub fn format_between(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format_elapsed(elapsed_ms(start, end))
}

// =============================================================================
// Clock
// =============================================================================

/// Source of the current wall-clock time.
///
/// Production code uses [`SystemClock`]; tests pin time with [`FixedClock`].
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The host's real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same instant, so a test can hand one clone to the engine
/// and advance another.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Moves the clock to an absolute instant.
    pub fn set(&self, now: DateTime<Utc>) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard = now;
    }

    /// Moves the clock forward (or backward, for skew tests).
    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 18, 0, 0).unwrap()
    }

    #[test]
    fn test_format_elapsed_floors_components() {
        assert_eq!(format_elapsed(0), "00:00:00");
        assert_eq!(format_elapsed(999), "00:00:00");
        assert_eq!(format_elapsed(61_999), "00:01:01");
        assert_eq!(format_elapsed(3_599_999), "00:59:59");
    }

    #[test]
    fn test_format_elapsed_hours_unbounded() {
        assert_eq!(format_elapsed(100 * 3_600_000), "100:00:00");
    }

    #[test]
    fn test_elapsed_ms_clamps_skew() {
        let start = t0();
        assert_eq!(elapsed_ms(start, start - Duration::seconds(30)), 0);
        assert_eq!(format_between(start, start - Duration::seconds(30)), "00:00:00");
        assert_eq!(elapsed_ms(start, start + Duration::milliseconds(1500)), 1500);
    }

    #[test]
    fn test_fixed_clock_shared_between_clones() {
        let clock = FixedClock::new(t0());
        let other = clock.clone();
        other.advance(Duration::minutes(5));
        assert_eq!(clock.now(), t0() + Duration::minutes(5));

        clock.set(t0());
        assert_eq!(other.now(), t0());
    }
}
