//! Time and timestamp helpers.
//!
//! Wall-clock times (workout start/end, device last-seen) are
//! [`chrono::DateTime<Utc>`]. Sample keys are microseconds since the Unix
//! epoch (`i64`), stamped through [`MonotonicStamper`] so that two samples
//! can never share a key even when the wall clock jitters backwards.

use chrono::{DateTime, Utc};

/// UTC timestamp used for workout start/end, device last-seen, event times.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Return the current UTC time as microseconds since the Unix epoch.
#[must_use]
pub fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

/// Convert a microsecond sample key back into a [`Timestamp`].
///
/// Returns `None` for values outside chrono's representable range.
#[must_use]
pub fn from_micros(micros: i64) -> Option<Timestamp> {
    DateTime::from_timestamp_micros(micros)
}

/// Issues strictly increasing microsecond timestamps.
///
/// `stamp` returns `max(now, last + 1)`, so the sequence is strictly
/// monotonic even if the wall clock stalls or regresses. This is what keeps
/// the `(workout_id, t)` primary key collision-free downstream.
#[derive(Debug, Default)]
pub struct MonotonicStamper {
    last: i64,
}

impl MonotonicStamper {
    /// Create a stamper that has issued nothing yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp the given wall-clock reading, bumping by 1 µs on collision
    /// or regression.
    pub fn stamp(&mut self, now_us: i64) -> i64 {
        let stamped = now_us.max(self.last + 1);
        self.last = stamped;
        stamped
    }

    /// The most recently issued timestamp, or 0 if none yet.
    #[must_use]
    pub fn last(&self) -> i64 {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_pass_through_increasing_wall_clock() {
        let mut stamper = MonotonicStamper::new();
        assert_eq!(stamper.stamp(1_000), 1_000);
        assert_eq!(stamper.stamp(2_000), 2_000);
    }

    #[test]
    fn should_bump_by_one_microsecond_on_identical_reading() {
        let mut stamper = MonotonicStamper::new();
        assert_eq!(stamper.stamp(1_000), 1_000);
        assert_eq!(stamper.stamp(1_000), 1_001);
        assert_eq!(stamper.stamp(1_000), 1_002);
    }

    #[test]
    fn should_bump_on_wall_clock_regression() {
        let mut stamper = MonotonicStamper::new();
        assert_eq!(stamper.stamp(5_000), 5_000);
        assert_eq!(stamper.stamp(3_000), 5_001);
    }

    #[test]
    fn should_roundtrip_micros_through_timestamp() {
        let us = now_micros();
        let ts = from_micros(us).unwrap();
        assert_eq!(ts.timestamp_micros(), us);
    }
}
