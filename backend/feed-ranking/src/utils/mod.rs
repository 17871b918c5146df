// Utility functions for feed ranking

use chrono::{DateTime, Datelike, Local, TimeZone, Utc};

pub const MS_PER_HOUR: i64 = 3_600_000;

/// Source of "now" for a ranking pass.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Wall clock of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant, for reproducible passes and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    pub fn at_millis(millis: i64) -> Self {
        Self(DateTime::from_timestamp_millis(millis).unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Age in hours between `created_at` and `now` (both epoch millis).
/// Timestamps in the future count as age zero.
pub fn hours_since(created_at: i64, now: i64) -> f64 {
    (now.saturating_sub(created_at) as f64 / MS_PER_HOUR as f64).max(0.0)
}

/// Linear decay from 1.0 at age zero down to `floor` at `horizon_hours`,
/// holding at `floor` afterwards.
pub fn linear_decay(age_hours: f64, horizon_hours: f64, floor: f64) -> f64 {
    (1.0 - (age_hours / horizon_hours) * (1.0 - floor)).max(floor)
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Start of the calendar month containing `now`, in host local time, as epoch millis.
pub fn month_start_millis(now: DateTime<Utc>) -> i64 {
    let local = now.with_timezone(&Local);
    Local
        .with_ymd_and_hms(local.year(), local.month(), 1, 0, 0, 0)
        .earliest()
        .map(|start| start.timestamp_millis())
        .or_else(|| {
            Utc.with_ymd_and_hms(local.year(), local.month(), 1, 0, 0, 0)
                .single()
                .map(|start| start.timestamp_millis())
        })
        .unwrap_or_else(|| now.timestamp_millis())
}
