//! Local-calendar helpers for weekly grouping.
//!
//! All instants are stored in UTC; "local" always means the configured fixed
//! offset, so there are no DST gaps to worry about.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Timelike, Utc, Weekday};

/// Start of the current week: the most recent local Sunday at 00:00, as UTC
pub fn week_start(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    let local = now.with_timezone(&offset);
    let days_since_sunday = i64::from(local.weekday().num_days_from_sunday());
    let since_midnight = Duration::seconds(i64::from(local.num_seconds_from_midnight()))
        + Duration::nanoseconds(i64::from(local.nanosecond() % 1_000_000_000));

    now - Duration::days(days_since_sunday) - since_midnight
}

pub fn is_local_monday(now: DateTime<Utc>, offset: FixedOffset) -> bool {
    now.with_timezone(&offset).weekday() == Weekday::Mon
}

pub fn local_date(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}
