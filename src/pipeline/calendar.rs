//! Calendar decomposition of epoch-millisecond timestamps
//!
//! All values are computed in UTC.

use arrow::array::{ArrayRef, Int32Array, Int64Array, StringArray, TimestampSecondArray};
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::sync::Arc;

/// Timezone attached to derived `start_time` values
pub const TIMEZONE: &str = "UTC";

/// Calendar attributes of one instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarParts {
    /// Seconds since the epoch, truncated
    pub start_time: i64,
    pub hour: i32,
    pub day: i32,
    /// ISO-8601 week number
    pub week: i32,
    pub month: i32,
    pub year: i32,
    /// English three-letter abbreviation
    pub weekday: String,
}

/// Decompose an epoch-millisecond timestamp
///
/// Returns `None` when the instant is outside the representable range.
pub fn decompose(ts_ms: i64) -> Option<CalendarParts> {
    let seconds = ts_ms / 1000;
    let instant: DateTime<Utc> = DateTime::from_timestamp(seconds, 0)?;

    Some(CalendarParts {
        start_time: seconds,
        hour: instant.hour() as i32,
        day: instant.day() as i32,
        week: instant.iso_week().week() as i32,
        month: instant.month() as i32,
        year: instant.year(),
        weekday: instant.format("%a").to_string(),
    })
}

/// Column-wise calendar attributes for a timestamp column
#[derive(Debug, Clone)]
pub struct CalendarColumns {
    pub start_time: ArrayRef,
    pub hour: ArrayRef,
    pub day: ArrayRef,
    pub week: ArrayRef,
    pub month: ArrayRef,
    pub year: ArrayRef,
    pub weekday: ArrayRef,
}

impl CalendarColumns {
    /// Decompose every value of `ts`; null timestamps give null attributes
    pub fn from_millis(ts: &Int64Array) -> Self {
        let parts: Vec<Option<CalendarParts>> =
            ts.iter().map(|value| value.and_then(decompose)).collect();

        let ints = |f: fn(&CalendarParts) -> i32| -> ArrayRef {
            Arc::new(Int32Array::from_iter(
                parts.iter().map(|p| p.as_ref().map(f)),
            ))
        };

        Self {
            start_time: Arc::new(
                TimestampSecondArray::from_iter(
                    parts.iter().map(|p| p.as_ref().map(|p| p.start_time)),
                )
                .with_timezone(TIMEZONE),
            ),
            hour: ints(|p| p.hour),
            day: ints(|p| p.day),
            week: ints(|p| p.week),
            month: ints(|p| p.month),
            year: ints(|p| p.year),
            weekday: Arc::new(StringArray::from_iter(
                parts.iter().map(|p| p.as_ref().map(|p| p.weekday.as_str())),
            )),
        }
    }
}
