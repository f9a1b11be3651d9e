//! Exchange-local trading calendar helpers.
//!
//! Provider timestamps are instants; the dashboard works on naive daily dates.
//! An instant becomes a date by shifting it by the exchange's UTC offset and
//! taking the calendar date. Without a reported offset, UTC is used.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};

/// Map a UNIX timestamp to the exchange-local calendar date.
///
/// Returns `None` for timestamps outside chrono's range. An out-of-range
/// offset (more than a day) falls back to UTC.
pub fn local_date(timestamp: i64, utc_offset_secs: Option<i32>) -> Option<NaiveDate> {
    let instant = DateTime::from_timestamp(timestamp, 0)?;
    let offset = utc_offset_secs
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix());
    Some(instant.with_timezone(&offset).date_naive())
}

/// Whether `date` lies in the half-open window `[start, end)`.
pub fn in_window(date: NaiveDate, start: NaiveDate, end: NaiveDate) -> bool {
    date >= start && date < end
}

/// The lookback window ending at `end`: `end - 365 * years` days to `end`.
pub fn lookback_window(end: NaiveDate, years: u32) -> (NaiveDate, NaiveDate) {
    let start = end - Duration::days(365 * i64::from(years));
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    // 2024-01-03T15:00:00Z
    const TS: i64 = 1_704_294_000;

    #[test]
    fn tokyo_bar_crosses_midnight() {
        assert_eq!(local_date(TS, Some(9 * 3600)), Some(d(2024, 1, 4)));
    }

    #[test]
    fn new_york_bar_stays_on_same_day() {
        assert_eq!(local_date(TS, Some(-5 * 3600)), Some(d(2024, 1, 3)));
    }

    #[test]
    fn missing_offset_uses_utc() {
        assert_eq!(local_date(TS, None), Some(d(2024, 1, 3)));
    }

    #[test]
    fn invalid_offset_uses_utc() {
        assert_eq!(local_date(TS, Some(200_000)), Some(d(2024, 1, 3)));
    }

    #[test]
    fn window_is_half_open() {
        let start = d(2024, 1, 2);
        let end = d(2024, 1, 5);
        assert!(in_window(start, start, end));
        assert!(in_window(d(2024, 1, 4), start, end));
        assert!(!in_window(end, start, end));
        assert!(!in_window(d(2024, 1, 1), start, end));
    }

    #[test]
    fn ten_year_lookback() {
        let (start, end) = lookback_window(d(2024, 6, 1), 10);
        assert_eq!(end, d(2024, 6, 1));
        assert_eq!((end - start).num_days(), 3650);
    }
}
