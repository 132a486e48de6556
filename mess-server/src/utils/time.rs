//! Time helpers for business timezone conversion
//!
//! All date/time decisions (meal windows, attendance days, report slots)
//! happen in the configured business timezone; storage only ever sees `i64`
//! Unix millis.

use chrono::{NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use shared::error::{AppError, AppResult};

/// Parse a date string (YYYY-MM-DD)
pub fn parse_date(date: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("Invalid date format: {}", date)))
}

/// Calendar date of a millis timestamp in the business timezone
pub fn local_date(at_ms: i64, tz: Tz) -> NaiveDate {
    Utc.timestamp_millis_opt(at_ms)
        .single()
        .unwrap_or_else(Utc::now)
        .with_timezone(&tz)
        .date_naive()
}

/// Minutes since local midnight for a millis timestamp
pub fn minutes_of_day(at_ms: i64, tz: Tz) -> u32 {
    use chrono::Timelike;
    let local = Utc
        .timestamp_millis_opt(at_ms)
        .single()
        .unwrap_or_else(Utc::now)
        .with_timezone(&tz);
    local.hour() * 60 + local.minute()
}

/// Start of a local calendar day as Unix millis
///
/// DST gap fallback: if local midnight does not exist, fall back to UTC.
pub fn day_start_millis(date: NaiveDate, tz: Tz) -> i64 {
    let naive = date.and_hms_opt(0, 0, 0).unwrap();
    naive
        .and_local_timezone(tz)
        .latest()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| naive.and_utc().timestamp_millis())
}

/// End of a local calendar day: next day 00:00:00 as Unix millis
///
/// Callers use `< end` (exclusive) semantics.
pub fn day_end_millis(date: NaiveDate, tz: Tz) -> i64 {
    let next_day = date.succ_opt().unwrap_or(date);
    day_start_millis(next_day, tz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Asia::Kolkata;

    /// 2025-03-10 08:30:00 IST
    fn ist_millis(h: u32, m: u32) -> i64 {
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let naive = date.and_hms_opt(h, m, 0).unwrap();
        naive
            .and_local_timezone(Kolkata)
            .unwrap()
            .timestamp_millis()
    }

    #[test]
    fn test_parse_date() {
        assert!(parse_date("2025-03-10").is_ok());
        assert!(parse_date("10/03/2025").is_err());
    }

    #[test]
    fn test_minutes_of_day() {
        assert_eq!(minutes_of_day(ist_millis(8, 30), Kolkata), 510);
        assert_eq!(minutes_of_day(ist_millis(0, 0), Kolkata), 0);
        assert_eq!(minutes_of_day(ist_millis(23, 59), Kolkata), 1439);
    }

    #[test]
    fn test_local_date_crosses_utc_midnight() {
        // 01:00 IST is 19:30 UTC the previous day
        let at = ist_millis(1, 0);
        assert_eq!(
            local_date(at, Kolkata),
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
        );
    }

    #[test]
    fn test_day_bounds() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let start = day_start_millis(date, Kolkata);
        let end = day_end_millis(date, Kolkata);
        assert_eq!(end - start, 24 * 60 * 60 * 1000);
        assert!(start <= ist_millis(8, 30) && ist_millis(8, 30) < end);
    }
}
