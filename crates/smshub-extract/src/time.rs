//! Receive-time normalization: a total function from whatever a client
//! put in its time field to a UTC timestamp. Unparsable input falls back
//! to `now` rather than failing the ingestion.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Epoch values above this are implausible as seconds and are treated as
/// milliseconds (2,000,000,000 s ≈ year 2033).
const MS_THRESHOLD: i64 = 2_000_000_000;

/// Formats tried, in order, for non-numeric time strings.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Normalize a client-supplied time string against the supplied `now`.
///
/// - empty → `now`
/// - all decimal digits → epoch seconds (milliseconds when > 2,000,000,000)
/// - otherwise → RFC 3339 or one of a fixed list of formats
/// - anything else → `now`, silently
pub fn normalize_time(raw: &str, now: NaiveDateTime) -> NaiveDateTime {
    let raw = raw.trim();
    if raw.is_empty() {
        return now;
    }

    if raw.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(mut secs) = raw.parse::<i64>() {
            if secs > MS_THRESHOLD {
                secs /= 1000;
            }
            if let Some(dt) = DateTime::from_timestamp(secs, 0) {
                return dt.naive_utc();
            }
        }
        return now;
    }

    parse_datetime(raw).unwrap_or(now)
}

/// Try the supported textual date/time formats. Date-only input maps to
/// midnight of that day.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ndt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    None
}

/// Render a timestamp in the store's canonical `YYYY-MM-DD HH:MM:SS` form.
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn epoch_seconds() {
        let ts = normalize_time("1700000000", fixed_now());
        assert_eq!(format_timestamp(ts), "2023-11-14 22:13:20");
    }

    #[test]
    fn epoch_milliseconds_collapse_to_seconds() {
        let ts = normalize_time("1700000000000", fixed_now());
        assert_eq!(format_timestamp(ts), "2023-11-14 22:13:20");
    }

    #[test]
    fn threshold_is_exclusive() {
        // Exactly 2,000,000,000 is still seconds.
        let ts = normalize_time("2000000000", fixed_now());
        assert_eq!(format_timestamp(ts), "2033-05-18 03:33:20");
    }

    #[test]
    fn empty_falls_back_to_now() {
        assert_eq!(normalize_time("", fixed_now()), fixed_now());
        assert_eq!(normalize_time("   ", fixed_now()), fixed_now());
    }

    #[test]
    fn garbage_falls_back_to_now() {
        assert_eq!(normalize_time("not-a-date", fixed_now()), fixed_now());
        // Digits too large for i64 also fall back instead of erroring.
        assert_eq!(
            normalize_time("99999999999999999999999999", fixed_now()),
            fixed_now()
        );
    }

    #[test]
    fn textual_formats() {
        let ts = normalize_time("2024-05-01 08:30:00", fixed_now());
        assert_eq!(format_timestamp(ts), "2024-05-01 08:30:00");

        let ts = normalize_time("2024-05-01T08:30:00", fixed_now());
        assert_eq!(format_timestamp(ts), "2024-05-01 08:30:00");

        let ts = normalize_time("2024/05/01 08:30:00", fixed_now());
        assert_eq!(format_timestamp(ts), "2024-05-01 08:30:00");

        let ts = normalize_time("2024-05-01", fixed_now());
        assert_eq!(format_timestamp(ts), "2024-05-01 00:00:00");
    }

    #[test]
    fn rfc3339_converts_to_utc() {
        let ts = normalize_time("2024-05-01T10:30:00+02:00", fixed_now());
        assert_eq!(format_timestamp(ts), "2024-05-01 08:30:00");
    }
}
