//! Timestamp utilities
//!
//! Attendance outcomes are timestamped in UTC and displayed in a fixed
//! local offset (kiosks run in one site timezone, e.g. UTC+05:45).

use chrono::{DateTime, FixedOffset, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Build a fixed offset from minutes east of UTC
pub fn offset_from_minutes(minutes: i32) -> Result<FixedOffset> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| Error::InvalidInput(format!("UTC offset out of range: {} minutes", minutes)))
}

/// Short label for an offset, e.g. `UTC+05:45`
pub fn offset_label(offset: &FixedOffset) -> String {
    let total = offset.local_minus_utc() / 60;
    let sign = if total < 0 { '-' } else { '+' };
    let total = total.abs();
    format!("UTC{}{:02}:{:02}", sign, total / 60, total % 60)
}

/// Format a timestamp as `HH:MM` in the given offset, optionally with the zone label
pub fn format_clock(ts: &DateTime<Utc>, offset: &FixedOffset, show_zone: bool) -> String {
    let hhmm = ts.with_timezone(offset).format("%H:%M").to_string();
    if show_zone {
        format!("{} ({})", hhmm, offset_label(offset))
    } else {
        hhmm
    }
}

/// Like [`format_clock`], but renders a dash for a missing timestamp
pub fn format_clock_or_dash(ts: Option<&DateTime<Utc>>, offset: &FixedOffset, show_zone: bool) -> String {
    match ts {
        Some(ts) => format_clock(ts, offset, show_zone),
        None => "—".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
    }

    #[test]
    fn test_millis_to_duration() {
        assert_eq!(millis_to_duration(1000), Duration::from_secs(1));
        assert_eq!(millis_to_duration(0), Duration::ZERO);
    }

    #[test]
    fn test_format_clock_nepal_offset() {
        let offset = offset_from_minutes(345).unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 3, 0, 0).unwrap();

        assert_eq!(format_clock(&ts, &offset, false), "08:45");
        assert_eq!(format_clock(&ts, &offset, true), "08:45 (UTC+05:45)");
    }

    #[test]
    fn test_negative_offset_label() {
        let offset = offset_from_minutes(-210).unwrap();
        assert_eq!(offset_label(&offset), "UTC-03:30");
    }

    #[test]
    fn test_offset_out_of_range() {
        assert!(offset_from_minutes(24 * 60).is_err());
        assert!(offset_from_minutes(i32::MAX).is_err());
        assert!(offset_from_minutes(i32::MIN).is_err());
    }

    #[test]
    fn test_missing_timestamp_renders_dash() {
        let offset = offset_from_minutes(0).unwrap();
        assert_eq!(format_clock_or_dash(None, &offset, true), "—");
    }
}
