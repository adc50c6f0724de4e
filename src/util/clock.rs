//! Timestamp helpers.
//!
//! Timestamps are persisted as signed Unix microseconds.

use time::macros::format_description;
use time::OffsetDateTime;

/// Sentinel used for placeholder entries so they sort after every real record.
pub fn far_future() -> OffsetDateTime {
    // 4001-01-01T00:00:00Z
    OffsetDateTime::from_unix_timestamp(64_092_211_200).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

/// Current wall-clock time truncated to microseconds.
pub fn now() -> OffsetDateTime {
    from_micros(to_micros(OffsetDateTime::now_utc()))
}

/// Unix microseconds for `ts`.
#[inline]
pub fn to_micros(ts: OffsetDateTime) -> i64 {
    (ts.unix_timestamp_nanos() / 1_000) as i64
}

/// Inverse of [`to_micros`]; out-of-range values clamp to the epoch.
pub fn from_micros(micros: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp_nanos(micros as i128 * 1_000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

/// `YYYY-MM-DD HH:MM:SS` in UTC.
pub fn format_timestamp(ts: OffsetDateTime) -> String {
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    ts.format(&fmt).unwrap_or_else(|_| ts.unix_timestamp().to_string())
}

/// Display name for records written before names were stored.
pub fn default_name(prefix: &str, ts: OffsetDateTime) -> String {
    format!("{} {}", prefix, format_timestamp(ts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_micros_roundtrip() {
        let ts = from_micros(1_700_000_000_123_456);
        assert_eq!(to_micros(ts), 1_700_000_000_123_456);
    }

    #[test]
    fn test_default_name() {
        let ts = OffsetDateTime::from_unix_timestamp(0).unwrap();
        assert_eq!(default_name("Scan", ts), "Scan 1970-01-01 00:00:00");
    }

    #[test]
    fn test_far_future_sorts_last() {
        assert!(far_future() > now());
        assert_eq!(far_future().year(), 4001);
    }
}
