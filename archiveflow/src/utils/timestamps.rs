//! Timestamp helpers for artifact naming and event records.

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// A source of "now", injectable so file names can be made deterministic.
pub type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

/// Format used in artifact file names: `YYYYMMDD-HHMMSS`.
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Returns a clock backed by the system time.
#[must_use]
pub fn system_clock() -> Clock {
    Arc::new(now_utc)
}

/// Returns a clock that always reports `at`.
#[must_use]
pub fn fixed_clock(at: Timestamp) -> Clock {
    Arc::new(move || at)
}

/// Formats a timestamp with second precision for use in file names.
///
/// The stamp is always UTC, whatever the host's local zone.
///
/// # Examples
///
/// ```
/// use archiveflow::utils::file_timestamp;
/// use chrono::{TimeZone, Utc};
///
/// let ts = Utc.with_ymd_and_hms(2014, 3, 9, 17, 5, 42).unwrap();
/// assert_eq!(file_timestamp(&ts), "20140309-170542");
/// ```
#[must_use]
pub fn file_timestamp(ts: &Timestamp) -> String {
    ts.format(FILE_TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_file_timestamp_is_utc() {
        let local = chrono::FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2014, 3, 9, 19, 5, 42)
            .unwrap();
        assert_eq!(file_timestamp(&local.with_timezone(&Utc)), "20140309-170542");
    }

    #[test]
    fn test_file_timestamp_zero_pads() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(file_timestamp(&ts), "20240102-030405");
    }

    #[test]
    fn test_file_timestamp_drops_subseconds() {
        let ts = Utc.timestamp_opt(1_700_000_000, 999_000_000).unwrap();
        assert_eq!(file_timestamp(&ts), "20231114-221320");
    }

    #[test]
    fn test_fixed_clock() {
        let at = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap();
        let clock = fixed_clock(at);
        assert_eq!(clock(), at);
        assert_eq!(clock(), at);
    }

    #[test]
    fn test_system_clock_advances() {
        let clock = system_clock();
        let first = clock();
        let second = clock();
        assert!(second >= first);
    }
}
