//! Hour-bucket math and file naming.
//!
//! Hour files are named `YYYY-MM-DD-HH.bin`. The hour is **UTC** — fixed to
//! avoid DST ambiguity (see SPEC_FULL.md Open Question resolution in
//! DESIGN.md). A deployment that truly needs local time must be consistent
//! about it for its own directory; this crate only ever produces UTC names.

use chrono::{DateTime, Utc};

pub const SECONDS_PER_HOUR: i64 = 3600;
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// UTC hour bucket (seconds since epoch) that a nanosecond timestamp falls
/// into.
pub fn hour_start_for_ns(timestamp_ns: i64) -> i64 {
    let seconds = timestamp_ns.div_euclid(NANOS_PER_SECOND);
    seconds.div_euclid(SECONDS_PER_HOUR) * SECONDS_PER_HOUR
}

/// `YYYY-MM-DD-HH.bin` for an hour-start (seconds since epoch, UTC).
pub fn file_name_for_hour(hour_start: i64) -> String {
    let dt: DateTime<Utc> = DateTime::from_timestamp(hour_start, 0).unwrap_or_else(|| {
        DateTime::from_timestamp(0, 0).expect("epoch is representable")
    });
    format!("{}.bin", dt.format("%Y-%m-%d-%H"))
}

/// Convert the query API's seconds-since-epoch boundary to nanoseconds.
/// Both bounds are inclusive (§9 Open Question resolution).
pub fn seconds_to_ns(seconds: i64) -> i64 {
    seconds.saturating_mul(NANOS_PER_SECOND)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hour_bucket_is_floor_not_round() {
        let ts = 10 * SECONDS_PER_HOUR * NANOS_PER_SECOND + 59 * 60 * NANOS_PER_SECOND;
        assert_eq!(hour_start_for_ns(ts), 10 * SECONDS_PER_HOUR);
    }

    #[test]
    fn hour_bucket_handles_negative_timestamps() {
        // One second before the epoch still belongs to the hour ending at 0.
        assert_eq!(hour_start_for_ns(-1), -SECONDS_PER_HOUR);
    }

    #[test]
    fn file_name_format() {
        assert_eq!(file_name_for_hour(0), "1970-01-01-00.bin");
        assert_eq!(file_name_for_hour(SECONDS_PER_HOUR * 5), "1970-01-01-05.bin");
    }
}
