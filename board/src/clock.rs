//! Wall-clock time in the store's timestamp unit.

use time::OffsetDateTime;

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn unix_ms() -> i64 {
    i64::try_from(OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}
