pub mod check;
pub mod diff;
pub mod log;
pub mod refs;
pub mod show;
pub mod snapshot;

/// RFC 3339 rendering of a commit timestamp
pub fn format_time(timestamp_millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_millis)
        .map(|time| time.to_rfc3339())
        .unwrap_or_else(|| timestamp_millis.to_string())
}
