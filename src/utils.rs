/// Utility functions for timestamp handling and formatting
use time::macros::format_description;
use time::OffsetDateTime;

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    let format = format_description!("[day].[month].[year] - [hour]:[minute]:[second]");
    dt.format(&format).unwrap_or_else(|_| dt.to_string())
}

/// Parse the callback `time` field (Unix epoch seconds) into a timestamp
///
/// Returns None for anything that is not an in-range integer.
pub fn parse_epoch_seconds(value: &str) -> Option<OffsetDateTime> {
    let seconds = value.trim().parse::<i64>().ok()?;
    OffsetDateTime::from_unix_timestamp(seconds).ok()
}
