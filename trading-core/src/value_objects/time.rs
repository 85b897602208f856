use chrono::{DateTime, SecondsFormat, Utc};

/// Render a millisecond timestamp as ISO 8601 with millisecond precision.
///
/// Returns `None` for timestamps chrono cannot represent.
pub fn iso8601(timestamp_ms: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso8601() {
        assert_eq!(
            iso8601(1_590_779_594_547).as_deref(),
            Some("2020-05-29T19:13:14.547Z")
        );
        assert_eq!(iso8601(0).as_deref(), Some("1970-01-01T00:00:00.000Z"));
    }
}
