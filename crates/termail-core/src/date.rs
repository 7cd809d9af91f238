use chrono::{DateTime, Local, TimeZone};

/// Seconds since the epoch for an RFC 2822 or RFC 3339 date string, 0 when unparseable.
///
/// The value drops the original timezone and is only used for ordering.
pub fn timestamp_for(date_str: &str) -> i64 {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return 0;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return dt.timestamp();
    }
    mailparse::dateparse(trimmed).unwrap_or(0)
}

/// Local-time rendering of a message date, falling back to the stored timestamp.
pub fn local_date(date_str: &str, fallback_ts: i64) -> Option<DateTime<Local>> {
    let ts = match timestamp_for(date_str) {
        0 => fallback_ts,
        ts => ts,
    };
    Local.timestamp_opt(ts, 0).single()
}

#[cfg(test)]
mod tests {
    use super::timestamp_for;

    #[test]
    fn parses_rfc2822_dates() {
        assert_eq!(timestamp_for("Tue, 03 Jan 2017 22:26:59 +0500"), 1483464419);
        assert_eq!(timestamp_for("3 Jan 2017 22:26:59 +0500"), 1483464419);
    }

    #[test]
    fn parses_rfc3339_dates() {
        assert_eq!(timestamp_for("2017-01-03T17:26:59Z"), 1483464419);
    }

    #[test]
    fn blank_dates_sort_first() {
        assert_eq!(timestamp_for(""), 0);
        assert_eq!(timestamp_for("   "), 0);
    }
}
