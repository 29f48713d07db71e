use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Utc};

/// All schedule comparisons run in a fixed campus zone, never the host's
/// local zone. Deployments pin Asia/Kolkata.
pub const CAMPUS_TZ_NAME: &str = "Asia/Kolkata";
pub const CAMPUS_UTC_OFFSET_SECS: i64 = 5 * 3600 + 30 * 60;

/// Wall-clock date/time on campus for a given UTC instant.
pub fn to_campus(now: DateTime<Utc>) -> NaiveDateTime {
    now.naive_utc() + Duration::seconds(CAMPUS_UTC_OFFSET_SECS)
}

pub fn campus_now() -> NaiveDateTime {
    to_campus(Utc::now())
}

/// A scheduled slot in the timetable's `"HH:MM - HH:MM"` notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    /// Parses `"09:00 - 10:30"`. Whitespace around the dash is optional.
    pub fn parse(raw: &str) -> Option<TimeRange> {
        let (start, end) = raw.split_once('-')?;
        let start = NaiveTime::parse_from_str(start.trim(), "%H:%M").ok()?;
        let end = NaiveTime::parse_from_str(end.trim(), "%H:%M").ok()?;
        Some(TimeRange { start, end })
    }
}

/// Sort key for timetable ordering; unparsable slots sort first so a bad
/// row is visible at the top rather than silently dropped.
pub fn start_of(raw: &str) -> NaiveTime {
    TimeRange::parse(raw)
        .map(|r| r.start)
        .unwrap_or(NaiveTime::MIN)
}
