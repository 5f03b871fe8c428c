//! Timestamp parsing and formatting for the dump format
//!
//! The producer writes `2023-06-12 05:05:24+00`; older dumps and hand-made
//! fixtures use ISO 8601 with or without an offset. All of them are read as
//! UTC instants, and everything is written back in the producer's format.

use chrono::{DateTime, NaiveDateTime, Utc};

/// `%.f` prints nothing for whole seconds, so producer timestamps come back
/// unchanged while sub-second instants keep their fraction
const DUMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f+00";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
];

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M:%S%.f%#z",
];

/// Parse a producer timestamp into a UTC instant
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Format an instant the way the producer does
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format(DUMP_FORMAT).to_string()
}
