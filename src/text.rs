//! Small text helpers shared by the renderer and the publisher.

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike};

/// Sheet-style timestamps we accept besides RFC 3339.
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &[
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// String form of an optional value; `None` becomes the empty string.
pub fn safe_text<T: std::fmt::Display>(v: Option<T>) -> String {
    match v {
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

fn is_path_hostile(c: char) -> bool {
    matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '#' | '%')
        || ('\u{0000}'..='\u{001F}').contains(&c)
}

/// Make a user supplied string safe to use as one remote path segment.
///
/// Hostile characters become `-`, surrounding whitespace is trimmed, and a result
/// that ends up empty is replaced by `"Unknown"`.
pub fn sanitize_path_segment(s: &str) -> String {
    let replaced: String = s
        .chars()
        .map(|c| if is_path_hostile(c) { '-' } else { c })
        .collect();
    let trimmed = replaced.trim();
    if trimmed.is_empty() {
        "Unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `YYYY-MM-DD_HHMM` from the value's own calendar fields.
pub fn format_date_for_filename<D: Datelike + Timelike>(d: &D) -> String {
    format!(
        "{:04}-{:02}-{:02}_{:02}{:02}",
        d.year(),
        d.month(),
        d.day(),
        d.hour(),
        d.minute()
    )
}

/// Parse a submission timestamp into wall-clock fields.
///
/// RFC 3339 values keep the fields of their own offset, so `10:15Z` stays `10:15`.
pub fn parse_submission_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}
