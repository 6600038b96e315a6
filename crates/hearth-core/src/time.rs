//! Timestamp helpers.
//!
//! All persisted timestamps are RFC 3339 strings in UTC (TEXT columns,
//! lexicographically sortable). These helpers centralize formatting and
//! the lenient parse used by temporal rules.

use chrono::{DateTime, Duration, Utc};

/// Current time as an RFC 3339 string.
#[must_use]
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// A timestamp `days` days in the past, RFC 3339.
#[must_use]
pub fn days_ago_rfc3339(days: i64) -> String {
    (Utc::now() - Duration::days(days)).to_rfc3339()
}

/// Parse a stored RFC 3339 timestamp.
///
/// Returns `None` on malformed input — temporal rules treat a row with
/// an unparseable timestamp as ineligible rather than failing the pass.
#[must_use]
pub fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Whether `value` lies more than `days` days in the past, comparing
/// the raw duration (30 days and 12 hours counts as more than 30
/// days). `None` if it cannot be parsed.
#[must_use]
pub fn older_than_days(value: &str, days: i64) -> Option<bool> {
    parse_rfc3339(value).map(|dt| Utc::now() - dt > Duration::days(days))
}

/// Whether `value` lies less than `days` days in the past. `None` if it
/// cannot be parsed.
#[must_use]
pub fn within_days(value: &str, days: i64) -> Option<bool> {
    parse_rfc3339(value).map(|dt| Utc::now() - dt < Duration::days(days))
}

/// Absolute distance between two timestamps in hours.
#[must_use]
pub fn hours_between(a: &str, b: &str) -> Option<i64> {
    let a = parse_rfc3339(a)?;
    let b = parse_rfc3339(b)?;
    Some((a - b).num_hours().abs())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
