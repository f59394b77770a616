//! Date ingestion.
//!
//! Every date read from the record store or a spreadsheet passes through
//! here so there is exactly one failure mode: malformed input becomes `None`
//! with a logged warning, never an error.

use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveDateTime};
use tracing::warn;

/// Plain calendar date formats written by the record store.
const ISO_DATE_FORMATS: &[&str] = &["%Y-%m-%d"];

/// Offset-less timestamp formats (legacy event log rows use the second one).
const ISO_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Day-first formats found in spreadsheet exports.
const DAY_FIRST_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%d/%m/%y"];

/// Largest serial day number a spreadsheet can hold (9999-12-31).
const MAX_SPREADSHEET_SERIAL: f64 = 2_958_465.0;

/// Parse an ISO-8601 instant.
///
/// A trailing `Z` is rewritten to `+00:00` before parsing. Offset-less
/// timestamps are read as UTC. Empty input is `None` silently; anything
/// else that does not parse is `None` with a warning.
pub fn parse_instant(raw: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = try_parse_instant(trimmed);
    if parsed.is_none() {
        warn!(value = trimmed, "unparseable timestamp, treating as missing");
    }
    parsed
}

/// Parse a store date (`YYYY-MM-DD` or any ISO instant) into a calendar date.
///
/// Empty input is `None` silently; malformed input is `None` with a warning.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = parse_iso_date(trimmed);
    if parsed.is_none() {
        warn!(value = trimmed, "unparseable date, treating as missing");
    }
    parsed
}

/// Parse an optional store date.
pub fn parse_date_opt(raw: Option<&str>) -> Option<NaiveDate> {
    raw.and_then(parse_date)
}

/// Parse a spreadsheet date cell using the day-first convention.
///
/// Accepts `dd/mm/yyyy` (optionally followed by a time), ISO dates, and
/// spreadsheet serial day numbers.
pub fn parse_day_first(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let date_part = trimmed.split_whitespace().next().unwrap_or(trimmed);
    let parsed = DAY_FIRST_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
        .or_else(|| parse_iso_date(trimmed))
        .or_else(|| parse_spreadsheet_serial(trimmed));

    if parsed.is_none() {
        warn!(value = trimmed, "unparseable spreadsheet date, treating as missing");
    }
    parsed
}

/// Format a date the way the record store expects it.
pub fn format_store_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Format a date for human-facing text (`dd/mm/yyyy`).
pub fn format_display_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Calendar date of a spreadsheet serial day number (1900 date system).
pub fn spreadsheet_serial_date(serial: f64) -> Option<NaiveDate> {
    if !(1.0..=MAX_SPREADSHEET_SERIAL).contains(&serial) {
        return None;
    }
    // Day 0 of the 1900 date system, adjusted for its phantom leap day.
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_days(Days::new(serial.trunc() as u64))
}

fn try_parse_instant(trimmed: &str) -> Option<DateTime<FixedOffset>> {
    let explicit = match trimmed.strip_suffix('Z').or_else(|| trimmed.strip_suffix('z')) {
        Some(head) => format!("{head}+00:00"),
        None => trimmed.to_string(),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&explicit) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(&explicit, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt);
    }

    ISO_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| naive.and_utc().fixed_offset())
}

fn parse_iso_date(trimmed: &str) -> Option<NaiveDate> {
    ISO_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .or_else(|| try_parse_instant(trimmed).map(|dt| dt.date_naive()))
}

fn parse_spreadsheet_serial(trimmed: &str) -> Option<NaiveDate> {
    spreadsheet_serial_date(trimmed.parse().ok()?)
}
