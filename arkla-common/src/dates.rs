//! Date normalization for extracted letter fields
//!
//! Scanned letters write dates in many ways ("12 Maret 2025", "12/03/2025",
//! "2025-03-12"). Everything stored in a `tgl_*` column is normalized to
//! `YYYY-MM-DD` when it can be parsed.

use chrono::{Datelike, NaiveDate};

/// Numeric layouts tried in order
///
/// chrono's `%Y` accepts any digit count, so every match is range-checked
/// against [`YEARS`] before it is taken.
const NUMERIC_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];

/// Only four-digit years are accepted
const YEARS: std::ops::RangeInclusive<i32> = 1000..=9999;

/// Month names (Indonesian and English, full and abbreviated) to month number
const MONTHS: &[(&str, u32)] = &[
    ("januari", 1),
    ("january", 1),
    ("jan", 1),
    ("februari", 2),
    ("february", 2),
    ("pebruari", 2),
    ("feb", 2),
    ("peb", 2),
    ("maret", 3),
    ("march", 3),
    ("mar", 3),
    ("april", 4),
    ("apr", 4),
    ("mei", 5),
    ("may", 5),
    ("juni", 6),
    ("june", 6),
    ("jun", 6),
    ("juli", 7),
    ("july", 7),
    ("jul", 7),
    ("agustus", 8),
    ("august", 8),
    ("agu", 8),
    ("agt", 8),
    ("aug", 8),
    ("september", 9),
    ("sept", 9),
    ("sep", 9),
    ("oktober", 10),
    ("october", 10),
    ("okt", 10),
    ("oct", 10),
    ("november", 11),
    ("nopember", 11),
    ("nov", 11),
    ("nop", 11),
    ("desember", 12),
    ("december", 12),
    ("des", 12),
    ("dec", 12),
];

/// Look up a month by name, ignoring case and a trailing period
pub fn month_from_name(name: &str) -> Option<u32> {
    let name = name.trim().trim_end_matches('.').to_lowercase();
    MONTHS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, month)| *month)
}

/// Parse a date written in any supported layout
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    for fmt in NUMERIC_FORMATS {
        match NaiveDate::parse_from_str(input, fmt) {
            Ok(date) if YEARS.contains(&date.year()) => return Some(date),
            _ => {}
        }
    }

    parse_named_month(input)
}

/// Normalize a date string to `YYYY-MM-DD`; `None` when nothing matches
pub fn normalize_date(input: &str) -> Option<String> {
    parse_date(input).map(|d| d.format("%Y-%m-%d").to_string())
}

/// `DD <Month> YYYY`, with spaces, hyphens or slashes as separators
fn parse_named_month(input: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = input
        .split(|c: char| c.is_whitespace() || c == '-' || c == '/' || c == ',')
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() != 3 {
        return None;
    }

    let day: u32 = parts[0].parse().ok()?;
    let month = month_from_name(parts[1])?;
    let year: i32 = parts[2].parse().ok()?;
    if !YEARS.contains(&year) {
        return None;
    }

    NaiveDate::from_ymd_opt(year, month, day)
}
