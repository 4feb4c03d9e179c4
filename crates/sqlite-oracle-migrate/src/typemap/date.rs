//! Best-effort conversion of free-form date text into Oracle expressions.
//!
//! SQLite stores dates as text in whatever format the application chose.
//! [`parse_flexible_date`] tries a fixed list of formats and falls back to a
//! sentinel date or `SYSDATE` when nothing matches. The fallback is lossy: a
//! malformed date silently becomes a placeholder.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Expression used when the text looks like a date but cannot be parsed.
pub const FALLBACK_DATE: &str = "TO_DATE('2000-01-01', 'YYYY-MM-DD')";

/// Expression used when the text is empty or not date-like at all.
pub const CURRENT_DATE: &str = "SYSDATE";

/// Years below this are treated as mis-parses and the next format is tried.
const MIN_YEAR: i32 = 1900;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date-only formats, tried in order after the ISO forms.
const DATE_FORMATS: &[&str] = &[
    "%m/%d/%Y",
    "%m/%d/%y",
    "%d-%b-%Y",
    "%d %b %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%m.%d.%Y",
    "%d.%m.%Y",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%d/%m/%y",
    "%Y.%m.%d",
    "%y%m%d",
    "%d-%m-%y",
    "%m-%d-%y",
];

static DATE_SHAPED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\d{1,4}[-/. ]\d{1,2}[-/. ]\d{1,4}|\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\b",
    )
    .expect("valid regex")
});

/// Convert date text into an Oracle date expression.
///
/// Returns `TO_DATE('<iso>', '<mask>')` on success, [`FALLBACK_DATE`] for
/// date-shaped text that no format accepts, and [`CURRENT_DATE`] otherwise.
pub fn parse_flexible_date(text: &str) -> String {
    let cleaned = clean(text);
    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("null") {
        return CURRENT_DATE.to_string();
    }

    if let Ok(date) = NaiveDate::parse_from_str(&cleaned, "%Y-%m-%d") {
        if date.year() >= MIN_YEAR {
            return render_date(date);
        }
    }

    if let Ok(datetime) = NaiveDateTime::parse_from_str(&cleaned, DATETIME_FORMAT) {
        if datetime.year() >= MIN_YEAR {
            return format!(
                "TO_DATE('{}', 'YYYY-MM-DD HH24:MI:SS')",
                datetime.format(DATETIME_FORMAT)
            );
        }
    }

    for fmt in DATE_FORMATS {
        match NaiveDate::parse_from_str(&cleaned, fmt) {
            Ok(date) if date.year() >= MIN_YEAR => return render_date(date),
            Ok(date) => debug!("Rejected '{}' as {} (year {})", cleaned, fmt, date.year()),
            Err(_) => {}
        }
    }

    if DATE_SHAPED.is_match(&cleaned) {
        debug!("Unparsable date '{}', using fallback date", cleaned);
        FALLBACK_DATE.to_string()
    } else {
        debug!("Value '{}' is not a date, using SYSDATE", cleaned);
        CURRENT_DATE.to_string()
    }
}

fn clean(text: &str) -> String {
    text.trim()
        .trim_matches(|c| c == '\'' || c == '"' || c == ';' || c == ')')
        .trim()
        .replace(['\\', '\u{2013}'], "-")
}

fn render_date(date: NaiveDate) -> String {
    format!("TO_DATE('{}', 'YYYY-MM-DD')", date.format("%Y-%m-%d"))
}
