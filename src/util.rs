// Utility helpers for parsing, formatting, and basic statistics.
//
// This module centralizes the "dirty" CSV/date/text handling so the rest of
// the code can assume clean, typed values.
use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};

/// Date formats accepted from raw exports, tried in order.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse a string-like value into a `NaiveDate` while being forgiving about
/// the formats that show up in spreadsheet exports.
///
/// - Accepts `Option<&str>` so callers can pass through optional fields.
/// - Trims whitespace.
/// - Tries each format in `DATE_FORMATS`.
/// - Returns `None` for anything unparseable; a bad date is a coercion to
///   "missing", never an error.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Title-case free text word by word (`"on hold"` -> `"On Hold"`).
///
/// Used as the fallback for status values outside the known vocabulary, so
/// unmapped statuses come out consistently cased instead of being dropped.
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Arithmetic mean of whole-day durations; `None` for an empty slice so an
/// empty group stays "undefined" rather than becoming 0 or NaN.
pub fn mean_days(v: &[i64]) -> Option<f64> {
    if v.is_empty() {
        return None;
    }
    let sum: i64 = v.iter().copied().sum();
    Some(sum as f64 / v.len() as f64)
}

/// Render an optional value for table previews: the value itself, or an
/// empty cell for `None`.
pub fn display_option<T: std::fmt::Display>(o: &Option<T>) -> String {
    match o {
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Thin wrapper around `num-format` for integer-like values. This is used
    // for counts in console messages (e.g., `9,855 rows loaded`).
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_common_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(parse_date_safe(Some("2024-01-05")), Some(expected));
        assert_eq!(parse_date_safe(Some(" 2024/01/05 ")), Some(expected));
        assert_eq!(parse_date_safe(Some("01/05/2024")), Some(expected));
    }

    #[test]
    fn parse_date_coerces_garbage_to_none() {
        assert_eq!(parse_date_safe(None), None);
        assert_eq!(parse_date_safe(Some("")), None);
        assert_eq!(parse_date_safe(Some("not a date")), None);
        assert_eq!(parse_date_safe(Some("2024-13-40")), None);
    }

    #[test]
    fn title_case_normalizes_word_casing() {
        assert_eq!(title_case("on hold"), "On Hold");
        assert_eq!(title_case("LOST"), "Lost");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn mean_days_is_none_for_empty_input() {
        assert_eq!(mean_days(&[]), None);
        assert_eq!(mean_days(&[2, 4]), Some(3.0));
    }
}
