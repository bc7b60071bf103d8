// assay-core/src/domain/rules/dates.rs

use chrono::format::{Item, ParseErrorKind, Parsed, StrftimeItems, parse};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::domain::error::DomainError;

// Formats tried, in order, when a rule does not pin one down.
const DEFAULT_FORMATS: [&str; 4] = [
    "%Y-%m-%d",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d",
];

// Display-style tokens, longest first.
const TOKENS: [(&str, &str); 8] = [
    ("YYYY", "%Y"),
    ("SSS", "%3f"),
    ("YY", "%y"),
    ("MM", "%m"),
    ("DD", "%d"),
    ("HH", "%H"),
    ("mm", "%M"),
    ("ss", "%S"),
];

/// Translates a `YYYY-MM-DD` style pattern into a strftime pattern.
/// Patterns already containing `%` are taken as strftime and returned unchanged.
pub fn to_strftime(format: &str) -> String {
    if format.contains('%') {
        return format.to_string();
    }

    let mut out = String::with_capacity(format.len() * 2);
    let mut rest = format;
    'scan: while !rest.is_empty() {
        for (token, replacement) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(replacement);
                rest = tail;
                continue 'scan;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

/// Checks a date format without any data, returning its strftime form.
pub fn compile_format(format: &str) -> Result<String, DomainError> {
    if format.trim().is_empty() {
        return Err(DomainError::parse("date format is empty"));
    }
    let strftime = to_strftime(format);
    if StrftimeItems::new(&strftime).any(|item| matches!(item, Item::Error)) {
        return Err(DomainError::parse(format!(
            "invalid date format '{}'",
            format
        )));
    }
    Ok(strftime)
}

/// True when `input` matches the (already compiled) strftime pattern entirely.
/// Patterns without a full date (`YYYY-MM`, times) only check the layout;
/// once year, month and day are all present they must name a real day.
pub fn matches_format(input: &str, strftime: &str) -> bool {
    let mut parsed = Parsed::new();
    if parse(&mut parsed, input, StrftimeItems::new(strftime)).is_err() {
        return false;
    }
    match parsed.to_naive_date() {
        Ok(_) => true,
        Err(e) => e.kind() == ParseErrorKind::NotEnough,
    }
}

/// Parses a date. With an explicit strftime pattern only that pattern is
/// accepted; otherwise ISO-like layouts and RFC 3339 are tried.
pub fn parse_date(input: &str, strftime: Option<&str>) -> Result<NaiveDate, DomainError> {
    let input = input.trim();
    let not_a_date = || DomainError::parse(format!("'{}' is not a valid date", input));

    if let Some(fmt) = strftime {
        if let Ok(d) = NaiveDate::parse_from_str(input, fmt) {
            return Ok(d);
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, fmt) {
            return Ok(dt.date());
        }
        return Err(not_a_date());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.date_naive());
    }
    for fmt in DEFAULT_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(input, fmt) {
            return Ok(d);
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, fmt) {
            return Ok(dt.date());
        }
    }
    Err(not_a_date())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_display_tokens_translate() {
        assert_eq!(to_strftime("YYYY-MM-DD"), "%Y-%m-%d");
        assert_eq!(to_strftime("DD/MM/YY HH:mm:ss"), "%d/%m/%y %H:%M:%S");
        assert_eq!(to_strftime("%d.%m.%Y"), "%d.%m.%Y");
    }

    #[test]
    fn test_default_layouts() -> Result<()> {
        let expected = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(parse_date("2024-02-29", None)?, expected);
        assert_eq!(parse_date("2024-02-29T10:15:00", None)?, expected);
        assert_eq!(parse_date("2024-02-29T10:15:00+02:00", None)?, expected);
        assert_eq!(parse_date("2024/02/29", None)?, expected);
        assert!(parse_date("2023-02-29", None).is_err());
        assert!(parse_date("yesterday", None).is_err());
        Ok(())
    }

    #[test]
    fn test_explicit_format() -> Result<()> {
        let fmt = compile_format("DD/MM/YYYY")?;
        assert_eq!(
            parse_date("31/12/2023", Some(&fmt))?,
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
        );
        assert!(parse_date("2023-12-31", Some(&fmt)).is_err());
        Ok(())
    }

    #[test]
    fn test_matches_format_accepts_partial_dates() -> Result<()> {
        let fmt = compile_format("YYYY-MM")?;
        assert!(matches_format("2024-05", &fmt));
        assert!(!matches_format("2024-05-01", &fmt));
        assert!(!matches_format("May 2024", &fmt));
        Ok(())
    }

    #[test]
    fn test_matches_format_rejects_impossible_days() -> Result<()> {
        let fmt = compile_format("YYYY-MM-DD")?;
        assert!(matches_format("2024-02-29", &fmt));
        assert!(!matches_format("2023-02-30", &fmt));
        assert!(!matches_format("2023-02-29", &fmt));
        assert!(!matches_format("2023-13-01", &fmt));
        assert!(!matches_format("2023-04-31", &fmt));

        let with_time = compile_format("DD/MM/YYYY HH:mm")?;
        assert!(matches_format("31/12/2023 23:59", &with_time));
        assert!(!matches_format("31/11/2023 10:00", &with_time));
        Ok(())
    }

    #[test]
    fn test_invalid_format_is_a_parse_error() {
        assert!(matches!(compile_format("%Y-%Q"), Err(DomainError::Parse(_))));
        assert!(matches!(compile_format("  "), Err(DomainError::Parse(_))));
    }
}
