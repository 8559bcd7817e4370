//! Cell values and the coercion rules that turn raw text into database-safe
//! primitives.
//!
//! Every cell flowing from the reader to the statement builder is a [`Value`].
//! The reader only produces [`Value::Null`] and [`Value::String`]; the
//! normalizer turns date columns into [`Value::Date`]; [`coerce_value`]
//! finalizes the remaining text cells right before insertion.

use std::fmt;

use anyhow::{Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime};

/// Tokens treated as missing data, matched after trimming.
pub const NULL_SENTINELS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const DAY_FIRST_DATE_FORMATS: &[&str] = &[
    "%d.%m.%Y", "%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d",
];

const DAY_FIRST_DATETIME_FORMATS: &[&str] = &[
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const ISO_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Date(NaiveDate),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    /// True for numeric variants and for text that parses as a number.
    pub fn is_numeric(&self) -> bool {
        match self {
            Value::Integer(_) | Value::Float(_) => true,
            Value::String(s) => {
                let trimmed = s.trim();
                trimmed.parse::<i64>().is_ok()
                    || trimmed.parse::<f64>().is_ok_and(|f| f.is_finite())
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            other => f.write_str(&other.as_display()),
        }
    }
}

pub fn is_null_sentinel(value: &str) -> bool {
    let trimmed = value.trim();
    NULL_SENTINELS.contains(&trimmed)
}

/// Parses a calendar date using day-first conventions. A trailing time part is
/// accepted and discarded.
pub fn parse_day_first_date(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    for fmt in DAY_FIRST_DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(parsed);
        }
    }
    for fmt in DAY_FIRST_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(parsed.date());
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    if let Ok(parsed) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(parsed);
    }
    ISO_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| dt.date())
}

fn parse_boolean(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Reduces a cell to one of the six database-safe kinds.
///
/// Priority: null-like, date-like, integer, float, boolean, trimmed text.
pub fn coerce_value(value: Value) -> Value {
    match value {
        Value::String(raw) => coerce_text(&raw),
        Value::Float(f) if !f.is_finite() => Value::Null,
        other => other,
    }
}

fn coerce_text(raw: &str) -> Value {
    if is_null_sentinel(raw) {
        return Value::Null;
    }
    let trimmed = raw.trim();
    if let Some(date) = parse_iso_date(trimmed) {
        return Value::Date(date);
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::Integer(int);
    }
    if is_integer_literal(trimmed) {
        // Too wide for i64; a float would lose digits.
        return Value::String(trimmed.to_string());
    }
    if let Ok(float) = trimmed.parse::<f64>() {
        if float.is_finite() {
            return Value::Float(float);
        }
    }
    if let Some(flag) = parse_boolean(trimmed) {
        return Value::Boolean(flag);
    }
    Value::String(trimmed.to_string())
}

fn is_integer_literal(value: &str) -> bool {
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_column_name_lowercases_and_trims() {
        assert_eq!(normalize_column_name(" Data_Actual_DATE "), "data_actual_date");
        assert_eq!(normalize_column_name("КОД"), "код");
    }

    #[test]
    fn parse_day_first_date_prefers_day_month_order() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(parse_day_first_date("06.05.2024").unwrap(), expected);
        assert_eq!(parse_day_first_date("06/05/2024").unwrap(), expected);
        assert_eq!(parse_day_first_date("06-05-2024").unwrap(), expected);
        assert_eq!(parse_day_first_date("2024-05-06").unwrap(), expected);
        assert_eq!(parse_day_first_date("06.05.2024 13:45:00").unwrap(), expected);
        assert!(parse_day_first_date("31.02.2024").is_err());
        assert!(parse_day_first_date("yesterday").is_err());
    }

    #[test]
    fn coerce_value_follows_priority_order() {
        assert_eq!(coerce_value(Value::String("  ".into())), Value::Null);
        assert_eq!(coerce_value(Value::String("NaN".into())), Value::Null);
        assert_eq!(
            coerce_value(Value::String("2024-01-31 10:00:00".into())),
            Value::Date(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap())
        );
        assert_eq!(coerce_value(Value::String(" 643 ".into())), Value::Integer(643));
        assert_eq!(coerce_value(Value::String("1.5".into())), Value::Float(1.5));
        assert_eq!(coerce_value(Value::String("TRUE".into())), Value::Boolean(true));
        assert_eq!(
            coerce_value(Value::String("  Рубль ".into())),
            Value::String("Рубль".into())
        );
        assert_eq!(coerce_value(Value::String("inf".into())), Value::String("inf".into()));
    }

    #[test]
    fn coerce_value_keeps_wide_integers_exact() {
        assert_eq!(
            coerce_value(Value::String("40702810000000000001".into())),
            Value::String("40702810000000000001".into())
        );
        assert_eq!(
            coerce_value(Value::String(" -18446744073709551615 ".into())),
            Value::String("-18446744073709551615".into())
        );
        assert_eq!(
            coerce_value(Value::String("1.5e3".into())),
            Value::Float(1500.0)
        );
    }

    #[test]
    fn coerce_value_keeps_typed_cells() {
        let date = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
        assert_eq!(coerce_value(Value::Date(date)), Value::Date(date));
        assert_eq!(coerce_value(Value::Integer(7)), Value::Integer(7));
        assert_eq!(coerce_value(Value::Float(f64::NAN)), Value::Null);
    }

    #[test]
    fn is_numeric_accepts_numbers_and_numeric_text() {
        assert!(Value::Integer(1).is_numeric());
        assert!(Value::Float(2.5).is_numeric());
        assert!(Value::String(" 840 ".into()).is_numeric());
        assert!(!Value::String("84O".into()).is_numeric());
        assert!(!Value::Null.is_numeric());
    }

    #[test]
    fn display_renders_null_and_whole_floats() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Float(3.0).to_string(), "3");
        assert_eq!(Value::Float(3.25).to_string(), "3.25");
    }
}
