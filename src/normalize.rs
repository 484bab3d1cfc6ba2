//! Lenient parsing of Latin-American formatted numbers.
//!
//! Plan spreadsheets and execution files carry amounts such as `"$ 1.234.567,89"`:
//! periods are thousands separators and the comma is the decimal mark. Anything that
//! cannot be read degrades to `0.0`; [`try_parse_locale_number`] exposes the failure so
//! the ingestion boundary can report it.

use serde_json::Value;

/// Outcome of reading one numeric field.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericParse {
    Parsed(f64),
    /// Null, absent or blank input.
    Empty,
    /// Something was there but no number could be read from it.
    Invalid(String),
}

impl NumericParse {
    pub fn value_or_zero(&self) -> f64 {
        match self {
            NumericParse::Parsed(v) => *v,
            _ => 0.0,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, NumericParse::Invalid(_))
    }
}

/// Parses a JSON scalar into a number, returning `0.0` for anything unreadable.
///
/// JSON numbers are taken as-is and never re-normalized.
pub fn parse_locale_number(value: &Value) -> f64 {
    try_parse_locale_number(value).value_or_zero()
}

/// Same as [`parse_locale_number`] for optional lookups, where `None` means the column
/// was not present at all.
pub fn parse_optional_number(value: Option<&Value>) -> f64 {
    value.map(parse_locale_number).unwrap_or(0.0)
}

pub fn try_parse_locale_number(value: &Value) -> NumericParse {
    match value {
        Value::Null => NumericParse::Empty,
        Value::Number(n) => match n.as_f64() {
            Some(v) if v.is_finite() => NumericParse::Parsed(v),
            _ => NumericParse::Invalid(n.to_string()),
        },
        Value::String(s) => {
            if s.trim().is_empty() {
                NumericParse::Empty
            } else {
                match parse_locale_digits(s) {
                    Some(v) => NumericParse::Parsed(v),
                    None => NumericParse::Invalid(s.clone()),
                }
            }
        }
        other => NumericParse::Invalid(other.to_string()),
    }
}

/// Parses a locale formatted string, `0.0` on failure.
///
/// ```
/// use nota_tecnica_reconciler::normalize::parse_locale_str;
///
/// assert_eq!(parse_locale_str("1.234.567,89"), 1234567.89);
/// assert_eq!(parse_locale_str("$ 45.000"), 45000.0);
/// assert_eq!(parse_locale_str("abc"), 0.0);
/// ```
pub fn parse_locale_str(raw: &str) -> f64 {
    parse_locale_digits(raw).unwrap_or(0.0)
}

/// Keeps digits and commas only, so signs and currency marks are dropped.
fn parse_locale_digits(raw: &str) -> Option<f64> {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',')
        .collect();

    // Only the first comma is the decimal mark; anything after a second one is ignored.
    let mut parts = kept.splitn(3, ',');
    let integer = parts.next().unwrap_or("");
    let fraction = parts.next();

    let candidate = match fraction {
        Some(frac) => format!("{}.{}", integer, frac),
        None => integer.to_string(),
    };

    if candidate.is_empty() || candidate == "." {
        return None;
    }

    candidate.parse::<f64>().ok().filter(|v| v.is_finite())
}
