use crate::error::{ReconciliationError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

const MONTH_NAMES: [&str; 12] = [
    "Enero",
    "Febrero",
    "Marzo",
    "Abril",
    "Mayo",
    "Junio",
    "Julio",
    "Agosto",
    "Septiembre",
    "Octubre",
    "Noviembre",
    "Diciembre",
];

/// A calendar month, the unit every reconciliation is computed for.
///
/// Serializes as `"YYYY-MM"` so it can key JSON maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        validate_month(month)?;
        Ok(Self { year, month })
    }

    /// Parses `"YYYY-MM"`, also accepting a full date such as `"2024-03-15"`.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let mut parts = trimmed.splitn(3, |c: char| c == '-' || c == '/');
        let year = parts.next().and_then(|y| y.trim().parse::<i32>().ok());
        let month = parts.next().and_then(|m| m.trim().parse::<u32>().ok());

        match (year, month) {
            (Some(year), Some(month)) => Self::new(year, month),
            _ => Err(ReconciliationError::InvalidMonth(format!(
                "'{}' is not a valid month. Expected YYYY-MM",
                raw
            ))),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Human readable label, e.g. `"Marzo 2024"`.
    pub fn label(&self) -> String {
        format!("{} {}", MONTH_NAMES[(self.month - 1) as usize], self.year)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl TryFrom<String> for MonthKey {
    type Error = ReconciliationError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<MonthKey> for String {
    fn from(value: MonthKey) -> Self {
        value.to_string()
    }
}

pub fn validate_month(month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(ReconciliationError::InvalidMonth(format!(
            "month {} must be between 1 and 12",
            month
        )));
    }
    Ok(())
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

/// Reads the date part of an execution timestamp.
///
/// Execution files mix `"2024-03-05 08:30"`, ISO timestamps and plain dates.
pub fn parse_event_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_month_key() {
        let key = MonthKey::parse("2024-03").unwrap();
        assert_eq!(key.year(), 2024);
        assert_eq!(key.month(), 3);
        assert_eq!(key.to_string(), "2024-03");

        let from_date = MonthKey::parse("2024-11-15").unwrap();
        assert_eq!(from_date, MonthKey::new(2024, 11).unwrap());

        assert!(MonthKey::parse("2024-13").is_err());
        assert!(MonthKey::parse("marzo").is_err());
    }

    #[test]
    fn test_month_label_and_order() {
        let key = MonthKey::new(2024, 2).unwrap();
        assert_eq!(key.label(), "Febrero 2024");
        assert_eq!(MonthKey::new(2024, 12).unwrap().label(), "Diciembre 2024");
        assert!(MonthKey::new(2023, 12).unwrap() < MonthKey::new(2024, 1).unwrap());
    }

    #[test]
    fn test_month_key_serializes_as_string() {
        let key = MonthKey::new(2024, 7).unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"2024-07\"");
        let back: MonthKey = serde_json::from_str("\"2024-07\"").unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_parse_event_date() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(parse_event_date("2024-03-05 08:30"), Some(expected));
        assert_eq!(parse_event_date("2024-03-05T08:30:00"), Some(expected));
        assert_eq!(parse_event_date("2024-03-05"), Some(expected));
        assert_eq!(parse_event_date("05/03/2024"), Some(expected));
        assert_eq!(parse_event_date(""), None);
        assert_eq!(parse_event_date("ayer"), None);
    }
}
