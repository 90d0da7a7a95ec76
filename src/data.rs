use std::fmt;

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use serde::{Serialize, Serializer};

/// A typed cell in the canonical table.
///
/// Malformed source values never reach this type; the normalizer maps them
/// to `None` at the [`Cell`] level, and every aggregation skips `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number(f64),
    Date(NaiveDate),
}

/// One cell: a typed value, or missing.
pub type Cell = Option<Value>;

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{n:.0}")
                } else {
                    n.to_string()
                }
            }
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

// Serializes to plain JSON scalars (string / number / ISO date string) so
// presentation layers receive no crate-specific typing.
impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::String(s) => serializer.serialize_str(s),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
        }
    }
}

/// Parses a date with day-first ambiguity resolution: `31/07/2025` and
/// `2025-07-31` both work, and `01/02/2025` is February 1st.
pub fn parse_day_first_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y", "%Y/%m/%d", "%m/%d/%Y"];
    let trimmed = value.trim();
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

/// Parses a numeric cell. Accepts a decimal comma when no dot is present,
/// which pt-BR portfolio exports commonly use.
pub fn parse_number(value: &str) -> Result<f64> {
    let trimmed = value.trim();
    if let Ok(parsed) = trimmed.parse::<f64>() {
        return Ok(parsed);
    }
    if trimmed.contains(',') && !trimmed.contains('.') {
        if let Ok(parsed) = trimmed.replace(',', ".").parse::<f64>() {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as number"))
}
