//! Per-kind conversion between what a user edits and the canonical string
//! stored for a parameter.
//!
//! | Kind     | Default | Canonical form                     |
//! |----------|---------|------------------------------------|
//! | Integer  | `""`    | optional sign and digits           |
//! | Boolean  | `"0"`   | `"1"` or `"0"`                     |
//! | Temporal | `""`    | epoch milliseconds, or empty       |
//! | Text     | `""`    | wrapped in one pair of `'`         |
//! | Unknown  | `""`    | verbatim                           |

use crate::error::{ParamsError, Result};
use crate::types::ValueKind;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display format for temporal values, millisecond precision, UTC
pub const TEMPORAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

const QUOTE: char = '\'';

/// Editable form of a value, as a widget would hold it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DisplayValue {
    Text(String),
    Checked(bool),
    Instant(Option<DateTime<Utc>>),
}

impl From<&str> for DisplayValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for DisplayValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for DisplayValue {
    fn from(value: bool) -> Self {
        Self::Checked(value)
    }
}

impl From<DateTime<Utc>> for DisplayValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Instant(Some(value))
    }
}

/// Value given to a parameter the first time its name is seen
#[must_use]
pub const fn default_value(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::Boolean => "0",
        ValueKind::Integer | ValueKind::Temporal | ValueKind::Text | ValueKind::Unknown => "",
    }
}

/// Edit → canonical
pub fn encode(kind: ValueKind, display: &DisplayValue) -> Result<String> {
    match (kind, display) {
        (ValueKind::Integer, DisplayValue::Text(raw)) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() || is_integer(trimmed) {
                Ok(trimmed.to_string())
            } else {
                Err(ParamsError::invalid_value(kind, format!("{raw:?} is not a number")))
            }
        }
        (ValueKind::Boolean, DisplayValue::Checked(checked)) => {
            Ok((if *checked { "1" } else { "0" }).to_string())
        }
        (ValueKind::Temporal, DisplayValue::Instant(instant)) => Ok(instant
            .map(|at| at.timestamp_millis().to_string())
            .unwrap_or_default()),
        (ValueKind::Text, DisplayValue::Text(raw)) => Ok(wrap_quotes(raw)),
        (ValueKind::Unknown, DisplayValue::Text(raw)) => Ok(raw.clone()),
        (_, other) => Err(ParamsError::invalid_value(
            kind,
            format!("unexpected editor value {other:?}"),
        )),
    }
}

/// Canonical → edit
#[must_use]
pub fn decode(kind: ValueKind, canonical: &str) -> DisplayValue {
    match kind {
        ValueKind::Boolean => DisplayValue::Checked(canonical == "1"),
        ValueKind::Temporal => DisplayValue::Instant(parse_millis(canonical)),
        ValueKind::Text => DisplayValue::Text(strip_quotes(canonical).to_string()),
        ValueKind::Integer | ValueKind::Unknown => DisplayValue::Text(canonical.to_string()),
    }
}

/// Interpret free-form text typed for a parameter of `kind`.
pub fn parse_display(kind: ValueKind, raw: &str) -> Result<DisplayValue> {
    match kind {
        ValueKind::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(DisplayValue::Checked(true)),
            "" | "0" | "false" | "no" | "off" => Ok(DisplayValue::Checked(false)),
            _ => Err(ParamsError::invalid_value(kind, format!("{raw:?} is not a boolean"))),
        },
        ValueKind::Temporal => parse_instant(raw.trim())
            .map(DisplayValue::Instant)
            .ok_or_else(|| {
                ParamsError::invalid_value(
                    kind,
                    format!("{raw:?} is neither epoch milliseconds nor {TEMPORAL_FORMAT}"),
                )
            }),
        ValueKind::Integer | ValueKind::Text | ValueKind::Unknown => {
            Ok(DisplayValue::Text(raw.to_string()))
        }
    }
}

/// Bring a value carried over from an earlier pass in line with `kind`.
///
/// Only booleans have a closed canonical form; every other value is kept as
/// the user left it, even when the declared kind changed underneath it.
#[must_use]
pub fn conform(kind: ValueKind, value: &str) -> String {
    match kind {
        ValueKind::Boolean => (if value == "1" { "1" } else { "0" }).to_string(),
        ValueKind::Integer | ValueKind::Temporal | ValueKind::Text | ValueKind::Unknown => {
            value.to_string()
        }
    }
}

/// Short human readable rendering of a canonical value
#[must_use]
pub fn presentation(kind: ValueKind, canonical: &str) -> String {
    match decode(kind, canonical) {
        DisplayValue::Text(text) => text,
        DisplayValue::Checked(checked) => checked.to_string(),
        DisplayValue::Instant(instant) => instant
            .map(|at| at.format(TEMPORAL_FORMAT).to_string())
            .unwrap_or_default(),
    }
}

#[must_use]
pub fn wrap_quotes(raw: &str) -> String {
    format!("{QUOTE}{raw}{QUOTE}")
}

/// Remove exactly one layer of surrounding quotes, if present
#[must_use]
pub fn strip_quotes(value: &str) -> &str {
    if is_quoted(value) {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

fn is_quoted(value: &str) -> bool {
    value.len() >= 2 && value.starts_with(QUOTE) && value.ends_with(QUOTE)
}

fn is_integer(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn parse_millis(value: &str) -> Option<DateTime<Utc>> {
    value
        .parse::<i64>()
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}

fn parse_instant(raw: &str) -> Option<Option<DateTime<Utc>>> {
    if raw.is_empty() {
        return Some(None);
    }
    if is_integer(raw) {
        return parse_millis(raw).map(Some);
    }
    NaiveDateTime::parse_from_str(raw, TEMPORAL_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(|date| date.and_time(chrono::NaiveTime::MIN))
        })
        .ok()
        .map(|naive| Some(naive.and_utc()))
}
