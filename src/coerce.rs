use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

static MONTH_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d{4})-(0[1-9]|1[0-2])\b").expect("valid month regex"));

/// Tokens clients send for "no value".
const NULL_TOKENS: [&str; 3] = ["", "null", "undefined"];

/// Decodes a stored JSON column, falling back to `T::default()` when the
/// column is null, empty or undecodable.
pub fn decode_or_default<T>(raw: Option<&str>) -> T
where
    T: DeserializeOwned + Default,
{
    match raw {
        Some(text) if !text.trim().is_empty() => match serde_json::from_str::<T>(text) {
            Ok(value) => value,
            Err(error) => {
                tracing::debug!(error = %error, "stored json column undecodable, using default");
                T::default()
            }
        },
        _ => T::default(),
    }
}

/// A coerced numeric field. Integers stay integers when the client wrote no
/// decimal point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericValue {
    Integer(i64),
    Float(f64),
}

impl NumericValue {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Integer(value) => value as f64,
            Self::Float(value) => value,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Self::Integer(value) => value,
            Self::Float(value) => value.round() as i64,
        }
    }

    pub fn to_json(self) -> serde_json::Value {
        match self {
            Self::Integer(value) => serde_json::Value::from(value),
            Self::Float(value) => serde_json::Number::from_f64(value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

impl ToSql for NumericValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Self::Integer(value) => value.to_sql(),
            Self::Float(value) => value.to_sql(),
        }
    }
}

impl FromSql for NumericValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(value) => Ok(Self::Integer(value)),
            ValueRef::Real(value) => Ok(Self::Float(value)),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

pub fn coerce_numeric(value: Option<&serde_json::Value>) -> Option<NumericValue> {
    let text = match value? {
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Number(number) => number.to_string(),
        _ => return None,
    };
    if is_null_token(&text) {
        return None;
    }

    let trimmed = text.trim();
    if text.contains('.') {
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|parsed| parsed.is_finite())
            .map(NumericValue::Float)
    } else {
        trimmed.parse::<i64>().ok().map(NumericValue::Integer)
    }
}

pub fn coerce_percentage(value: Option<&serde_json::Value>) -> Option<i64> {
    coerce_numeric(value).map(|number| number.as_i64().clamp(0, 100))
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time part.
pub fn coerce_date(value: Option<&str>) -> Option<NaiveDate> {
    let text = value?.trim();
    if is_null_token(text) {
        return None;
    }
    let date_part = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Normalizes a month or full date to the `YYYY-MM` token.
pub fn coerce_month(value: Option<&str>) -> Option<String> {
    let text = value?;
    if is_null_token(text.trim()) {
        return None;
    }
    let captures = MONTH_PREFIX.captures(text)?;
    Some(format!("{}-{}", &captures[1], &captures[2]))
}

/// Trims and maps blank strings to `None`.
pub fn clean_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(ToString::to_string)
}

fn is_null_token(text: &str) -> bool {
    NULL_TOKENS.contains(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn decode_falls_back_on_null_empty_and_garbage() {
        let empty: BTreeMap<String, i64> = decode_or_default(None);
        assert!(empty.is_empty());
        let blank: BTreeMap<String, i64> = decode_or_default(Some("  "));
        assert!(blank.is_empty());
        let garbage: BTreeMap<String, i64> = decode_or_default(Some("{not json"));
        assert!(garbage.is_empty());
        let decoded: BTreeMap<String, i64> = decode_or_default(Some(r#"{"a": 1}"#));
        assert_eq!(decoded.get("a"), Some(&1));
    }

    #[test]
    fn numeric_prefers_integer_without_decimal_point() {
        assert_eq!(coerce_numeric(Some(&json!("42"))), Some(NumericValue::Integer(42)));
        assert_eq!(coerce_numeric(Some(&json!(" 7 "))), Some(NumericValue::Integer(7)));
        assert_eq!(coerce_numeric(Some(&json!(42))), Some(NumericValue::Integer(42)));
        assert_eq!(coerce_numeric(Some(&json!("4.5"))), Some(NumericValue::Float(4.5)));
        assert_eq!(coerce_numeric(Some(&json!(4.5))), Some(NumericValue::Float(4.5)));
    }

    #[test]
    fn numeric_null_tokens_and_garbage_become_none() {
        assert_eq!(coerce_numeric(None), None);
        assert_eq!(coerce_numeric(Some(&json!(null))), None);
        assert_eq!(coerce_numeric(Some(&json!(""))), None);
        assert_eq!(coerce_numeric(Some(&json!("null"))), None);
        assert_eq!(coerce_numeric(Some(&json!("undefined"))), None);
        assert_eq!(coerce_numeric(Some(&json!("abc"))), None);
        assert_eq!(coerce_numeric(Some(&json!("1e3"))), None);
        assert_eq!(coerce_numeric(Some(&json!(true))), None);
    }

    #[test]
    fn percentage_is_clamped() {
        assert_eq!(coerce_percentage(Some(&json!(140))), Some(100));
        assert_eq!(coerce_percentage(Some(&json!("-5"))), Some(0));
        assert_eq!(coerce_percentage(Some(&json!("55.6"))), Some(56));
    }

    #[test]
    fn dates_and_months() {
        assert_eq!(
            coerce_date(Some("2024-02-29")),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(
            coerce_date(Some("2024-03-01T10:00:00Z")),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert_eq!(coerce_date(Some("undefined")), None);
        assert_eq!(coerce_date(Some("03/01/2024")), None);

        assert_eq!(coerce_month(Some("2024-05")), Some("2024-05".to_string()));
        assert_eq!(coerce_month(Some("2024-05-17")), Some("2024-05".to_string()));
        assert_eq!(coerce_month(Some("2024-13")), None);
        assert_eq!(coerce_month(Some("null")), None);
    }

    #[test]
    fn clean_text_trims_and_drops_blank() {
        assert_eq!(clean_text(Some("  Ideation ")), Some("Ideation".to_string()));
        assert_eq!(clean_text(Some("   ")), None);
        assert_eq!(clean_text(None), None);
    }
}
