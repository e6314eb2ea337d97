//! Conversion of raw model values into typed field values.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde::Serialize;
use serde_json::{Number, Value};

use crate::template::{FieldDefinition, FieldType};

static RE_CURRENCY_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{3})\b").unwrap());

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// A field value in the shape its template type asks for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(Number),
    /// Serialized as `YYYY-MM-DD`.
    Date(NaiveDate),
    Currency {
        amount: Number,
        #[serde(skip_serializing_if = "Option::is_none")]
        currency: Option<String>,
    },
    /// Kept as returned when it could not be converted.
    Raw(Value),
}

/// Converts `raw` according to the field's declared type. `Err` carries the
/// reason the value does not fit.
pub fn coerce(field: &FieldDefinition, raw: &Value) -> Result<FieldValue, String> {
    match field.field_type {
        FieldType::Text => coerce_text(raw),
        FieldType::Number => coerce_number(raw).map(FieldValue::Number),
        FieldType::Date => coerce_date(raw).map(FieldValue::Date),
        FieldType::Currency => coerce_currency(raw),
        FieldType::Selection => coerce_selection(raw, &field.options),
    }
}

/// String form of a scalar, used for pattern validation.
pub fn scalar_text(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn coerce_text(raw: &Value) -> Result<FieldValue, String> {
    scalar_text(raw)
        .map(FieldValue::Text)
        .ok_or_else(|| "expected text".to_string())
}

fn coerce_number(raw: &Value) -> Result<Number, String> {
    match raw {
        Value::Number(n) => Ok(n.clone()),
        Value::String(s) => parse_number(s).ok_or_else(|| format!("'{}' is not a number", s)),
        _ => Err("expected a number".to_string()),
    }
}

/// Parses human-formatted numbers: `1,234.50`, `1.234,50`, `1 234`, `12,5`.
pub fn parse_number(input: &str) -> Option<Number> {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'' && *c != '_')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');
    let normalized = match (last_comma, last_dot) {
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(c), None) => {
            let decimals = cleaned.len() - c - 1;
            if cleaned.matches(',').count() > 1 || decimals == 3 {
                cleaned.replace(',', "")
            } else {
                cleaned.replace(',', ".")
            }
        }
        (None, Some(_)) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        _ => cleaned,
    };

    let value: f64 = normalized.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        Some(Number::from(value as i64))
    } else {
        Number::from_f64(value)
    }
}

fn coerce_date(raw: &Value) -> Result<NaiveDate, String> {
    let Value::String(s) = raw else {
        return Err("expected a date string".to_string());
    };
    parse_date(s).ok_or_else(|| format!("'{}' is not a recognised date", s))
}

pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let trimmed = input.trim();
    if let Ok(datetime) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(datetime.date_naive());
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}

fn coerce_currency(raw: &Value) -> Result<FieldValue, String> {
    match raw {
        Value::Number(n) => Ok(FieldValue::Currency {
            amount: n.clone(),
            currency: None,
        }),
        Value::String(s) => {
            let (code, rest) = split_currency(s);
            let amount = parse_number(&rest).ok_or_else(|| format!("'{}' is not an amount", s))?;
            Ok(FieldValue::Currency {
                amount,
                currency: code,
            })
        }
        Value::Object(map) => {
            let amount = map
                .get("amount")
                .ok_or_else(|| "currency object has no amount".to_string())
                .and_then(coerce_number)?;
            let currency = map
                .get("currency")
                .and_then(Value::as_str)
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty());
            Ok(FieldValue::Currency { amount, currency })
        }
        _ => Err("expected an amount".to_string()),
    }
}

/// Separates a currency symbol or ISO code from the amount text.
fn split_currency(input: &str) -> (Option<String>, String) {
    const SYMBOLS: &[(char, &str)] = &[('€', "EUR"), ('$', "USD"), ('£', "GBP"), ('¥', "JPY")];

    for (symbol, code) in SYMBOLS {
        if input.contains(*symbol) {
            return (Some(code.to_string()), input.replace(*symbol, ""));
        }
    }

    if let Some(m) = RE_CURRENCY_CODE.find(input) {
        let rest = format!("{}{}", &input[..m.start()], &input[m.end()..]);
        return (Some(m.as_str().to_string()), rest);
    }

    (None, input.to_string())
}

fn coerce_selection(raw: &Value, options: &[String]) -> Result<FieldValue, String> {
    let text = scalar_text(raw).ok_or_else(|| "expected one of the options".to_string())?;
    options
        .iter()
        .find(|option| option.eq_ignore_ascii_case(&text))
        .map(|option| FieldValue::Text(option.clone()))
        .ok_or_else(|| format!("'{}' is not one of: {}", text, options.join(", ")))
}
