//! Row validation and coercion.
//!
//! Given normalized fields and a candidate row, every field is checked
//! independently and every applicable error is collected - never fail-fast.
//! Ordinary invalid input is a value, not an error: the caller always gets
//! a [`RowValidation`], either the coerced row or the full error list.

use crate::field::{FieldKind, NumberRules, ParsedField, StringRules};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

/// Relative tolerance for the `step` reachability check. The multiple count
/// `(value - base) / step` must land within this distance of an integer,
/// scaled by `max(1, |count|)`.
const STEP_EPSILON: f64 = 1e-9;

/// Outcome of validating one candidate row.
#[derive(Debug, Clone)]
pub enum RowValidation {
    /// Zero errors: `data` holds active+present fields coerced, plus
    /// inactive fields passed through verbatim. Absent fields are omitted;
    /// defaults are never injected.
    Valid { data: Map<String, Value> },

    /// One or more field errors, all of them.
    Invalid { errors: Vec<FieldError> },
}

impl RowValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, RowValidation::Valid { .. })
    }

    /// The coerced row, if validation succeeded.
    pub fn into_data(self) -> Option<Map<String, Value>> {
        match self {
            RowValidation::Valid { data } => Some(data),
            RowValidation::Invalid { .. } => None,
        }
    }

    /// Collected errors; empty for a valid row.
    pub fn errors(&self) -> &[FieldError] {
        match self {
            RowValidation::Valid { .. } => &[],
            RowValidation::Invalid { errors } => errors,
        }
    }
}

/// One per-field validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Key of the failing field.
    pub field: String,
    pub kind: FieldErrorKind,
    /// Human-readable reason, suitable for surfacing to the row author.
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldErrorKind {
    RequiredFieldMissing,
    FieldTypeMismatch,
    ConstraintViolation,
}

impl FieldError {
    fn required(field: &str) -> Self {
        Self {
            field: field.to_string(),
            kind: FieldErrorKind::RequiredFieldMissing,
            message: "is required".to_string(),
        }
    }

    fn mismatch(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            kind: FieldErrorKind::FieldTypeMismatch,
            message: message.into(),
        }
    }

    fn constraint(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            kind: FieldErrorKind::ConstraintViolation,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a candidate row against normalized fields.
///
/// Field order has no bearing on the outcome; each field is evaluated
/// against the raw candidate row, including visibility conditions.
pub fn validate_row(fields: &[ParsedField], row: &Map<String, Value>) -> RowValidation {
    let mut errors = Vec::new();
    let mut data = Map::new();

    for field in fields {
        let value = row.get(&field.key);

        if let Some(rule) = &field.visibility {
            if !rule.is_active(row) {
                // Inactive: any value passes through untouched, even one
                // that would fail this field's own rules.
                if let Some(v) = value {
                    data.insert(field.key.clone(), v.clone());
                }
                continue;
            }
        }

        let value = match value {
            Some(v) if !is_missing(Some(v)) => v,
            _ => {
                if field.required {
                    errors.push(FieldError::required(&field.key));
                }
                continue;
            }
        };

        match coerce_value(field, value) {
            Ok(coerced) => {
                data.insert(field.key.clone(), coerced);
            }
            Err(err) => errors.push(err),
        }
    }

    if errors.is_empty() {
        RowValidation::Valid { data }
    } else {
        RowValidation::Invalid { errors }
    }
}

/// Missing as the required check defines it: absent, null or empty-string.
fn is_missing(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null)) || matches!(value, Some(Value::String(s)) if s.is_empty())
}

fn coerce_value(field: &ParsedField, value: &Value) -> Result<Value, FieldError> {
    let key = field.key.as_str();
    match &field.kind {
        FieldKind::Text(rules) | FieldKind::Textarea(rules) | FieldKind::Tel(rules) => {
            let s = expect_string(key, value)?;
            check_string_rules(key, s, rules)?;
            Ok(Value::String(s.to_string()))
        }
        FieldKind::Email(rules) => {
            let s = expect_string(key, value)?;
            check_string_rules(key, s, rules)?;
            if !email_shape().is_match(s) {
                return Err(FieldError::mismatch(key, "is not a valid email address"));
            }
            Ok(Value::String(s.to_string()))
        }
        FieldKind::Url => {
            let s = expect_string(key, value)?;
            let parsed = url::Url::parse(s)
                .map_err(|_| FieldError::mismatch(key, "is not a valid URL"))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(FieldError::mismatch(key, "must be an http(s) URL"));
            }
            Ok(Value::String(s.to_string()))
        }
        FieldKind::Number(rules) => coerce_number(key, value, rules),
        FieldKind::Date => coerce_date(key, value),
        FieldKind::DateTime => coerce_datetime(key, value),
        FieldKind::Boolean => coerce_boolean(key, value),
        FieldKind::Select { options } => {
            let s = expect_string(key, value)?;
            if !options.iter().any(|o| o == s) {
                return Err(FieldError::constraint(
                    key,
                    format!("'{s}' is not one of the allowed options"),
                ));
            }
            Ok(Value::String(s.to_string()))
        }
        FieldKind::MultiSelect { options } => coerce_multiselect(key, value, options),
    }
}

fn expect_string<'a>(key: &str, value: &'a Value) -> Result<&'a str, FieldError> {
    value
        .as_str()
        .ok_or_else(|| FieldError::mismatch(key, "expected a string"))
}

fn check_string_rules(key: &str, s: &str, rules: &StringRules) -> Result<(), FieldError> {
    let len = s.chars().count();
    if let Some(min) = rules.min_length {
        if len < min {
            return Err(FieldError::constraint(
                key,
                format!("must be at least {min} characters"),
            ));
        }
    }
    if let Some(max) = rules.max_length {
        if len > max {
            return Err(FieldError::constraint(
                key,
                format!("must be at most {max} characters"),
            ));
        }
    }
    if let Some(pattern) = &rules.pattern {
        if !pattern.is_match(s) {
            return Err(FieldError::constraint(key, "does not match the required pattern"));
        }
    }
    Ok(())
}

fn coerce_number(key: &str, value: &Value, rules: &NumberRules) -> Result<Value, FieldError> {
    let number = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| FieldError::mismatch(key, "is not a representable number"))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| FieldError::mismatch(key, "is not a number"))?,
        _ => return Err(FieldError::mismatch(key, "is not a number")),
    };
    if !number.is_finite() {
        return Err(FieldError::mismatch(key, "is not a finite number"));
    }

    if let Some(min) = rules.min {
        if number < min {
            return Err(FieldError::constraint(key, format!("must be at least {min}")));
        }
    }
    if let Some(max) = rules.max {
        if number > max {
            return Err(FieldError::constraint(key, format!("must be at most {max}")));
        }
    }
    if let Some(step) = rules.step {
        if step > 0.0 {
            let base = rules.min.unwrap_or(0.0);
            let count = (number - base) / step;
            if (count - count.round()).abs() > STEP_EPSILON * count.abs().max(1.0) {
                return Err(FieldError::constraint(
                    key,
                    format!("must be a multiple of {step} from {base}"),
                ));
            }
        }
    }

    let coerced = serde_json::Number::from_f64(number)
        .ok_or_else(|| FieldError::mismatch(key, "is not a representable number"))?;
    Ok(Value::Number(coerced))
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

fn coerce_date(key: &str, value: &Value) -> Result<Value, FieldError> {
    let s = expect_string(key, value)?.trim();
    let date = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.date_naive())
        })
        .ok_or_else(|| FieldError::mismatch(key, "is not a valid date"))?;
    Ok(Value::String(date.format("%Y-%m-%d").to_string()))
}

fn coerce_datetime(key: &str, value: &Value) -> Result<Value, FieldError> {
    let s = expect_string(key, value)?.trim();
    let datetime = chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| FieldError::mismatch(key, "is not a valid date-time"))?;
    // Canonical minute-precision form; seconds are dropped, not rounded.
    Ok(Value::String(datetime.format("%Y-%m-%dT%H:%M").to_string()))
}

fn coerce_boolean(key: &str, value: &Value) -> Result<Value, FieldError> {
    match value {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
        _ => Err(FieldError::mismatch(key, "is not a boolean")),
    }
}

fn coerce_multiselect(key: &str, value: &Value, options: &[String]) -> Result<Value, FieldError> {
    let items = value
        .as_array()
        .ok_or_else(|| FieldError::mismatch(key, "expected an array"))?;

    let mut seen: HashSet<&str> = HashSet::with_capacity(items.len());
    let mut coerced = Vec::with_capacity(items.len());
    for item in items {
        let s = item
            .as_str()
            .ok_or_else(|| FieldError::mismatch(key, "expected an array of strings"))?;
        if !options.iter().any(|o| o == s) {
            return Err(FieldError::constraint(
                key,
                format!("'{s}' is not one of the allowed options"),
            ));
        }
        // Input duplicates are tolerated; the coerced output keeps the
        // first occurrence only, order preserved.
        if seen.insert(s) {
            coerced.push(Value::String(s.to_string()));
        }
    }
    Ok(Value::Array(coerced))
}

fn email_shape() -> &'static regex::Regex {
    static EMAIL: OnceLock<regex::Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email shape regex is valid")
    })
}
