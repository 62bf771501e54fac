//! Schema parsing and normalization.
//!
//! Turns a raw schema document (`{name, description, fields: [...]}`) into
//! normalized [`ParsedField`]s. Rejection is wholesale: one bad field fails
//! the whole schema. Parsing is pure and never touches storage.

use crate::field::{
    FieldKind, NumberRules, ParsedField, StringRules, VisibilityOp, VisibilityRule,
};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

/// Schema rejection reasons. Fatal to the schema; surfaced to its author.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("field '{key}' has unknown type '{type_name}'")]
    InvalidFieldType { key: String, type_name: String },

    #[error("duplicate field key '{0}'")]
    DuplicateFieldKey(String),

    #[error("field '{0}' needs a non-empty options list")]
    MissingOptions(String),

    #[error("field '{key}' visibility references unknown field '{referenced}'")]
    UnknownVisibilityReference { key: String, referenced: String },

    #[error("field at index {0} is missing a key")]
    MissingKey(usize),

    #[error("field '{key}' has an invalid pattern: {message}")]
    InvalidPattern { key: String, message: String },

    #[error("malformed schema document: {0}")]
    Malformed(String),
}

/// Parse a schema document from its JSON text.
pub fn parse_schema_str(raw: &str) -> Result<Vec<ParsedField>, SchemaError> {
    let doc: Value = serde_json::from_str(raw)
        .map_err(|e| SchemaError::Malformed(format!("not valid JSON: {e}")))?;
    parse_schema(&doc)
}

/// Parse and normalize a schema document.
///
/// Output is sorted by `displayOrder` ascending with declaration order as
/// the tie-break. Sort order is presentational only; validation treats
/// fields independently.
pub fn parse_schema(doc: &Value) -> Result<Vec<ParsedField>, SchemaError> {
    let fields_value = doc
        .get("fields")
        .ok_or_else(|| SchemaError::Malformed("missing 'fields' array".to_string()))?;
    let raw_fields = fields_value
        .as_array()
        .ok_or_else(|| SchemaError::Malformed("'fields' must be an array".to_string()))?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut fields = Vec::with_capacity(raw_fields.len());
    for (idx, raw) in raw_fields.iter().enumerate() {
        let field = field_from_value(idx, raw)?;
        if !seen.insert(field.key.clone()) {
            return Err(SchemaError::DuplicateFieldKey(field.key));
        }
        fields.push(field);
    }

    // Visibility may reference fields declared later, so resolve after the
    // whole set is known. Self-references are rejected: the condition must
    // name a different field.
    for field in &fields {
        if let Some(rule) = &field.visibility {
            if rule.field == field.key || !seen.contains(&rule.field) {
                return Err(SchemaError::UnknownVisibilityReference {
                    key: field.key.clone(),
                    referenced: rule.field.clone(),
                });
            }
        }
    }

    // Stable sort: equal displayOrder keeps declaration order.
    fields.sort_by_key(|f| f.display_order);
    Ok(fields)
}

fn field_from_value(idx: usize, raw: &Value) -> Result<ParsedField, SchemaError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| SchemaError::Malformed(format!("field at index {idx} must be an object")))?;

    let key = obj
        .get("key")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(SchemaError::MissingKey(idx))?
        .to_string();

    let type_name = obj
        .get("type")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let validation = obj.get("validation").and_then(|v| v.as_object());
    let string_rules = || -> Result<StringRules, SchemaError> {
        let Some(rules) = validation else {
            return Ok(StringRules::default());
        };
        let pattern = match rules.get("pattern").and_then(|v| v.as_str()) {
            // Full-string semantics: the pattern must match the whole value.
            Some(p) => Some(Regex::new(&format!("^(?:{p})$")).map_err(|e| {
                SchemaError::InvalidPattern {
                    key: key.clone(),
                    message: e.to_string(),
                }
            })?),
            None => None,
        };
        Ok(StringRules {
            min_length: rules.get("minLength").and_then(|v| v.as_u64()).map(|n| n as usize),
            max_length: rules.get("maxLength").and_then(|v| v.as_u64()).map(|n| n as usize),
            pattern,
        })
    };

    let kind = match type_name.as_str() {
        "text" => FieldKind::Text(string_rules()?),
        "textarea" => FieldKind::Textarea(string_rules()?),
        "tel" => FieldKind::Tel(string_rules()?),
        "email" => FieldKind::Email(string_rules()?),
        "url" => FieldKind::Url,
        "number" => {
            let rules = validation
                .map(|rules| NumberRules {
                    min: rules.get("min").and_then(|v| v.as_f64()),
                    max: rules.get("max").and_then(|v| v.as_f64()),
                    step: rules.get("step").and_then(|v| v.as_f64()),
                })
                .unwrap_or_default();
            FieldKind::Number(rules)
        }
        "date" => FieldKind::Date,
        "datetime" => FieldKind::DateTime,
        "boolean" => FieldKind::Boolean,
        "select" => FieldKind::Select {
            options: options_from_obj(obj, &key)?,
        },
        "multiselect" => FieldKind::MultiSelect {
            options: options_from_obj(obj, &key)?,
        },
        _ => {
            return Err(SchemaError::InvalidFieldType {
                key,
                type_name: if type_name.is_empty() {
                    "(missing)".to_string()
                } else {
                    type_name
                },
            })
        }
    };

    let visibility = match obj.get("visibility") {
        Some(v) => Some(visibility_from_value(&key, v)?),
        None => None,
    };

    Ok(ParsedField {
        label: obj
            .get("label")
            .and_then(|v| v.as_str())
            .unwrap_or(&key)
            .to_string(),
        required: obj.get("required").and_then(|v| v.as_bool()).unwrap_or(false),
        display_order: obj
            .get("displayOrder")
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .unwrap_or(0),
        default_value: obj.get("defaultValue").cloned(),
        visibility,
        kind,
        key,
    })
}

fn options_from_obj(
    obj: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Vec<String>, SchemaError> {
    let Some(raw) = obj.get("options").and_then(|v| v.as_array()) else {
        return Err(SchemaError::MissingOptions(key.to_string()));
    };
    let mut options = Vec::with_capacity(raw.len());
    for entry in raw {
        let value = entry.as_str().ok_or_else(|| {
            SchemaError::Malformed(format!("options for field '{key}' must be strings"))
        })?;
        options.push(value.to_string());
    }
    if options.is_empty() {
        return Err(SchemaError::MissingOptions(key.to_string()));
    }
    Ok(options)
}

fn visibility_from_value(key: &str, raw: &Value) -> Result<VisibilityRule, SchemaError> {
    let obj = raw.as_object().ok_or_else(|| {
        SchemaError::Malformed(format!("visibility for field '{key}' must be an object"))
    })?;
    let field = obj
        .get("field")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            SchemaError::Malformed(format!("visibility for field '{key}' is missing 'field'"))
        })?
        .to_string();
    let operator_raw = obj.get("operator").and_then(|v| v.as_str()).unwrap_or("");
    let operator = VisibilityOp::parse(operator_raw).ok_or_else(|| {
        SchemaError::Malformed(format!(
            "visibility for field '{key}' has unknown operator '{operator_raw}'"
        ))
    })?;
    let value = obj.get("value").map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    });
    Ok(VisibilityRule {
        field,
        operator,
        value,
    })
}
