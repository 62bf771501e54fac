//! Normalized field model.
//!
//! A parsed schema is a list of [`ParsedField`]s. The raw document's loose
//! `type` string becomes the closed [`FieldKind`] union here, with each
//! variant carrying only the constraints that apply to it.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One normalized column of a list's schema.
#[derive(Debug, Clone)]
pub struct ParsedField {
    /// Stable identifier, unique within the schema.
    pub key: String,

    /// Human-readable name. Falls back to `key` when the document omits it.
    pub label: String,

    /// Whether a value must be present (enforced only while the field is
    /// active, see [`VisibilityRule`]).
    pub required: bool,

    /// Presentation order; ties keep declaration order.
    pub display_order: i64,

    /// Typed default, carried through untouched. The validator never
    /// injects it; it is a presentation concern.
    pub default_value: Option<Value>,

    /// Conditional relevance. When the condition is false the field is
    /// inactive: requiredness and type rules are both skipped.
    pub visibility: Option<VisibilityRule>,

    /// The field's type and type-specific constraints.
    pub kind: FieldKind,
}

/// Closed union of field types.
///
/// String-like variants carry [`StringRules`], `number` carries
/// [`NumberRules`], choice variants carry their allowed options. Everything
/// else needs no extra data.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Text(StringRules),
    Textarea(StringRules),
    Tel(StringRules),
    Email(StringRules),
    Url,
    Number(NumberRules),
    Date,
    DateTime,
    Boolean,
    Select { options: Vec<String> },
    MultiSelect { options: Vec<String> },
}

impl FieldKind {
    /// The DSL type name for this kind, as written in schema documents.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Text(_) => "text",
            FieldKind::Textarea(_) => "textarea",
            FieldKind::Tel(_) => "tel",
            FieldKind::Email(_) => "email",
            FieldKind::Url => "url",
            FieldKind::Number(_) => "number",
            FieldKind::Date => "date",
            FieldKind::DateTime => "datetime",
            FieldKind::Boolean => "boolean",
            FieldKind::Select { .. } => "select",
            FieldKind::MultiSelect { .. } => "multiselect",
        }
    }

    /// Allowed options for choice kinds, `None` otherwise.
    pub fn options(&self) -> Option<&[String]> {
        match self {
            FieldKind::Select { options } | FieldKind::MultiSelect { options } => {
                Some(options.as_slice())
            }
            _ => None,
        }
    }
}

/// Length and pattern constraints for string-like fields.
///
/// The pattern is compiled once at parse time with full-string semantics;
/// an unparsable pattern rejects the whole schema.
#[derive(Debug, Clone, Default)]
pub struct StringRules {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,
}

/// Range and step constraints for `number` fields.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NumberRules {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
}

/// A single-field visibility condition.
///
/// The model supports exactly one referenced field per condition. Multi-
/// field boolean composition would wrap this type in a new enum; it is not
/// part of the DSL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityRule {
    /// Key of the referenced field (another field in the same schema).
    pub field: String,

    /// How the referenced field's value is tested.
    pub operator: VisibilityOp,

    /// Comparison operand for `equals`/`notEquals`; unused by the
    /// emptiness operators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Visibility condition operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VisibilityOp {
    Equals,
    NotEquals,
    IsEmpty,
    IsNotEmpty,
}

impl VisibilityOp {
    /// Parse the DSL spelling of an operator.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "equals" => Some(VisibilityOp::Equals),
            "notEquals" => Some(VisibilityOp::NotEquals),
            "isEmpty" => Some(VisibilityOp::IsEmpty),
            "isNotEmpty" => Some(VisibilityOp::IsNotEmpty),
            _ => None,
        }
    }
}

impl VisibilityRule {
    /// Evaluate the condition against a candidate row.
    ///
    /// `equals`/`notEquals` compare trimmed stringifications of the
    /// referenced value; the emptiness operators treat null, missing,
    /// empty-string and empty-array as empty.
    pub fn is_active(&self, row: &serde_json::Map<String, Value>) -> bool {
        let referenced = row.get(&self.field);
        match self.operator {
            VisibilityOp::Equals => {
                let expected = self.value.as_deref().unwrap_or("").trim();
                stringify(referenced).trim() == expected
            }
            VisibilityOp::NotEquals => {
                let expected = self.value.as_deref().unwrap_or("").trim();
                stringify(referenced).trim() != expected
            }
            VisibilityOp::IsEmpty => is_empty_value(referenced),
            VisibilityOp::IsNotEmpty => !is_empty_value(referenced),
        }
    }
}

/// String form of a row value for comparison purposes.
pub(crate) fn stringify(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Emptiness as the visibility operators define it.
pub(crate) fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> serde_json::Map<String, Value> {
        let mut map = serde_json::Map::new();
        map.insert("status".to_string(), value);
        map
    }

    #[test]
    fn test_equals_compares_trimmed_strings() {
        let rule = VisibilityRule {
            field: "status".to_string(),
            operator: VisibilityOp::Equals,
            value: Some("active".to_string()),
        };
        assert!(rule.is_active(&row(json!("active"))));
        assert!(rule.is_active(&row(json!("  active  "))));
        assert!(!rule.is_active(&row(json!("inactive"))));
        assert!(!rule.is_active(&serde_json::Map::new()));
    }

    #[test]
    fn test_equals_stringifies_non_strings() {
        let rule = VisibilityRule {
            field: "status".to_string(),
            operator: VisibilityOp::Equals,
            value: Some("42".to_string()),
        };
        assert!(rule.is_active(&row(json!(42))));

        let rule = VisibilityRule {
            field: "status".to_string(),
            operator: VisibilityOp::Equals,
            value: Some("true".to_string()),
        };
        assert!(rule.is_active(&row(json!(true))));
    }

    #[test]
    fn test_is_empty_operator() {
        let rule = VisibilityRule {
            field: "status".to_string(),
            operator: VisibilityOp::IsEmpty,
            value: None,
        };
        assert!(rule.is_active(&serde_json::Map::new()));
        assert!(rule.is_active(&row(json!(null))));
        assert!(rule.is_active(&row(json!(""))));
        assert!(rule.is_active(&row(json!([]))));
        assert!(!rule.is_active(&row(json!("x"))));
        assert!(!rule.is_active(&row(json!(["x"]))));
        assert!(!rule.is_active(&row(json!(0))));
    }

    #[test]
    fn test_is_not_empty_operator() {
        let rule = VisibilityRule {
            field: "status".to_string(),
            operator: VisibilityOp::IsNotEmpty,
            value: None,
        };
        assert!(rule.is_active(&row(json!("x"))));
        assert!(!rule.is_active(&row(json!(""))));
    }

    #[test]
    fn test_operator_parse() {
        assert_eq!(VisibilityOp::parse("equals"), Some(VisibilityOp::Equals));
        assert_eq!(VisibilityOp::parse("notEquals"), Some(VisibilityOp::NotEquals));
        assert_eq!(VisibilityOp::parse("isEmpty"), Some(VisibilityOp::IsEmpty));
        assert_eq!(VisibilityOp::parse("isNotEmpty"), Some(VisibilityOp::IsNotEmpty));
        assert_eq!(VisibilityOp::parse("contains"), None);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(FieldKind::Date.type_name(), "date");
        assert_eq!(
            FieldKind::Select { options: vec!["a".to_string()] }.type_name(),
            "select"
        );
        assert_eq!(FieldKind::Number(NumberRules::default()).type_name(), "number");
    }
}
