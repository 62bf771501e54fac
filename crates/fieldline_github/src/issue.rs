//! Issue <-> row mapping.
//!
//! The mirror stores raw issue JSON; flattening to row shape happens at
//! read time. Both directions are best-effort by design: the forward map
//! is total, the inverse is lossy (GitHub-side metadata like `html_url`
//! is not reproduced).

use chrono::{DateTime, SecondsFormat};
use serde::Serialize;
use serde_json::{Map, Value};

/// A GitHub issue flattened into row shape.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueRow {
    /// Stringified issue number.
    pub id: String,
    /// Flattened scalar fields: `number`, `title`, `body`, `state`,
    /// `labels`, `assignees`, `url`, `created_at`, `updated_at`.
    pub row_data: Map<String, Value>,
}

/// Payload for pushing a locally-edited row back to GitHub.
///
/// Empty label/assignee sets are omitted from the serialized payload
/// entirely rather than sent as empty arrays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssuePayload {
    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<String>,
}

/// Flatten one raw issue into row shape.
///
/// Never fails: absent or unexpected fields become nulls, unparsable
/// timestamps become null, label/assignee entries without a usable name
/// are skipped.
pub fn issue_to_row(issue: &Value) -> IssueRow {
    let number = issue.get("number").and_then(Value::as_i64).unwrap_or(0);

    let mut row_data = Map::new();
    row_data.insert("number".to_string(), Value::from(number));
    row_data.insert("title".to_string(), string_or_null(issue.get("title")));
    row_data.insert("body".to_string(), string_or_null(issue.get("body")));
    row_data.insert("state".to_string(), string_or_null(issue.get("state")));
    row_data.insert(
        "labels".to_string(),
        Value::String(join_names(issue.get("labels"), "name")),
    );
    row_data.insert(
        "assignees".to_string(),
        Value::String(join_names(issue.get("assignees"), "login")),
    );
    row_data.insert("url".to_string(), string_or_null(issue.get("html_url")));
    row_data.insert(
        "created_at".to_string(),
        iso_or_null(issue.get("created_at")),
    );
    row_data.insert(
        "updated_at".to_string(),
        iso_or_null(issue.get("updated_at")),
    );

    IssueRow {
        id: number.to_string(),
        row_data,
    }
}

/// Build an issue payload from row data.
///
/// `labels`/`assignees` accept either an array of strings or a single
/// comma-separated string; entries are trimmed and empties dropped.
pub fn row_data_to_issue_payload(row_data: &Map<String, Value>) -> IssuePayload {
    let title = row_data
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("Untitled")
        .to_string();

    IssuePayload {
        title,
        body: row_data
            .get("body")
            .and_then(Value::as_str)
            .map(str::to_string),
        state: row_data
            .get("state")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        labels: string_list(row_data.get("labels")),
        assignees: string_list(row_data.get("assignees")),
    }
}

fn string_or_null(value: Option<&Value>) -> Value {
    match value.and_then(Value::as_str) {
        Some(s) => Value::String(s.to_string()),
        None => Value::Null,
    }
}

/// Join an array of `{name: ...}`-style objects (or bare strings) into a
/// comma-separated string, skipping unusable entries.
fn join_names(value: Option<&Value>, name_key: &str) -> String {
    let Some(items) = value.and_then(Value::as_array) else {
        return String::new();
    };
    items
        .iter()
        .filter_map(|item| {
            item.as_str()
                .or_else(|| item.get(name_key).and_then(Value::as_str))
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn iso_or_null(value: Option<&Value>) -> Value {
    value
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::Secs, true)))
        .unwrap_or(Value::Null)
}

/// Accept `["a", "b"]` or `"a, b"`; normalize to trimmed non-empty strings.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
