//! Row query layer.
//!
//! Applies user-specified filter/sort/pagination parameters to a row set
//! already fetched from storage. The layer is pure and deliberately
//! permissive: malformed parameters are never an error. An unknown filter
//! field simply matches nothing; an unknown sort field sorts every row
//! with the same (empty) key.
//!
//! Known limitations, by design rather than omission:
//! - filtering is exact, case-sensitive string match only - no partial,
//!   fuzzy or type-aware comparison
//! - sorting is lexicographic on the stringified value; ISO dates order
//!   correctly, free-form numbers need not

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use fieldline_github::IssueRow;
use fieldline_store::ListDataRow;

/// Anything row-shaped: a bag of values keyed by field key.
pub trait RowData {
    fn row_data(&self) -> &Map<String, Value>;
}

impl RowData for Map<String, Value> {
    fn row_data(&self) -> &Map<String, Value> {
        self
    }
}

impl RowData for ListDataRow {
    fn row_data(&self) -> &Map<String, Value> {
        &self.row_data
    }
}

impl RowData for IssueRow {
    fn row_data(&self) -> &Map<String, Value> {
        &self.row_data
    }
}

/// Sort direction; `asc` unless asked otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Single-field sort specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

/// Page selection: an explicit window, or a 1-based page of fixed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    Offset { offset: usize, limit: Option<usize> },
    Page { page: usize, limit: usize },
}

impl Pagination {
    fn window(&self) -> (usize, Option<usize>) {
        match *self {
            Pagination::Offset { offset, limit } => (offset, limit),
            Pagination::Page { page, limit } => (page.saturating_sub(1) * limit, Some(limit)),
        }
    }
}

/// A complete query: every part optional.
#[derive(Debug, Clone, Default)]
pub struct RowQuery {
    /// Field key -> expected value, all of which must match exactly.
    pub filters: BTreeMap<String, String>,
    pub sort: Option<SortSpec>,
    pub pagination: Option<Pagination>,
}

impl RowQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    pub fn with_sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(SortSpec {
            field: field.into(),
            order,
        });
        self
    }

    pub fn with_page(mut self, page: usize, limit: usize) -> Self {
        self.pagination = Some(Pagination::Page { page, limit });
        self
    }

    pub fn with_offset(mut self, offset: usize, limit: Option<usize>) -> Self {
        self.pagination = Some(Pagination::Offset { offset, limit });
        self
    }
}

/// One page of results plus the pre-pagination match count.
#[derive(Debug, Clone)]
pub struct QueryPage<T> {
    pub rows: Vec<T>,
    pub total: usize,
}

/// Run a query over a row set.
pub fn apply_query<T: RowData>(rows: Vec<T>, query: &RowQuery) -> QueryPage<T> {
    let mut matched: Vec<T> = rows
        .into_iter()
        .filter(|row| matches_filters(row.row_data(), &query.filters))
        .collect();

    if let Some(sort) = &query.sort {
        // Stable: rows with equal keys keep their incoming order.
        matched.sort_by(|a, b| {
            let ka = sort_key(a.row_data(), &sort.field);
            let kb = sort_key(b.row_data(), &sort.field);
            match sort.order {
                SortOrder::Asc => ka.cmp(&kb),
                SortOrder::Desc => kb.cmp(&ka),
            }
        });
    }

    let total = matched.len();
    let rows = match query.pagination {
        Some(pagination) => {
            let (offset, limit) = pagination.window();
            let iter = matched.into_iter().skip(offset);
            match limit {
                Some(limit) => iter.take(limit).collect(),
                None => iter.collect(),
            }
        }
        None => matched,
    };

    QueryPage { rows, total }
}

fn matches_filters(data: &Map<String, Value>, filters: &BTreeMap<String, String>) -> bool {
    filters.iter().all(|(field, expected)| {
        match data.get(field).and_then(comparable_string) {
            Some(actual) => actual == *expected,
            // Missing and null never match - including filters on fields
            // no row has, which yield an empty result, not an error.
            None => false,
        }
    })
}

/// Stringification used for exact-match filtering. Null and structured
/// values have no comparable form.
fn comparable_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn sort_key(data: &Map<String, Value>, field: &str) -> String {
    data.get(field).and_then(comparable_string).unwrap_or_default()
}
