//! Rows command - query a list's rows through the query layer.

use anyhow::{bail, Context, Result};
use clap::Args;
use fieldline_github::issue_to_row;
use fieldline_query::{apply_query, QueryPage, RowQuery, SortOrder};
use fieldline_store::ListStore;
use serde_json::json;
use std::collections::BTreeSet;

use crate::cli::output::{cell_text, table};

#[derive(Debug, Args)]
pub struct RowsArgs {
    /// List identifier
    #[arg(long)]
    pub list: String,

    /// Database path
    #[arg(long, env = "FIELDLINE_DB", default_value = "fieldline.db")]
    pub db: String,

    /// Exact-match filter, repeatable (FIELD=VALUE)
    #[arg(long = "filter", value_name = "FIELD=VALUE")]
    pub filters: Vec<String>,

    /// Sort field; append :desc for descending
    #[arg(long)]
    pub sort: Option<String>,

    /// 1-based page number (with --limit)
    #[arg(long)]
    pub page: Option<usize>,

    /// Explicit row offset (ignored when --page is set)
    #[arg(long)]
    pub offset: Option<usize>,

    /// Maximum rows returned
    #[arg(long)]
    pub limit: Option<usize>,

    /// Read natively-authored rows instead of the GitHub mirror
    #[arg(long)]
    pub native: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: RowsArgs) -> Result<()> {
    let store = ListStore::open(&args.db)
        .await
        .with_context(|| format!("failed to open store at {}", args.db))?;

    let query = build_query(&args)?;

    let page = if args.native {
        let rows = store.list_rows(&args.list).await?;
        let page = apply_query(rows, &query);
        QueryPage {
            rows: page.rows.into_iter().map(|r| r.row_data).collect(),
            total: page.total,
        }
    } else {
        let issues = store.list_issues(&args.list).await?;
        let rows: Vec<_> = issues
            .iter()
            .map(|i| issue_to_row(&i.issue_data))
            .collect();
        let page = apply_query(rows, &query);
        QueryPage {
            rows: page.rows.into_iter().map(|r| r.row_data).collect(),
            total: page.total,
        }
    };

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "total": page.total,
                "rows": page.rows,
            }))?
        );
        return Ok(());
    }

    // Column set: every key any returned row carries.
    let columns: BTreeSet<&str> = page
        .rows
        .iter()
        .flat_map(|r| r.keys().map(String::as_str))
        .collect();
    let headers: Vec<&str> = columns.into_iter().collect();

    let mut out = table(&headers);
    for row in &page.rows {
        out.add_row(
            headers
                .iter()
                .map(|h| cell_text(row.get(*h)))
                .collect::<Vec<_>>(),
        );
    }
    println!("{out}");
    println!("{} of {} row(s)", page.rows.len(), page.total);
    Ok(())
}

fn build_query(args: &RowsArgs) -> Result<RowQuery> {
    let mut query = RowQuery::new();

    for filter in &args.filters {
        let Some((field, value)) = filter.split_once('=') else {
            bail!("filter '{filter}' is not FIELD=VALUE");
        };
        query = query.with_filter(field, value);
    }

    if let Some(sort) = &args.sort {
        let (field, order) = match sort.rsplit_once(':') {
            Some((field, "desc")) => (field, SortOrder::Desc),
            Some((field, "asc")) => (field, SortOrder::Asc),
            Some((_, other)) => bail!("unknown sort order '{other}'"),
            None => (sort.as_str(), SortOrder::Asc),
        };
        query = query.with_sort(field, order);
    }

    match (args.page, args.limit) {
        (Some(page), Some(limit)) => {
            query = query.with_page(page, limit);
        }
        (Some(_), None) => bail!("--page requires --limit"),
        (None, _) => {
            if args.offset.is_some() || args.limit.is_some() {
                query = query.with_offset(args.offset.unwrap_or(0), args.limit);
            }
        }
    }

    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> RowsArgs {
        RowsArgs {
            list: "l".to_string(),
            db: ":memory:".to_string(),
            filters: vec![],
            sort: None,
            page: None,
            offset: None,
            limit: None,
            native: false,
            json: false,
        }
    }

    #[test]
    fn test_build_query_filters_and_sort() {
        let mut args = base_args();
        args.filters = vec!["state=open".to_string(), "labels=bug".to_string()];
        args.sort = Some("number:desc".to_string());
        let query = build_query(&args).unwrap();
        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.filters.get("state").map(String::as_str), Some("open"));
        let sort = query.sort.unwrap();
        assert_eq!(sort.field, "number");
        assert_eq!(sort.order, SortOrder::Desc);
    }

    #[test]
    fn test_build_query_rejects_bad_filter() {
        let mut args = base_args();
        args.filters = vec!["no-equals-sign".to_string()];
        assert!(build_query(&args).is_err());
    }

    #[test]
    fn test_build_query_page_requires_limit() {
        let mut args = base_args();
        args.page = Some(2);
        assert!(build_query(&args).is_err());

        args.limit = Some(10);
        let query = build_query(&args).unwrap();
        assert!(query.pagination.is_some());
    }

    #[test]
    fn test_build_query_offset_without_page() {
        let mut args = base_args();
        args.offset = Some(5);
        args.limit = Some(2);
        let query = build_query(&args).unwrap();
        assert!(matches!(
            query.pagination,
            Some(fieldline_query::Pagination::Offset {
                offset: 5,
                limit: Some(2)
            })
        ));
    }
}
