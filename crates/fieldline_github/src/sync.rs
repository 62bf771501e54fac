//! Full resync of one list's issue mirror.
//!
//! Pages through the issues endpoint until a partial page signals the
//! end, dropping pull requests and upserting everything else. There is no
//! all-or-nothing rollback: pages committed before a failure stay
//! committed, and the next invocation converges on the same final state
//! because the upsert is idempotent.

use async_trait::async_trait;
use chrono::Utc;
use fieldline_store::{ListStore, StoreError};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Fixed page size for the paginated fetch.
pub const SYNC_PAGE_SIZE: u32 = 100;

/// Errors surfaced by a resync. Transient by nature: the caller (a cron
/// trigger or manual refresh) logs and re-invokes rather than recovering
/// inline; no retry happens here.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub rate limit (HTTP {status}) on page {page}")]
    RateLimited { status: u16, page: u32 },

    #[error("GitHub returned HTTP {status} on page {page}")]
    Status { status: u16, page: u32 },

    #[error("cache write failed: {0}")]
    Store(#[from] StoreError),
}

/// One page of raw issues from the upstream API.
///
/// The seam between the sync loop and the network. Production uses
/// [`crate::GithubClient`]; tests substitute an in-memory fetcher.
#[async_trait]
pub trait IssueFetcher: Send + Sync {
    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Vec<Value>, SyncError>;
}

/// Mirror every issue of the fetcher's repository into the cache for
/// `list_id`. Returns the number of issues synced, after pull-request
/// filtering.
///
/// Safe to run concurrently for different lists (cache rows are keyed by
/// list) and for the same list (last writer wins on identical state).
pub async fn sync_list_cache<F: IssueFetcher + ?Sized>(
    store: &ListStore,
    list_id: &str,
    fetcher: &F,
) -> Result<usize, SyncError> {
    let mut page = 1u32;
    let mut synced = 0usize;

    loop {
        let issues = fetcher.fetch_page(page, SYNC_PAGE_SIZE).await?;
        let full_page = issues.len() as u32 == SYNC_PAGE_SIZE;
        debug!(list_id, page, count = issues.len(), "fetched issue page");

        for issue in &issues {
            // The issues endpoint interleaves pull requests; the mirror
            // only holds real issues.
            if issue.get("pull_request").is_some() {
                continue;
            }
            let Some(number) = issue.get("number").and_then(Value::as_i64) else {
                warn!(list_id, page, "skipping issue without a number");
                continue;
            };
            store
                .upsert_issue(list_id, number, issue, Utc::now())
                .await?;
            synced += 1;
        }

        if !full_page {
            break;
        }
        page += 1;
    }

    info!(list_id, synced, pages = page, "issue resync complete");
    Ok(synced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn issue(number: i64) -> Value {
        json!({
            "number": number,
            "title": format!("Issue {number}"),
            "state": if number % 2 == 0 { "closed" } else { "open" },
            "labels": [],
            "assignees": [],
        })
    }

    fn pull_request(number: i64) -> Value {
        json!({
            "number": number,
            "title": format!("PR {number}"),
            "pull_request": {"url": format!("https://api.github.com/pulls/{number}")},
        })
    }

    /// Serves pre-built pages; fails if asked past the end.
    struct FakeFetcher {
        pages: Vec<Vec<Value>>,
        calls: AtomicU32,
    }

    impl FakeFetcher {
        fn new(pages: Vec<Vec<Value>>) -> Self {
            Self {
                pages,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl IssueFetcher for FakeFetcher {
        async fn fetch_page(&self, page: u32, _per_page: u32) -> Result<Vec<Value>, SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .pages
                .get((page - 1) as usize)
                .cloned()
                .unwrap_or_default())
        }
    }

    /// Returns one good page, then a rate-limit failure.
    struct FailingFetcher;

    #[async_trait]
    impl IssueFetcher for FailingFetcher {
        async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Vec<Value>, SyncError> {
            if page == 1 {
                Ok((1..=per_page as i64).map(issue).collect())
            } else {
                Err(SyncError::RateLimited { status: 403, page })
            }
        }
    }

    #[tokio::test]
    async fn test_sync_stops_on_partial_page() {
        let store = ListStore::in_memory().await.unwrap();
        let full_page: Vec<Value> = (1..=100).map(issue).collect();
        let partial_page: Vec<Value> = (101..=130).map(issue).collect();
        let fetcher = FakeFetcher::new(vec![full_page, partial_page]);

        let synced = sync_list_cache(&store, "list-1", &fetcher).await.unwrap();
        assert_eq!(synced, 130);
        assert_eq!(store.count_issues("list-1").await.unwrap(), 130);
        // Partial second page means no third request.
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_sync_stops_on_empty_first_page() {
        let store = ListStore::in_memory().await.unwrap();
        let fetcher = FakeFetcher::new(vec![]);
        let synced = sync_list_cache(&store, "list-1", &fetcher).await.unwrap();
        assert_eq!(synced, 0);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pull_requests_filtered_out() {
        let store = ListStore::in_memory().await.unwrap();
        let fetcher = FakeFetcher::new(vec![vec![
            issue(1),
            pull_request(2),
            issue(3),
            pull_request(4),
        ]]);

        let synced = sync_list_cache(&store, "list-1", &fetcher).await.unwrap();
        assert_eq!(synced, 2);

        let numbers: Vec<i64> = store
            .list_issues("list-1")
            .await
            .unwrap()
            .iter()
            .map(|i| i.issue_number)
            .collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_sync_twice_is_idempotent() {
        let store = ListStore::in_memory().await.unwrap();
        let pages = vec![(1..=30).map(issue).collect::<Vec<_>>()];
        let fetcher = FakeFetcher::new(pages);

        let first = sync_list_cache(&store, "list-1", &fetcher).await.unwrap();
        let second = sync_list_cache(&store, "list-1", &fetcher).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.count_issues("list-1").await.unwrap(), 30);
    }

    #[tokio::test]
    async fn test_failure_preserves_partial_progress() {
        let store = ListStore::in_memory().await.unwrap();

        let err = sync_list_cache(&store, "list-1", &FailingFetcher)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::RateLimited { status: 403, page: 2 }));

        // Page 1 stayed committed; the next run can resume from scratch
        // and converge.
        assert_eq!(store.count_issues("list-1").await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_concurrent_lists_isolated() {
        let store = ListStore::in_memory().await.unwrap();
        let fetcher_a = FakeFetcher::new(vec![(1..=5).map(issue).collect()]);
        let fetcher_b = FakeFetcher::new(vec![(1..=3).map(issue).collect()]);

        sync_list_cache(&store, "list-a", &fetcher_a).await.unwrap();
        sync_list_cache(&store, "list-b", &fetcher_b).await.unwrap();

        assert_eq!(store.count_issues("list-a").await.unwrap(), 5);
        assert_eq!(store.count_issues("list-b").await.unwrap(), 3);
    }
}
