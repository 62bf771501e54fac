//! Store implementation.
//!
//! Table creation happens on construction; both tables are keyed by a
//! composite identity so per-list operations never touch another list's
//! data. Row payloads are stored as JSON text columns and parsed at the
//! boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::info;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),
}

/// One natively-authored list row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListDataRow {
    pub id: String,
    pub list_id: String,
    /// Field key -> value. Untyped at rest; typed at validation time.
    pub row_data: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker. Set once; deleted rows are excluded from reads.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// One mirrored GitHub issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedIssue {
    pub list_id: String,
    pub issue_number: i64,
    /// Raw issue JSON as fetched; mapping to row shape happens at read
    /// time, not at sync time.
    pub issue_data: Value,
    pub fetched_at: DateTime<Utc>,
}

/// SQLite-backed storage for list rows and the issue cache.
pub struct ListStore {
    pool: SqlitePool,
}

impl ListStore {
    /// Wrap an existing pool and ensure the tables exist.
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.init_tables().await?;
        Ok(store)
    }

    /// Open a file-backed store, creating the database if needed.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&format!("sqlite:{path}?mode=rwc"))
            .await?;
        apply_sqlite_pragmas(&pool).await?;
        info!(path, "opened list store");
        Self::new(pool).await
    }

    /// In-memory store (for testing).
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::new(pool).await
    }

    async fn init_tables(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(
            r#"
            CREATE TABLE IF NOT EXISTS list_rows (
                list_id TEXT NOT NULL,
                row_id TEXT NOT NULL,
                row_data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT,
                PRIMARY KEY (list_id, row_id)
            );

            CREATE INDEX IF NOT EXISTS idx_list_rows_list
                ON list_rows(list_id);

            CREATE TABLE IF NOT EXISTS github_issue_cache (
                list_id TEXT NOT NULL,
                issue_number INTEGER NOT NULL,
                issue_data TEXT NOT NULL,
                fetched_at TEXT NOT NULL,
                PRIMARY KEY (list_id, issue_number)
            );

            CREATE INDEX IF NOT EXISTS idx_issue_cache_list
                ON github_issue_cache(list_id);
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // === Native list rows ===

    /// Insert a row whose `row_data` already passed validation.
    pub async fn insert_row(
        &self,
        list_id: &str,
        row_id: &str,
        row_data: &Map<String, Value>,
    ) -> Result<ListDataRow, StoreError> {
        let now = Utc::now();
        let payload = serde_json::to_string(row_data)?;
        sqlx::query(
            r#"
            INSERT INTO list_rows (list_id, row_id, row_data, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(list_id)
        .bind(row_id)
        .bind(&payload)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(ListDataRow {
            id: row_id.to_string(),
            list_id: list_id.to_string(),
            row_data: row_data.clone(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    /// Fetch one row. Soft-deleted rows are not returned.
    pub async fn get_row(
        &self,
        list_id: &str,
        row_id: &str,
    ) -> Result<Option<ListDataRow>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT list_id, row_id, row_data, created_at, updated_at, deleted_at
            FROM list_rows
            WHERE list_id = ? AND row_id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(list_id)
        .bind(row_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_list_row(&r)).transpose()
    }

    /// Replace a row's `row_data` wholesale. The validated merge of old
    /// and new data happens upstream; the store sees the final map.
    /// Returns false when the row does not exist or is soft-deleted
    /// (last-write-wins between concurrent updaters is acceptable here).
    pub async fn update_row_data(
        &self,
        list_id: &str,
        row_id: &str,
        row_data: &Map<String, Value>,
    ) -> Result<bool, StoreError> {
        let payload = serde_json::to_string(row_data)?;
        let result = sqlx::query(
            r#"
            UPDATE list_rows
            SET row_data = ?, updated_at = ?
            WHERE list_id = ? AND row_id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(&payload)
        .bind(Utc::now())
        .bind(list_id)
        .bind(row_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Soft-delete a row. Idempotent: deleting twice reports false the
    /// second time.
    pub async fn soft_delete_row(&self, list_id: &str, row_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE list_rows
            SET deleted_at = ?
            WHERE list_id = ? AND row_id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(Utc::now())
        .bind(list_id)
        .bind(row_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All live rows of one list, oldest first.
    pub async fn list_rows(&self, list_id: &str) -> Result<Vec<ListDataRow>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT list_id, row_id, row_data, created_at, updated_at, deleted_at
            FROM list_rows
            WHERE list_id = ? AND deleted_at IS NULL
            ORDER BY created_at, row_id
            "#,
        )
        .bind(list_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_list_row).collect()
    }

    // === GitHub issue cache ===

    /// Create-or-update one cached issue. Last writer wins on both the
    /// payload and `fetched_at`, which is what makes concurrent resyncs
    /// of the same list safe without locking.
    pub async fn upsert_issue(
        &self,
        list_id: &str,
        issue_number: i64,
        issue_data: &Value,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_string(issue_data)?;
        sqlx::query(
            r#"
            INSERT INTO github_issue_cache (list_id, issue_number, issue_data, fetched_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(list_id, issue_number) DO UPDATE SET
                issue_data = excluded.issue_data,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(list_id)
        .bind(issue_number)
        .bind(&payload)
        .bind(fetched_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All cached issues of one list, by ascending issue number.
    pub async fn list_issues(&self, list_id: &str) -> Result<Vec<CachedIssue>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT list_id, issue_number, issue_data, fetched_at
            FROM github_issue_cache
            WHERE list_id = ?
            ORDER BY issue_number
            "#,
        )
        .bind(list_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_cached_issue).collect()
    }

    /// Number of cached issues for one list.
    pub async fn count_issues(&self, list_id: &str) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM github_issue_cache WHERE list_id = ?")
            .bind(list_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    /// Drop one list's mirror entirely. The cache is fully rebuildable,
    /// so this is safe ahead of a fresh resync.
    pub async fn clear_issues(&self, list_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM github_issue_cache WHERE list_id = ?")
            .bind(list_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

async fn apply_sqlite_pragmas(pool: &SqlitePool) -> Result<(), StoreError> {
    // WAL for concurrent readers while a sync is writing.
    sqlx::query("PRAGMA journal_mode=WAL").execute(pool).await?;
    sqlx::query("PRAGMA synchronous=NORMAL").execute(pool).await?;
    Ok(())
}

fn row_to_list_row(row: &sqlx::sqlite::SqliteRow) -> Result<ListDataRow, StoreError> {
    let payload: String = row.try_get("row_data")?;
    let row_data: Map<String, Value> = serde_json::from_str(&payload)?;
    Ok(ListDataRow {
        id: row.try_get("row_id")?,
        list_id: row.try_get("list_id")?,
        row_data,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn row_to_cached_issue(row: &sqlx::sqlite::SqliteRow) -> Result<CachedIssue, StoreError> {
    let payload: String = row.try_get("issue_data")?;
    Ok(CachedIssue {
        list_id: row.try_get("list_id")?,
        issue_number: row.try_get("issue_number")?,
        issue_data: serde_json::from_str(&payload)?,
        fetched_at: row.try_get("fetched_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().expect("test data is an object").clone()
    }

    #[tokio::test]
    async fn test_insert_and_get_row() {
        let store = ListStore::in_memory().await.unwrap();

        let inserted = store
            .insert_row("list-1", "row-1", &data(json!({"name": "Ada"})))
            .await
            .unwrap();
        assert_eq!(inserted.id, "row-1");

        let loaded = store.get_row("list-1", "row-1").await.unwrap().unwrap();
        assert_eq!(loaded.row_data.get("name"), Some(&json!("Ada")));
        assert!(loaded.deleted_at.is_none());

        assert!(store.get_row("list-2", "row-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_row_data_replaces_wholesale() {
        let store = ListStore::in_memory().await.unwrap();
        store
            .insert_row("list-1", "row-1", &data(json!({"name": "Ada", "age": 36})))
            .await
            .unwrap();

        let updated = store
            .update_row_data("list-1", "row-1", &data(json!({"name": "Grace"})))
            .await
            .unwrap();
        assert!(updated);

        let loaded = store.get_row("list-1", "row-1").await.unwrap().unwrap();
        assert_eq!(loaded.row_data.get("name"), Some(&json!("Grace")));
        assert!(loaded.row_data.get("age").is_none());

        let missing = store
            .update_row_data("list-1", "nope", &data(json!({})))
            .await
            .unwrap();
        assert!(!missing);
    }

    #[tokio::test]
    async fn test_soft_delete_hides_row() {
        let store = ListStore::in_memory().await.unwrap();
        store
            .insert_row("list-1", "row-1", &data(json!({"name": "Ada"})))
            .await
            .unwrap();

        assert!(store.soft_delete_row("list-1", "row-1").await.unwrap());
        assert!(store.get_row("list-1", "row-1").await.unwrap().is_none());
        assert!(store.list_rows("list-1").await.unwrap().is_empty());

        // Second delete is a no-op.
        assert!(!store.soft_delete_row("list-1", "row-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_rows_scoped_by_list() {
        let store = ListStore::in_memory().await.unwrap();
        for i in 0..3 {
            store
                .insert_row("list-1", &format!("row-{i}"), &data(json!({"i": i})))
                .await
                .unwrap();
        }
        store
            .insert_row("list-2", "other", &data(json!({})))
            .await
            .unwrap();

        let rows = store.list_rows("list-1").await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.list_id == "list-1"));
    }

    #[tokio::test]
    async fn test_issue_upsert_is_idempotent() {
        let store = ListStore::in_memory().await.unwrap();
        let now = Utc::now();

        store
            .upsert_issue("list-1", 7, &json!({"title": "first"}), now)
            .await
            .unwrap();
        store
            .upsert_issue("list-1", 7, &json!({"title": "second"}), now)
            .await
            .unwrap();

        assert_eq!(store.count_issues("list-1").await.unwrap(), 1);
        let issues = store.list_issues("list-1").await.unwrap();
        assert_eq!(issues[0].issue_data, json!({"title": "second"}));
    }

    #[tokio::test]
    async fn test_issue_cache_isolated_per_list() {
        let store = ListStore::in_memory().await.unwrap();
        let now = Utc::now();
        store.upsert_issue("list-1", 1, &json!({}), now).await.unwrap();
        store.upsert_issue("list-2", 1, &json!({}), now).await.unwrap();

        assert_eq!(store.count_issues("list-1").await.unwrap(), 1);
        assert_eq!(store.count_issues("list-2").await.unwrap(), 1);

        store.clear_issues("list-1").await.unwrap();
        assert_eq!(store.count_issues("list-1").await.unwrap(), 0);
        assert_eq!(store.count_issues("list-2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_issues_ordered_by_number() {
        let store = ListStore::in_memory().await.unwrap();
        let now = Utc::now();
        for n in [5, 1, 3] {
            store.upsert_issue("list-1", n, &json!({"n": n}), now).await.unwrap();
        }
        let numbers: Vec<i64> = store
            .list_issues("list-1")
            .await
            .unwrap()
            .iter()
            .map(|i| i.issue_number)
            .collect();
        assert_eq!(numbers, vec![1, 3, 5]);
    }

    #[tokio::test]
    async fn test_open_file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fieldline.db");
        let store = ListStore::open(path.to_str().unwrap()).await.unwrap();
        store
            .insert_row("list-1", "row-1", &data(json!({"k": "v"})))
            .await
            .unwrap();
        assert_eq!(store.list_rows("list-1").await.unwrap().len(), 1);
    }
}
