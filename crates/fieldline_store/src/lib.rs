//! List Data Storage
//!
//! SQLite-backed persistence for the two row-shaped tables the engine
//! owns:
//!
//! - `list_rows`: natively-authored list rows (validated upstream),
//!   soft-deleted only - the engine never hard-deletes a row
//! - `github_issue_cache`: the materialized mirror of a GitHub-backed
//!   list, keyed by `(list_id, issue_number)` and rebuilt by resync
//!
//! There is no module-level state: every operation goes through an owned
//! [`ListStore`] handle wrapping a connection pool, so multiple instances
//! can share one database file.

pub mod store;

pub use store::{CachedIssue, ListDataRow, ListStore, StoreError};
