//! GitHub Issue <-> Row Adapter
//!
//! A GitHub-backed list does not author its own rows: they are mirrored
//! from a repository's issues. This crate owns the three pieces of that
//! mirror:
//!
//! - [`issue::issue_to_row`]: flatten one raw issue into row shape
//!   (deterministic, total - it never fails on well-formed issue JSON)
//! - [`issue::row_data_to_issue_payload`]: the lossy inverse, used when
//!   pushing local edits back upstream
//! - [`sync::sync_list_cache`]: pagination-complete full resync into the
//!   local cache, idempotent via composite-key upsert
//!
//! The network seam is [`sync::IssueFetcher`]; the production
//! implementation is [`client::GithubClient`], which receives an
//! already-authorized context. Token acquisition, scope checks and repo
//! format validation are the caller's concern, not this crate's.

pub mod client;
pub mod issue;
pub mod sync;

pub use client::{GithubClient, GithubContext};
pub use issue::{issue_to_row, row_data_to_issue_payload, IssuePayload, IssueRow};
pub use sync::{sync_list_cache, IssueFetcher, SyncError, SYNC_PAGE_SIZE};
