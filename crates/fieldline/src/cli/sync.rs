//! Sync command - full resync of one list's GitHub mirror.
//!
//! This is the cron-trigger surface: failures propagate with partial
//! progress preserved, and the next scheduled run converges because the
//! cache upsert is idempotent.

use anyhow::{Context, Result};
use clap::Args;
use fieldline_github::{sync_list_cache, GithubClient, GithubContext};
use fieldline_store::ListStore;

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// List identifier owning the cache
    #[arg(long)]
    pub list: String,

    /// Repository owner (user or organization)
    #[arg(long)]
    pub owner: String,

    /// Repository name
    #[arg(long)]
    pub repo: String,

    /// GitHub access token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Database path
    #[arg(long, env = "FIELDLINE_DB", default_value = "fieldline.db")]
    pub db: String,
}

pub async fn run(args: SyncArgs) -> Result<()> {
    let store = ListStore::open(&args.db)
        .await
        .with_context(|| format!("failed to open store at {}", args.db))?;

    let client = GithubClient::new(GithubContext {
        access_token: args.token,
        owner: args.owner.clone(),
        repo_name: args.repo.clone(),
    });

    let synced = sync_list_cache(&store, &args.list, &client)
        .await
        .with_context(|| {
            format!(
                "resync of {}/{} failed for list '{}'",
                args.owner, args.repo, args.list
            )
        })?;

    println!("synced {synced} issue(s) into list '{}'", args.list);
    Ok(())
}
