//! Fieldline CLI
//!
//! Operational surface for the list engine: check schemas, validate rows,
//! run the GitHub mirror resync (the cron-trigger entry point) and query
//! cached rows. Long-running syncs belong here, never inline with a
//! user-facing request.

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing::error;

mod cli;

#[derive(Parser, Debug)]
#[command(
    name = "fieldline",
    about = "List schemas, validated rows and GitHub-backed mirrors"
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse and check a schema document
    Schema(cli::schema::SchemaArgs),

    /// Validate a row document against a schema
    Validate(cli::row::ValidateArgs),

    /// Mirror a GitHub repository's issues into a list's cache
    Sync(cli::sync::SyncArgs),

    /// Query a list's rows (cached mirror or native)
    Rows(cli::rows::RowsArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();

    let default_filter = if args.verbose {
        "fieldline=debug,fieldline_github=debug,fieldline_store=debug"
    } else {
        "fieldline=info,fieldline_github=info,fieldline_store=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match args.command {
        Commands::Schema(args) => cli::schema::run(args),
        Commands::Validate(args) => cli::row::run(args),
        Commands::Sync(args) => cli::sync::run(args).await,
        Commands::Rows(args) => cli::rows::run(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
