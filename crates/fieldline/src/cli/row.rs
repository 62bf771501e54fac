//! Validate command - run one row through the validation engine.

use anyhow::{bail, Context, Result};
use clap::Args;
use fieldline_schema::{parse_schema_str, validate_row, RowValidation};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Schema document (JSON)
    #[arg(long)]
    pub schema: PathBuf,

    /// Row document to validate (JSON object)
    pub row: PathBuf,
}

pub fn run(args: ValidateArgs) -> Result<()> {
    let raw_schema = std::fs::read_to_string(&args.schema)
        .with_context(|| format!("failed to read {}", args.schema.display()))?;
    let fields = parse_schema_str(&raw_schema)
        .with_context(|| format!("schema rejected: {}", args.schema.display()))?;

    let raw_row = std::fs::read_to_string(&args.row)
        .with_context(|| format!("failed to read {}", args.row.display()))?;
    let row_value: serde_json::Value =
        serde_json::from_str(&raw_row).context("row document is not valid JSON")?;
    let Some(row) = row_value.as_object() else {
        bail!("row document must be a JSON object");
    };

    match validate_row(&fields, row) {
        RowValidation::Valid { data } => {
            println!("{}", serde_json::to_string_pretty(&data)?);
            Ok(())
        }
        RowValidation::Invalid { errors } => {
            for err in &errors {
                eprintln!("  {err}");
            }
            bail!("row failed validation with {} error(s)", errors.len());
        }
    }
}
