//! Schema command - parse and check a schema document.

use anyhow::{Context, Result};
use clap::Args;
use fieldline_schema::parse_schema_str;
use serde_json::json;
use std::path::PathBuf;

use crate::cli::output::table;

#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// Schema document to check (JSON)
    pub file: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: SchemaArgs) -> Result<()> {
    let raw = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let fields = parse_schema_str(&raw)
        .with_context(|| format!("schema rejected: {}", args.file.display()))?;

    if args.json {
        let summary: Vec<_> = fields
            .iter()
            .map(|f| {
                json!({
                    "key": f.key,
                    "type": f.kind.type_name(),
                    "label": f.label,
                    "required": f.required,
                    "displayOrder": f.display_order,
                    "conditional": f.visibility.is_some(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let mut out = table(&["key", "type", "label", "required", "order", "visible when"]);
    for field in &fields {
        let condition = field
            .visibility
            .as_ref()
            .map(|v| {
                format!(
                    "{} {:?} {}",
                    v.field,
                    v.operator,
                    v.value.as_deref().unwrap_or("")
                )
            })
            .unwrap_or_default();
        out.add_row(vec![
            field.key.clone(),
            field.kind.type_name().to_string(),
            field.label.clone(),
            field.required.to_string(),
            field.display_order.to_string(),
            condition,
        ]);
    }
    println!("{out}");
    println!("{} field(s), schema OK", fields.len());
    Ok(())
}
