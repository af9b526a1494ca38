use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};

use healthdump_core::csv_io::{export_csv, import_records, parse_health_csv};
use healthdump_core::models::now;
use healthdump_core::service::HealthService;

pub(crate) fn cmd_import(svc: &HealthService, path: &Path, dry_run: bool, json: bool) -> Result<()> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;

    let records = parse_health_csv(file, now())?;

    if records.is_empty() {
        if json {
            println!(
                "{}",
                serde_json::json!({ "error": "No rows found in CSV file" })
            );
        } else {
            eprintln!("No rows found in CSV file.");
        }
        return Ok(());
    }

    let summary = import_records(svc, &records, dry_run)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "dry_run": dry_run,
                "rows_parsed": summary.rows_parsed,
                "created": summary.created,
                "replaced": summary.replaced,
                "skipped": summary.skipped,
            })
        );
    } else if dry_run {
        println!("Dry run, no changes made.\n");
        println!("  Rows parsed:     {}", summary.rows_parsed);
        println!("  Days to create:  {}", summary.created);
        println!("  Days to replace: {}", summary.replaced);
        println!("  Rows to skip:    {}", summary.skipped);
    } else {
        println!("Import complete.\n");
        println!("  Rows parsed:   {}", summary.rows_parsed);
        println!("  Days created:  {}", summary.created);
        println!("  Days replaced: {}", summary.replaced);
        println!("  Rows skipped:  {}", summary.skipped);
    }

    Ok(())
}

pub(crate) fn cmd_export(svc: &HealthService, output: Option<&Path>) -> Result<()> {
    let rows = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create file: {}", path.display()))?;
            let rows = export_csv(svc, BufWriter::new(file))?;
            eprintln!("Exported {rows} rows to {}", path.display());
            rows
        }
        None => export_csv(svc, io::stdout().lock())?,
    };
    tracing::debug!(rows, "exported health records");
    Ok(())
}
