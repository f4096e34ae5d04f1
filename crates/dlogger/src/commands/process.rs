use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dlogger_core::{Pipeline, PipelineRequest};
use tracing::info;

use crate::preview::{dropped_rows_table, preview_table, statistics_table};
use crate::ProcessArgs;

/// Runs one export through the pipeline and writes the workbook (and chart CSV).
pub fn handle_process_command(pipeline: &Pipeline, args: &ProcessArgs) -> Result<()> {
    let contents = fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let filename = args
        .input
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{} has no usable file name", args.input.display()))?;

    let request = PipelineRequest::new(&contents, filename, &args.vendor)
        .with_window(args.from, args.to)
        .with_stats_field(args.field.as_deref());
    let output = pipeline
        .run(&request)
        .with_context(|| format!("failed to process {} as {}", filename, args.vendor))?;

    let workbook_path = args
        .output
        .clone()
        .unwrap_or_else(|| output.workbook.file_name.into());
    let mut artifacts: Vec<(&Path, Vec<u8>)> = Vec::with_capacity(2);
    artifacts.push((workbook_path.as_path(), output.workbook.bytes.clone()));
    if let Some(path) = &args.chart_data {
        let mut csv = Vec::new();
        output
            .chart
            .write_csv(&mut csv)
            .context("failed to encode chart data")?;
        artifacts.push((path.as_path(), csv));
    }
    write_artifacts(&artifacts)?;
    info!(path = %workbook_path.display(), bytes = output.workbook.bytes.len(), "workbook written");
    if let Some(path) = &args.chart_data {
        info!(path = %path.display(), points = output.chart.len(), "chart data written");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output.summary())?);
        return Ok(());
    }

    println!("File: {} ({})", output.source.filename, output.source.format);
    println!("Vendor: {}", output.vendor);
    println!("Fingerprint: {}", output.source.content_hash);
    println!("Rows: {} kept, {} dropped", output.table.height(), output.dropped);
    if !output.dropped_rows.is_empty() {
        println!("{}", dropped_rows_table(&output.dropped_rows));
    }
    println!("{}", statistics_table(&output.stats_field, &output.statistics));
    if args.preview > 0 {
        println!("{}", preview_table(output.table.frame(), args.preview)?);
    }
    println!(
        "Workbook: {} ({})",
        workbook_path.display(),
        output.workbook.mime_type
    );
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Stages every artifact next to its destination and only renames once all writes succeeded.
fn write_artifacts(artifacts: &[(&Path, Vec<u8>)]) -> Result<()> {
    let mut staged = Vec::with_capacity(artifacts.len());
    for (path, bytes) in artifacts {
        let staging = staging_path(path);
        if let Err(err) = fs::write(&staging, bytes) {
            for leftover in &staged {
                let _ = fs::remove_file(leftover);
            }
            return Err(err).with_context(|| format!("failed to write {}", path.display()));
        }
        staged.push(staging);
    }

    for ((path, _), staging) in artifacts.iter().zip(&staged) {
        fs::rename(staging, path)
            .with_context(|| format!("failed to move output into {}", path.display()))?;
    }
    Ok(())
}
