use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use dlogger_core::{Pipeline, PipelineConfig};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;
mod preview;

use commands::process::handle_process_command;
use commands::vendors::handle_vendors_command;

/// Normalizes vendor DataLogger exports into a canonical table and an xlsx workbook.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Pipeline configuration (TOML); falls back to $DLOGGER_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Normalize one export and write the workbook
    Process(ProcessArgs),
    /// List the registered vendor profiles
    Vendors,
}

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Vendor profile id or display name
    #[arg(long)]
    pub vendor: String,

    /// Export file (.csv, .xls or .xlsx)
    #[arg(long)]
    pub input: PathBuf,

    /// First calendar day to keep (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last calendar day to keep (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Field to summarize; defaults to the profile's primary metric
    #[arg(long)]
    pub field: Option<String>,

    /// Workbook destination
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Also write the chart series as CSV
    #[arg(long)]
    pub chart_data: Option<PathBuf>,

    /// Rows of the normalized table to print
    #[arg(long, default_value_t = 10)]
    pub preview: usize,

    /// Print the run summary as JSON instead of tables
    #[arg(long)]
    pub json: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let pipeline = build_pipeline(cli.config)?;

    match cli.command {
        Command::Process(args) => handle_process_command(&pipeline, &args),
        Command::Vendors => handle_vendors_command(&pipeline),
    }
}

fn build_pipeline(config: Option<PathBuf>) -> Result<Pipeline> {
    let path = config.or_else(|| std::env::var_os("DLOGGER_CONFIG").map(PathBuf::from));
    let config = match path {
        Some(path) => PipelineConfig::load(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => {
            debug!("no config given, using defaults");
            PipelineConfig::default()
        }
    };
    Pipeline::new(config).context("invalid vendor profiles in config")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn process_arguments_parse_dates() {
        let cli = Cli::try_parse_from([
            "dlogger",
            "process",
            "--vendor",
            "lamon",
            "--input",
            "lamon.csv",
            "--from",
            "2023-02-01",
            "--to",
            "2023-02-02",
        ])
        .unwrap();
        match cli.command {
            Command::Process(args) => {
                assert_eq!(args.from, NaiveDate::from_ymd_opt(2023, 2, 1));
                assert_eq!(args.preview, 10);
                assert!(args.output.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
