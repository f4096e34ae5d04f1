// crates/dlogger-core/src/error.rs

use dlogger_parser::ParserError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] ParserError),

    #[error("unknown vendor '{0}'")]
    UnknownVendor(String),

    #[error("vendor profile '{0}' is already registered")]
    DuplicateProfile(String),

    #[error("vendor profile '{vendor}' is invalid: {message}")]
    InvalidProfile { vendor: String, message: String },

    #[error("{vendor} export is missing required column(s): {}", .missing.join(", "))]
    MissingColumns { vendor: String, missing: Vec<String> },

    #[error("{vendor} row {row}: column '{column}' value '{value}' is not numeric")]
    FieldCast {
        vendor: String,
        row: usize,
        column: String,
        value: String,
    },

    #[error("no values available to summarize field '{field}'")]
    EmptyAggregation { field: String },

    #[error("field '{field}' is not a numeric column of the table")]
    UnknownField { field: String },

    #[error("workbook encoding failed: {0}")]
    ExportEncoding(String),

    #[error("canonical table invalid: {0}")]
    InvalidTable(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
