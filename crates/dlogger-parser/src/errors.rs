use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("unsupported file format for '{filename}': expected .csv, .xls or .xlsx")]
    UnsupportedFormat { filename: String },

    #[error("{parser} header row {row_index} invalid: {message}")]
    InvalidHeader {
        parser: &'static str,
        row_index: usize,
        message: String,
    },

    #[error("{parser} CSV error: {source}")]
    Csv {
        parser: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error("{parser} spreadsheet error: {source}")]
    Spreadsheet {
        parser: &'static str,
        #[source]
        source: calamine::Error,
    },

    #[error("{parser} line {line} has {found} fields but the header has {expected}")]
    RaggedRow {
        parser: &'static str,
        line: usize,
        expected: usize,
        found: usize,
    },
}

impl ParserError {
    /// True for failures that mean the bytes could not be decoded into a rectangular table.
    pub fn is_parse_error(&self) -> bool {
        !matches!(self, ParserError::UnsupportedFormat { .. })
    }
}
