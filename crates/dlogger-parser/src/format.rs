use std::ffi::OsStr;
use std::path::Path;

use crate::errors::ParserError;
use crate::model::FileFormat;

/// Classifies an upload by its extension only.
pub fn detect_format(filename: &str) -> Result<FileFormat, ParserError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("csv") => Ok(FileFormat::DelimitedText),
        Some("xls") | Some("xlsx") => Ok(FileFormat::Spreadsheet),
        _ => Err(ParserError::UnsupportedFormat {
            filename: filename.to_string(),
        }),
    }
}
