use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ParserError;
use crate::format::detect_format;
use crate::formats::{DelimitedTextLoader, SpreadsheetLoader};
use crate::model::{FileFormat, RawCell, RawTable, SourceFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderOptions {
    pub delimiter: u8,
    pub preamble_lines: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            delimiter: b';',
            preamble_lines: 5,
        }
    }
}

pub trait RawTableLoader {
    fn name(&self) -> &'static str;
    fn load(&self, contents: &[u8]) -> Result<(Vec<String>, Vec<Vec<RawCell>>), ParserError>;
}

pub fn load_raw_table(
    contents: &[u8],
    filename: &str,
    options: &LoaderOptions,
) -> Result<RawTable, ParserError> {
    let format = detect_format(filename)?;
    match format {
        FileFormat::DelimitedText => {
            let loader = DelimitedTextLoader::new(*options);
            load_with_loader(contents, filename, format, &loader)
        }
        FileFormat::Spreadsheet => {
            load_with_loader(contents, filename, format, &SpreadsheetLoader)
        }
    }
}

pub fn load_with_loader(
    contents: &[u8],
    filename: &str,
    format: FileFormat,
    loader: &dyn RawTableLoader,
) -> Result<RawTable, ParserError> {
    let (columns, rows) = loader.load(contents)?;
    debug!(
        loader = loader.name(),
        filename,
        columns = columns.len(),
        rows = rows.len(),
        "loaded raw table"
    );
    RawTable::new(SourceFile::new(filename, format, contents), columns, rows)
}
