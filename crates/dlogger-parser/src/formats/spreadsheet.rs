use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use tracing::debug;

use crate::errors::ParserError;
use crate::model::RawCell;
use crate::registry::RawTableLoader;

use super::normalize_header;

#[derive(Debug, Default)]
pub struct SpreadsheetLoader;

impl SpreadsheetLoader {
    const NAME: &'static str = "SPREADSHEET";

    fn spreadsheet_error(source: calamine::Error) -> ParserError {
        ParserError::Spreadsheet {
            parser: Self::NAME,
            source,
        }
    }

    fn header_name(cell: &Data) -> String {
        match cell {
            Data::String(value) => value.trim().to_string(),
            Data::Empty => String::new(),
            other => other.to_string(),
        }
    }

    fn to_raw_cell(cell: &Data) -> RawCell {
        match cell {
            Data::Int(value) => RawCell::Number(*value as f64),
            Data::Float(value) => RawCell::Number(*value),
            // Date and time cells keep their serial value; timestamp rules decode it.
            Data::DateTime(value) => RawCell::Number(value.as_f64()),
            Data::String(value) | Data::DateTimeIso(value) | Data::DurationIso(value) => {
                RawCell::from_text(value)
            }
            Data::Bool(value) => RawCell::Text(value.to_string()),
            Data::Error(err) => RawCell::Text(err.to_string()),
            Data::Empty => RawCell::Empty,
        }
    }
}

impl RawTableLoader for SpreadsheetLoader {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn load(&self, contents: &[u8]) -> Result<(Vec<String>, Vec<Vec<RawCell>>), ParserError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(contents.to_vec()))
            .map_err(Self::spreadsheet_error)?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ParserError::InvalidHeader {
                parser: Self::NAME,
                row_index: 1,
                message: "workbook does not contain any worksheet".to_string(),
            })?
            .map_err(Self::spreadsheet_error)?;

        let mut range_rows = range.rows();
        let header = range_rows.next().ok_or_else(|| ParserError::InvalidHeader {
            parser: Self::NAME,
            row_index: 1,
            message: "first worksheet is empty".to_string(),
        })?;
        let columns = normalize_header(
            Self::NAME,
            1,
            header.iter().map(Self::header_name).collect(),
        )?;

        let mut rows = Vec::new();
        let mut blank_rows = 0usize;
        for (offset, row) in range_rows.enumerate() {
            if row.len() != columns.len() {
                return Err(ParserError::RaggedRow {
                    parser: Self::NAME,
                    line: offset + 2,
                    expected: columns.len(),
                    found: row.len(),
                });
            }

            let cells: Vec<RawCell> = row.iter().map(Self::to_raw_cell).collect();
            if cells.iter().all(RawCell::is_empty) {
                blank_rows += 1;
                continue;
            }
            rows.push(cells);
        }

        if blank_rows > 0 {
            debug!(blank_rows, "skipped rows without any values");
        }

        Ok((columns, rows))
    }
}
