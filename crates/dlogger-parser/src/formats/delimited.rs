use csv::StringRecord;
use tracing::debug;

use crate::errors::ParserError;
use crate::model::RawCell;
use crate::registry::{LoaderOptions, RawTableLoader};

use super::{decode_text, normalize_header};

pub struct DelimitedTextLoader {
    options: LoaderOptions,
}

impl Default for DelimitedTextLoader {
    fn default() -> Self {
        Self::new(LoaderOptions::default())
    }
}

impl DelimitedTextLoader {
    const NAME: &'static str = "DELIMITED_TEXT";

    pub fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    fn skip_preamble<'a>(&self, text: &'a str) -> Result<&'a str, ParserError> {
        let mut rest = text;
        for skipped in 0..self.options.preamble_lines {
            match rest.find('\n') {
                Some(pos) => rest = &rest[pos + 1..],
                None => {
                    return Err(ParserError::InvalidHeader {
                        parser: Self::NAME,
                        row_index: self.options.preamble_lines + 1,
                        message: format!(
                            "file ended after {} of {} preamble lines",
                            skipped, self.options.preamble_lines
                        ),
                    });
                }
            }
        }
        Ok(rest)
    }

    fn file_line(&self, record: &StringRecord) -> usize {
        let body_line = record
            .position()
            .map(|position| position.line() as usize)
            .unwrap_or(1);
        body_line + self.options.preamble_lines
    }

    fn csv_error(source: csv::Error) -> ParserError {
        ParserError::Csv {
            parser: Self::NAME,
            source,
        }
    }
}

impl RawTableLoader for DelimitedTextLoader {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn load(&self, contents: &[u8]) -> Result<(Vec<String>, Vec<Vec<RawCell>>), ParserError> {
        let text = decode_text(contents);
        let body = self.skip_preamble(&text)?;

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.options.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(body.as_bytes());
        let mut records = reader.records();

        let header = match records.next() {
            Some(record) => record.map_err(Self::csv_error)?,
            None => {
                return Err(ParserError::InvalidHeader {
                    parser: Self::NAME,
                    row_index: self.options.preamble_lines + 1,
                    message: "missing header row".to_string(),
                });
            }
        };
        let header_line = self.file_line(&header);
        let columns = normalize_header(
            Self::NAME,
            header_line,
            header.iter().map(str::to_string).collect(),
        )?;

        let mut rows = Vec::new();
        let mut blank_rows = 0usize;
        for record in records {
            let record = record.map_err(Self::csv_error)?;
            if record.len() != columns.len() {
                return Err(ParserError::RaggedRow {
                    parser: Self::NAME,
                    line: self.file_line(&record),
                    expected: columns.len(),
                    found: record.len(),
                });
            }

            let cells: Vec<RawCell> = record.iter().map(RawCell::from_text).collect();
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
