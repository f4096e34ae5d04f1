use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::ParserError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileFormat {
    DelimitedText,
    Spreadsheet,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::DelimitedText => "delimited_text",
            FileFormat::Spreadsheet => "spreadsheet",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cell exactly as the source file typed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawCell {
    Text(String),
    Number(f64),
    Empty,
}

impl RawCell {
    pub fn from_text(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            RawCell::Empty
        } else {
            RawCell::Text(trimmed.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RawCell::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawCell::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawCell::Number(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for RawCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawCell::Text(value) => f.write_str(value),
            RawCell::Number(value) => write!(f, "{value}"),
            RawCell::Empty => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub filename: String,
    pub format: FileFormat,
    pub content_hash: String,
}

impl SourceFile {
    pub fn new(filename: impl Into<String>, format: FileFormat, contents: &[u8]) -> Self {
        Self {
            filename: filename.into(),
            format,
            content_hash: blake3::hash(contents).to_hex().to_string(),
        }
    }
}

/// Rectangular table of source cells, header in file order.
#[derive(Debug, Clone)]
pub struct RawTable {
    source: SourceFile,
    columns: Vec<String>,
    rows: Vec<Vec<RawCell>>,
}

impl RawTable {
    pub fn new(
        source: SourceFile,
        columns: Vec<String>,
        rows: Vec<Vec<RawCell>>,
    ) -> Result<Self, ParserError> {
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(ParserError::RaggedRow {
                    parser: "raw_table",
                    line: idx + 2,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }
        Ok(Self {
            source,
            columns,
            rows,
        })
    }

    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<RawRow<'_>> {
        self.rows.get(index).map(|cells| RawRow {
            columns: &self.columns,
            index,
            cells,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = RawRow<'_>> + '_ {
        self.rows.iter().enumerate().map(|(index, cells)| RawRow {
            columns: &self.columns,
            index,
            cells,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RawRow<'a> {
    columns: &'a [String],
    index: usize,
    cells: &'a [RawCell],
}

impl<'a> RawRow<'a> {
    /// Zero-based position of the row among the data rows.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self, column: &str) -> Option<&'a RawCell> {
        let position = self.columns.iter().position(|name| name == column)?;
        self.cells.get(position)
    }

    pub fn cells(&self) -> &'a [RawCell] {
        self.cells
    }
}
