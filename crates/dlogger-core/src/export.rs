//! Minimal xlsx writer: one worksheet whose used range is wrapped in a styled table object.

use std::fmt::Write as FmtWrite;
use std::io::{Cursor, Write};

use polars::prelude::{Column, DataFrame, DataType, TimeUnit};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{PipelineError, Result};
use crate::table::CanonicalTable;

pub const XLSX_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const XLSX_FILE_NAME: &str = "arquivo_processado_tabela.xlsx";

const MAX_COLUMNS: usize = 16_384;
const MAX_DATA_ROWS: usize = 1_048_575;
/// Days between the 1900 date system epoch (1899-12-30) and 1970-01-01.
const UNIX_EPOCH_SERIAL: f64 = 25_569.0;
const MICROS_PER_DAY: f64 = 86_400_000_000.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub table_name: String,
    pub table_style: String,
    pub sheet_name: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            table_name: "Tabela1".to_string(),
            table_style: "TableStyleMedium9".to_string(),
            sheet_name: "Sheet1".to_string(),
        }
    }
}

impl ExportOptions {
    pub fn validate(&self) -> Result<()> {
        let name = &self.table_name;
        let mut chars = name.chars();
        let valid_start = chars
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '\\');
        if !valid_start
            || name.chars().count() > 255
            || !chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.')
            || is_cell_reference(name)
        {
            return Err(PipelineError::Config(format!(
                "table name '{name}' is not a valid defined name"
            )));
        }

        let sheet = &self.sheet_name;
        if sheet.is_empty()
            || sheet.chars().count() > 31
            || sheet.contains(['[', ']', ':', '*', '?', '/', '\\'])
        {
            return Err(PipelineError::Config(format!(
                "sheet name '{sheet}' is not a valid worksheet name"
            )));
        }

        if self.table_style.trim().is_empty() {
            return Err(PipelineError::Config("table style must not be empty".to_string()));
        }
        Ok(())
    }
}

/// `A1`, `TBL1`, `R`, `C7` or `R1C1`: names Excel would read as a cell address.
fn is_cell_reference(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();

    let letters = upper.bytes().take_while(u8::is_ascii_alphabetic).count();
    let digits = &upper[letters..];
    if (1..=3).contains(&letters) && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return true;
    }

    let rest = upper.strip_prefix('R').unwrap_or(&upper);
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());
    let rest = match rest.strip_prefix('C') {
        Some(tail) => tail.trim_start_matches(|c: char| c.is_ascii_digit()),
        None => rest,
    };
    rest.is_empty() && upper != rest
}

/// Zero-based column index to spreadsheet letters: 0 → A, 25 → Z, 26 → AA, 702 → AAA.
pub fn column_letters(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

pub fn export_workbook(table: &CanonicalTable, options: &ExportOptions) -> Result<Vec<u8>> {
    write_frame(table.frame(), options)
}

enum Cells {
    Date(Vec<Option<f64>>),
    Number(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl Cells {
    fn from_column(column: &Column) -> Result<Self> {
        let cells = match column.dtype() {
            DataType::Datetime(_, _) => {
                let micros = column
                    .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?
                    .cast(&DataType::Int64)?;
                let values = micros
                    .i64()?
                    .into_iter()
                    .map(|value| value.map(|us| us as f64 / MICROS_PER_DAY + UNIX_EPOCH_SERIAL))
                    .collect();
                Cells::Date(values)
            }
            DataType::Date => {
                let days = column.cast(&DataType::Int32)?;
                let values = days
                    .i32()?
                    .into_iter()
                    .map(|value| value.map(|d| f64::from(d) + UNIX_EPOCH_SERIAL))
                    .collect();
                Cells::Date(values)
            }
            DataType::Float64
            | DataType::Float32
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt32
            | DataType::UInt64 => {
                let floats = column.cast(&DataType::Float64)?;
                Cells::Number(floats.f64()?.into_iter().collect())
            }
            _ => {
                let text = column.cast(&DataType::String)?;
                let values = text
                    .str()?
                    .into_iter()
                    .map(|value| value.map(str::to_string))
                    .collect();
                Cells::Text(values)
            }
        };
        Ok(cells)
    }
}

/// Serializes any frame; the canonical table is the usual caller.
pub(crate) fn write_frame(df: &DataFrame, options: &ExportOptions) -> Result<Vec<u8>> {
    options.validate()?;

    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    if names.is_empty() {
        return Err(PipelineError::ExportEncoding(
            "cannot export a table without columns".to_string(),
        ));
    }
    if names.len() > MAX_COLUMNS {
        return Err(PipelineError::ExportEncoding(format!(
            "{} columns exceed the worksheet limit of {MAX_COLUMNS}",
            names.len()
        )));
    }
    if df.height() > MAX_DATA_ROWS {
        return Err(PipelineError::ExportEncoding(format!(
            "{} rows exceed the worksheet limit of {MAX_DATA_ROWS}",
            df.height()
        )));
    }

    let columns = df
        .get_columns()
        .iter()
        .map(Cells::from_column)
        .collect::<Result<Vec<_>>>()?;

    let last_column = column_letters(names.len() - 1);
    let last_row = df.height() + 1;
    let range = format!("A1:{last_column}{last_row}");

    let sheet = sheet_xml(&names, &columns, df.height(), &range)?;
    let table = table_xml(&names, &range, options);

    let parts: [(&str, String); 8] = [
        ("[Content_Types].xml", content_types_xml()),
        ("_rels/.rels", root_rels_xml()),
        ("xl/workbook.xml", workbook_xml(&options.sheet_name)),
        ("xl/_rels/workbook.xml.rels", workbook_rels_xml()),
        ("xl/styles.xml", styles_xml()),
        ("xl/worksheets/sheet1.xml", sheet),
        ("xl/worksheets/_rels/sheet1.xml.rels", sheet_rels_xml()),
        ("xl/tables/table1.xml", table),
    ];

    let bytes = zip_parts(&parts)?;
    debug!(
        columns = names.len(),
        rows = df.height(),
        range = %range,
        bytes = bytes.len(),
        "encoded workbook"
    );
    Ok(bytes)
}

fn zip_parts(parts: &[(&str, String)]) -> Result<Vec<u8>> {
    let encoding = |err: zip::result::ZipError| PipelineError::ExportEncoding(err.to_string());

    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());

        for (name, contents) in parts {
            zip.start_file(*name, options).map_err(encoding)?;
            zip.write_all(contents.as_bytes())
                .map_err(|err| PipelineError::ExportEncoding(err.to_string()))?;
        }
        zip.finish().map_err(encoding)?;
    }
    Ok(buffer)
}

/// Escapes markup characters and drops control characters XML 1.0 cannot carry.
fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\t' | '\n' | '\r' => escaped.push(c),
            c if c.is_control() => {}
            c => escaped.push(c),
        }
    }
    escaped
}

fn xml_error(err: std::fmt::Error) -> PipelineError {
    PipelineError::ExportEncoding(err.to_string())
}

fn sheet_xml(names: &[String], columns: &[Cells], height: usize, range: &str) -> Result<String> {
    let mut xml = String::with_capacity(4096 + height * names.len() * 24);
    let letters: Vec<String> = (0..names.len()).map(column_letters).collect();

    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#);
    write!(xml, r#"<dimension ref="{range}"/>"#).map_err(xml_error)?;
    xml.push_str("<sheetData>");

    xml.push_str(r#"<row r="1">"#);
    for (letter, name) in letters.iter().zip(names) {
        write!(
            xml,
            r#"<c r="{letter}1" t="inlineStr"><is><t>{}</t></is></c>"#,
            escape_xml(name)
        )
        .map_err(xml_error)?;
    }
    xml.push_str("</row>");

    for row in 0..height {
        let row_num = row + 2;
        write!(xml, r#"<row r="{row_num}">"#).map_err(xml_error)?;
        for ((letter, name), cells) in letters.iter().zip(names).zip(columns) {
            match cells {
                Cells::Date(values) | Cells::Number(values) => {
                    let Some(value) = values[row] else { continue };
                    if !value.is_finite() {
                        return Err(PipelineError::ExportEncoding(format!(
                            "column '{name}' row {row_num} holds non-finite value {value}"
                        )));
                    }
                    let style = if matches!(cells, Cells::Date(_)) {
                        r#" s="1""#
                    } else {
                        ""
                    };
                    write!(xml, r#"<c r="{letter}{row_num}"{style}><v>{value}</v></c>"#)
                        .map_err(xml_error)?;
                }
                Cells::Text(values) => {
                    let Some(value) = values[row].as_deref() else { continue };
                    write!(
                        xml,
                        r#"<c r="{letter}{row_num}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                        escape_xml(value)
                    )
                    .map_err(xml_error)?;
                }
            }
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData>");
    xml.push_str(r#"<tableParts count="1"><tablePart r:id="rId1"/></tableParts>"#);
    xml.push_str("</worksheet>");
    Ok(xml)
}

fn table_xml(names: &[String], range: &str, options: &ExportOptions) -> String {
    let name = escape_xml(&options.table_name);
    let mut xml = String::with_capacity(512 + names.len() * 48);

    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(&format!(
        r#"<table xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" id="1" name="{name}" displayName="{name}" ref="{range}" totalsRowShown="0">"#
    ));
    xml.push_str(&format!(r#"<autoFilter ref="{range}"/>"#));
    xml.push_str(&format!(r#"<tableColumns count="{}">"#, names.len()));
    for (idx, column) in names.iter().enumerate() {
        xml.push_str(&format!(
            r#"<tableColumn id="{}" name="{}"/>"#,
            idx + 1,
            escape_xml(column)
        ));
    }
    xml.push_str("</tableColumns>");
    xml.push_str(&format!(
        r#"<tableStyleInfo name="{}" showFirstColumn="0" showLastColumn="0" showRowStripes="1" showColumnStripes="1"/>"#,
        escape_xml(&options.table_style)
    ));
    xml.push_str("</table>");
    xml
}

fn content_types_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
<Override PartName="/xl/tables/table1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.table+xml"/>
</Types>"#
        .to_string()
}

fn root_rels_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#
        .to_string()
}

fn workbook_xml(sheet_name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets>
<sheet name="{}" sheetId="1" r:id="rId1"/>
</sheets>
</workbook>"#,
        escape_xml(sheet_name)
    )
}

fn workbook_rels_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#
        .to_string()
}

fn sheet_rels_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/table" Target="../tables/table1.xml"/>
</Relationships>"#
        .to_string()
}

/// Style 0 is the default; style 1 renders date serials as `yyyy-mm-dd hh:mm:ss`.
fn styles_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy-mm-dd hh:mm:ss"/></numFmts>
<fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>
<borders count="1"><border/></borders>
<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
<cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="164" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs>
<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
</styleSheet>"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    use polars::prelude::{NamedFrom, Series};

    use crate::table::timestamp_column;

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = ::zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut contents = String::new();
        file.read_to_string(&mut contents).unwrap();
        contents
    }

    fn sample() -> CanonicalTable {
        let df = DataFrame::new(vec![
            timestamp_column(vec![1_675_259_100_000_000, 1_675_262_700_000_000]).unwrap(),
            Series::new("pressao_mca".into(), vec![Some(23.46), None]).into(),
            Series::new("Status".into(), vec![Some("ok & <fine>"), Some("late")]).into(),
        ])
        .unwrap();
        CanonicalTable::new(df, vec!["pressao_mca".to_string()]).unwrap()
    }

    #[test]
    fn column_letters_use_bijective_base_26() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(27), "AB");
        assert_eq!(column_letters(51), "AZ");
        assert_eq!(column_letters(52), "BA");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
        assert_eq!(column_letters(16_383), "XFD");
    }

    #[test]
    fn workbook_holds_one_styled_table() {
        let bytes = export_workbook(&sample(), &ExportOptions::default()).unwrap();
        assert_eq!(&bytes[0..4], &[0x50, 0x4B, 0x03, 0x04]);

        let table = read_part(&bytes, "xl/tables/table1.xml");
        assert!(table.contains(r#"displayName="Tabela1""#));
        assert!(table.contains(r#"ref="A1:C3""#));
        assert!(table.contains(r#"<autoFilter ref="A1:C3"/>"#));
        assert!(table.contains(r#"<tableColumns count="3">"#));
        assert!(table.contains(
            r#"<tableStyleInfo name="TableStyleMedium9" showFirstColumn="0" showLastColumn="0" showRowStripes="1" showColumnStripes="1"/>"#
        ));

        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains("ok &amp; &lt;fine&gt;"));
        assert!(sheet.contains(r#"<c r="B2"><v>23.46</v></c>"#));
        assert!(!sheet.contains(r#"r="B3""#));
        assert!(sheet.contains(r#"<c r="A2" s="1">"#));
    }

    #[test]
    fn timestamps_become_date_serials() {
        let bytes = export_workbook(&sample(), &ExportOptions::default()).unwrap();
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        // 2023-02-01 13:45:00
        let serial = 44_958.0 + (13.0 * 3600.0 + 45.0 * 60.0) / 86_400.0;
        let start = sheet.find(r#"<c r="A2" s="1"><v>"#).unwrap() + r#"<c r="A2" s="1"><v>"#.len();
        let end = start + sheet[start..].find('<').unwrap();
        let written: f64 = sheet[start..end].parse().unwrap();
        assert!((written - serial).abs() < 1e-9);
    }

    #[test]
    fn output_is_deterministic() {
        let first = export_workbook(&sample(), &ExportOptions::default()).unwrap();
        let second = export_workbook(&sample(), &ExportOptions::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_table_still_has_a_header_row() {
        let table = sample().empty_like();
        let bytes = export_workbook(&table, &ExportOptions::default()).unwrap();
        let table_xml = read_part(&bytes, "xl/tables/table1.xml");
        assert!(table_xml.contains(r#"ref="A1:C1""#));
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains(r#"<row r="1">"#));
        assert!(!sheet.contains(r#"<row r="2">"#));
    }

    #[test]
    fn frame_without_columns_is_rejected() {
        let err = write_frame(&DataFrame::empty(), &ExportOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::ExportEncoding(_)));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let df = DataFrame::new(vec![
            Series::new("level".into(), vec![1.0, f64::INFINITY]).into(),
        ])
        .unwrap();
        let err = write_frame(&df, &ExportOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::ExportEncoding(_)));
    }

    #[test]
    fn invalid_names_are_config_errors() {
        let options = ExportOptions {
            table_name: "1 table".to_string(),
            ..ExportOptions::default()
        };
        assert!(matches!(options.validate(), Err(PipelineError::Config(_))));

        let options = ExportOptions {
            sheet_name: "a/b".to_string(),
            ..ExportOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn table_names_that_read_as_cell_addresses_are_rejected() {
        for name in ["TBL1", "A1", "xfd1048576", "R1C1", "rc", "R", "C12"] {
            let options = ExportOptions {
                table_name: name.to_string(),
                ..ExportOptions::default()
            };
            assert!(
                matches!(options.validate(), Err(PipelineError::Config(_))),
                "{name} should be rejected"
            );
        }

        for name in ["Tabela1", "TBLX1", "Medicoes", "_R1C1", "Row_1"] {
            let options = ExportOptions {
                table_name: name.to_string(),
                ..ExportOptions::default()
            };
            assert!(options.validate().is_ok(), "{name} should be accepted");
        }
    }

    #[test]
    fn control_characters_are_stripped() {
        assert_eq!(escape_xml("a\u{1}b\tc"), "ab\tc");
        assert_eq!(escape_xml("\"x\""), "&quot;x&quot;");
    }
}
