use std::fs;
use std::path::PathBuf;

use crate::errors::ParserError;
use crate::format::detect_format;
use crate::formats::DelimitedTextLoader;
use crate::model::{FileFormat, RawCell, RawTable, SourceFile};
use crate::registry::{load_raw_table, load_with_loader, LoaderOptions};

fn fixture(path: &str) -> Vec<u8> {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let full_path = base.join("tests/data").join(path);
    fs::read(&full_path)
        .unwrap_or_else(|err| panic!("failed to read fixture {}: {}", full_path.display(), err))
}

#[test]
fn detects_formats_by_extension() {
    assert_eq!(detect_format("log.csv").unwrap(), FileFormat::DelimitedText);
    assert_eq!(detect_format("LOG.CSV").unwrap(), FileFormat::DelimitedText);
    assert_eq!(detect_format("log.xls").unwrap(), FileFormat::Spreadsheet);
    assert_eq!(detect_format("dir/log.xlsx").unwrap(), FileFormat::Spreadsheet);

    for name in ["log.txt", "log", "log.csv.bak", "xlsx"] {
        let err = detect_format(name).expect_err("extension should be rejected");
        assert!(
            matches!(err, ParserError::UnsupportedFormat { ref filename } if filename == name),
            "unexpected error for {name}: {err}"
        );
        assert!(!err.is_parse_error());
    }
}

#[test]
fn loads_lamon_export_after_preamble() {
    let contents = fixture("lamon_export.csv");
    let table = load_raw_table(&contents, "lamon_export.csv", &LoaderOptions::default())
        .expect("lamon export should load");

    assert_eq!(
        table.columns(),
        ["Data", "Hora", "Pressão(mca)", "Bateria(V)"]
    );
    assert_eq!(table.len(), 5);
    assert_eq!(table.source().format, FileFormat::DelimitedText);
    assert_eq!(table.source().filename, "lamon_export.csv");
    assert_eq!(table.source().content_hash.len(), 64);

    let first = table.row(0).expect("first row");
    assert_eq!(first.get("Data"), Some(&RawCell::Text("01/02/2023".to_string())));
    assert_eq!(first.get("Hora"), Some(&RawCell::Text("13:45:00".to_string())));
    assert_eq!(
        first.get("Pressão(mca)"),
        Some(&RawCell::Text("23,456".to_string()))
    );
    assert!(first.get("Volume").is_none());
}

#[test]
fn delimited_cells_stay_text() {
    let contents = fixture("sanesoluti_export.csv");
    let table = load_raw_table(&contents, "sanesoluti_export.csv", &LoaderOptions::default())
        .expect("sanesoluti export should load");

    assert_eq!(table.len(), 4);
    assert!(table
        .rows()
        .flat_map(|row| row.cells().iter())
        .all(|cell| matches!(cell, RawCell::Text(_) | RawCell::Empty)));
}

#[test]
fn ragged_row_reports_file_line() {
    let contents = fixture("ragged_export.csv");
    let err = load_raw_table(&contents, "ragged_export.csv", &LoaderOptions::default())
        .expect_err("ragged row must fail");

    match err {
        ParserError::RaggedRow {
            line,
            expected,
            found,
            ..
        } => {
            assert_eq!(line, 8);
            assert_eq!(expected, 3);
            assert_eq!(found, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn truncated_preamble_is_a_header_error() {
    let contents = fixture("preamble_only.csv");
    let err = load_raw_table(&contents, "preamble_only.csv", &LoaderOptions::default())
        .expect_err("file without header must fail");
    assert!(matches!(err, ParserError::InvalidHeader { row_index: 6, .. }));
    assert!(err.is_parse_error());
}

#[test]
fn custom_delimiter_and_preamble() {
    let options = LoaderOptions {
        delimiter: b',',
        preamble_lines: 0,
    };
    let loader = DelimitedTextLoader::new(options);
    let table = load_with_loader(
        b"Data,Hora\n01/02/2023,10:00:00\n\n02/02/2023,11:00:00\n",
        "custom.csv",
        FileFormat::DelimitedText,
        &loader,
    )
    .expect("custom layout should load");

    assert_eq!(table.columns(), ["Data", "Hora"]);
    assert_eq!(table.len(), 2);
}

#[test]
fn rows_with_only_blank_fields_are_skipped() {
    let options = LoaderOptions {
        delimiter: b';',
        preamble_lines: 0,
    };
    let table = load_with_loader(
        b"Data;Hora\n01/02/2023;10:00:00\n;\n",
        "blank.csv",
        FileFormat::DelimitedText,
        &DelimitedTextLoader::new(options),
    )
    .unwrap();
    assert_eq!(table.len(), 1);
}

#[test]
fn unsupported_extension_never_reads_contents() {
    let err = load_raw_table(b"anything", "notes.txt", &LoaderOptions::default())
        .expect_err("txt is not supported");
    assert!(matches!(err, ParserError::UnsupportedFormat { .. }));
}

#[test]
fn corrupt_spreadsheet_bytes_fail_to_load() {
    let err = load_raw_table(b"not a workbook", "broken.xlsx", &LoaderOptions::default())
        .expect_err("garbage bytes must fail");
    assert!(matches!(err, ParserError::Spreadsheet { .. }));
}

#[test]
fn raw_table_rejects_mismatched_widths() {
    let source = SourceFile::new("inline.csv", FileFormat::DelimitedText, b"");
    let err = RawTable::new(
        source,
        vec!["Data".to_string(), "Hora".to_string()],
        vec![vec![RawCell::from_text("01/02/2023")]],
    )
    .expect_err("row shorter than header");
    assert!(matches!(err, ParserError::RaggedRow { line: 2, .. }));
}
