use std::collections::HashSet;
use std::fmt;

use dlogger_parser::{RawCell, RawRow, RawTable};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::CastFailurePolicy;
use crate::error::{PipelineError, Result};
use crate::numeric::{parse_decimal, round2};
use crate::profiles::VendorProfile;
use crate::table::{timestamp_column, CanonicalTable, TIMESTAMP_COLUMN};
use crate::timestamp::resolve_timestamp;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    pub cast_failure: CastFailurePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DropReason {
    InvalidTimestamp { message: String },
    InvalidNumber { column: String, value: String },
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::InvalidTimestamp { message } => write!(f, "invalid timestamp: {message}"),
            DropReason::InvalidNumber { column, value } => {
                write!(f, "column '{column}' value '{value}' is not numeric")
            }
        }
    }
}

/// A source row left out of the canonical table. `row` is 1-based among the data rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedRow {
    pub row: usize,
    pub reason: DropReason,
}

#[derive(Debug, Clone)]
pub struct Normalized {
    pub table: CanonicalTable,
    pub dropped_rows: Vec<DroppedRow>,
    pub dropped: usize,
}

enum Cast {
    Value(Option<f64>),
    Invalid(String),
}

fn cast_cell(cell: &RawCell) -> Cast {
    match cell {
        RawCell::Empty => Cast::Value(None),
        RawCell::Number(value) if value.is_nan() => Cast::Value(None),
        RawCell::Number(value) if value.is_finite() => Cast::Value(Some(round2(*value))),
        RawCell::Number(value) => Cast::Invalid(value.to_string()),
        RawCell::Text(text) if text.eq_ignore_ascii_case("nan") => Cast::Value(None),
        RawCell::Text(text) => match parse_decimal(text) {
            Some(value) => Cast::Value(Some(round2(value))),
            None => Cast::Invalid(text.clone()),
        },
    }
}

/// Rows that survived, with their timestamp and one value per field rule.
struct KeptRow<'a> {
    row: RawRow<'a>,
    micros: i64,
    fields: Vec<Option<f64>>,
}

pub fn normalize(
    raw: &RawTable,
    profile: &VendorProfile,
    options: &NormalizeOptions,
) -> Result<Normalized> {
    let missing: Vec<String> = profile
        .required_columns
        .iter()
        .filter(|column| !raw.has_column(column))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::MissingColumns {
            vendor: profile.id.clone(),
            missing,
        });
    }

    let mut kept: Vec<KeptRow<'_>> = Vec::with_capacity(raw.len());
    let mut dropped_rows = Vec::new();

    'rows: for row in raw.rows() {
        let line = row.index() + 1;

        let timestamp = match resolve_timestamp(&profile.timestamp_rule, &row) {
            Ok(timestamp) => timestamp,
            Err(message) => {
                dropped_rows.push(DroppedRow {
                    row: line,
                    reason: DropReason::InvalidTimestamp { message },
                });
                continue;
            }
        };

        let mut fields = Vec::with_capacity(profile.field_rules.len());
        for rule in &profile.field_rules {
            match row.get(&rule.source).map_or(Cast::Value(None), cast_cell) {
                Cast::Value(value) => fields.push(value),
                Cast::Invalid(value) => match options.cast_failure {
                    CastFailurePolicy::Fail => {
                        return Err(PipelineError::FieldCast {
                            vendor: profile.id.clone(),
                            row: line,
                            column: rule.source.clone(),
                            value,
                        });
                    }
                    CastFailurePolicy::DropRow => {
                        dropped_rows.push(DroppedRow {
                            row: line,
                            reason: DropReason::InvalidNumber {
                                column: rule.source.clone(),
                                value,
                            },
                        });
                        continue 'rows;
                    }
                },
            }
        }

        kept.push(KeptRow {
            row,
            micros: timestamp.and_utc().timestamp_micros(),
            fields,
        });
    }

    let mut columns: Vec<Column> = Vec::with_capacity(raw.columns().len() + 1);
    columns.push(timestamp_column(kept.iter().map(|row| row.micros).collect())?);

    let mut names: HashSet<String> = HashSet::from([TIMESTAMP_COLUMN.to_string()]);
    for (idx, rule) in profile.field_rules.iter().enumerate() {
        names.insert(rule.target.clone());
        let values: Vec<Option<f64>> = kept.iter().map(|row| row.fields[idx]).collect();
        columns.push(Series::new(rule.target.as_str().into(), values).into());
    }

    for (idx, name) in raw.columns().iter().enumerate() {
        if profile.columns_to_drop.contains(name) {
            continue;
        }
        let name = unique_name(name, &mut names);
        columns.push(passthrough_column(&name, idx, &kept));
    }

    let df = DataFrame::new(columns)?;
    let table = CanonicalTable::new(
        df,
        profile
            .primary_metrics()
            .into_iter()
            .map(str::to_string)
            .collect(),
    )?
    .sorted_by_timestamp()?;

    let dropped = dropped_rows.len();
    info!(
        vendor = %profile.id,
        rule = %profile.timestamp_rule,
        rows_in = raw.len(),
        rows_out = table.height(),
        dropped,
        "normalized raw table"
    );
    if dropped > 0 {
        warn!(
            vendor = %profile.id,
            dropped,
            first_row = dropped_rows[0].row,
            first_reason = %dropped_rows[0].reason,
            "dropped rows during normalization"
        );
    }

    Ok(Normalized {
        table,
        dropped_rows,
        dropped,
    })
}

/// Source columns that clash with a normalized name get the loader's `.N` suffix.
fn unique_name(name: &str, taken: &mut HashSet<String>) -> String {
    let mut candidate = name.to_string();
    let mut suffix = 0;
    while taken.contains(&candidate) {
        suffix += 1;
        candidate = format!("{name}.{suffix}");
    }
    taken.insert(candidate.clone());
    candidate
}

/// Numeric when every non-empty kept cell is a number, text otherwise.
fn passthrough_column(name: &str, idx: usize, kept: &[KeptRow<'_>]) -> Column {
    let cells: Vec<&RawCell> = kept.iter().map(|row| &row.row.cells()[idx]).collect();
    let numeric = cells
        .iter()
        .all(|cell| matches!(cell, RawCell::Number(_) | RawCell::Empty));

    if numeric {
        let values: Vec<Option<f64>> = cells.iter().map(|cell| cell.as_number()).collect();
        Series::new(name.into(), values).into()
    } else {
        let values: Vec<Option<String>> = cells
            .iter()
            .map(|cell| match cell {
                RawCell::Empty => None,
                other => Some(other.to_string()),
            })
            .collect();
        Series::new(name.into(), values).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::ProfileRegistry;
    use dlogger_parser::{FileFormat, SourceFile};

    fn raw(columns: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            SourceFile::new("inline.csv", FileFormat::DelimitedText, b""),
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|cell| RawCell::from_text(cell)).collect())
                .collect(),
        )
        .unwrap()
    }

    fn profile(id: &str) -> VendorProfile {
        ProfileRegistry::builtin().get(id).unwrap().clone()
    }

    fn pressures(table: &CanonicalTable) -> Vec<Option<f64>> {
        table
            .frame()
            .column("pressao_mca")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn missing_columns_are_all_reported() {
        let table = raw(&["Data"], &[&["01/02/2023"]]);
        let err = normalize(&table, &profile("lamon"), &NormalizeOptions::default()).unwrap_err();
        match err {
            PipelineError::MissingColumns { vendor, missing } => {
                assert_eq!(vendor, "lamon");
                assert_eq!(missing, vec!["Hora", "Pressão(mca)"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn lamon_rows_become_canonical_and_sorted() {
        let table = raw(
            &["Data", "Hora", "Pressão(mca)", "Bateria(V)"],
            &[
                &["02/02/2023", "10:00:00", "20,004", "3.5"],
                &["01/02/2023", "13:45:00", "23,456", "3.6"],
            ],
        );
        let normalized =
            normalize(&table, &profile("lamon"), &NormalizeOptions::default()).unwrap();

        assert_eq!(normalized.dropped, 0);
        assert_eq!(
            normalized.table.column_names(),
            vec!["timestamp", "pressao_mca", "Bateria(V)"]
        );
        assert_eq!(pressures(&normalized.table), vec![Some(23.46), Some(20.0)]);

        let first = normalized.table.timestamps().unwrap()[0];
        assert_eq!(first.to_string(), "2023-02-01 13:45:00");

        // Text passthrough stays text.
        let battery = normalized.table.frame().column("Bateria(V)").unwrap();
        assert_eq!(battery.dtype(), &DataType::String);
    }

    #[test]
    fn bad_rows_are_dropped_and_counted() {
        let table = raw(
            &["Data", "Hora", "Pressão"],
            &[
                &["01/02/2023", "0.25", "10"],
                &["01/02/2023", "0.5", "abc"],
                &["01/02/2023", "0.75", "12"],
                &["not a date", "0.9", "13"],
            ],
        );
        let normalized =
            normalize(&table, &profile("vectora"), &NormalizeOptions::default()).unwrap();

        assert_eq!(normalized.table.height(), 2);
        assert_eq!(normalized.dropped, 2);
        assert_eq!(normalized.dropped_rows[0].row, 2);
        assert!(matches!(
            normalized.dropped_rows[0].reason,
            DropReason::InvalidNumber { ref value, .. } if value == "abc"
        ));
        assert!(matches!(
            normalized.dropped_rows[1].reason,
            DropReason::InvalidTimestamp { .. }
        ));
    }

    #[test]
    fn fail_policy_aborts_on_first_cast_error() {
        let table = raw(
            &["Data", "Hora", "Pressão"],
            &[&["01/02/2023", "0.5", "abc"]],
        );
        let options = NormalizeOptions {
            cast_failure: CastFailurePolicy::Fail,
        };
        let err = normalize(&table, &profile("vectora"), &options).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::FieldCast { row: 1, ref column, .. } if column == "Pressão"
        ));
    }

    #[test]
    fn empty_and_nan_cells_become_nulls() {
        let table = raw(
            &["Data", "Hora", "Pressão", "Volume Total"],
            &[
                &["2023-02-01", "01:00:00", "", "1,5"],
                &["2023-02-01", "02:00:00", "NaN", "2"],
            ],
        );
        let normalized =
            normalize(&table, &profile("sanesoluti"), &NormalizeOptions::default()).unwrap();
        assert_eq!(normalized.dropped, 0);
        assert_eq!(pressures(&normalized.table), vec![None, None]);
        assert_eq!(normalized.table.width(), 3);
    }

    #[test]
    fn spreadsheet_numbers_pass_through_as_floats() {
        let table = RawTable::new(
            SourceFile::new("inline.xlsx", FileFormat::Spreadsheet, b""),
            vec![
                "Data".to_string(),
                "Hora".to_string(),
                "Pressão".to_string(),
                "Bateria".to_string(),
            ],
            vec![vec![
                RawCell::Number(44958.0),
                RawCell::Number(0.5),
                RawCell::Number(18.333),
                RawCell::Number(3.61),
            ]],
        )
        .unwrap();
        let normalized =
            normalize(&table, &profile("vectora"), &NormalizeOptions::default()).unwrap();
        assert_eq!(pressures(&normalized.table), vec![Some(18.33)]);
        let battery = normalized.table.frame().column("Bateria").unwrap();
        assert_eq!(battery.dtype(), &DataType::Float64);
    }

    #[test]
    fn passthrough_columns_never_shadow_normalized_ones() {
        let table = raw(
            &["Data", "Hora", "Pressão", "timestamp", "pressao_mca", "pressao_mca.1"],
            &[&["01/02/2023", "0.5", "18,3", "meio-dia", "x", "y"]],
        );
        let normalized =
            normalize(&table, &profile("vectora"), &NormalizeOptions::default()).unwrap();

        assert_eq!(
            normalized.table.column_names(),
            vec![
                "timestamp",
                "pressao_mca",
                "timestamp.1",
                "pressao_mca.1",
                "pressao_mca.1.1",
            ]
        );
        assert_eq!(pressures(&normalized.table), vec![Some(18.3)]);
    }

    #[test]
    fn empty_input_yields_empty_table() {
        let table = raw(&["Data", "Hora", "Pressão"], &[]);
        let normalized =
            normalize(&table, &profile("vectora"), &NormalizeOptions::default()).unwrap();
        assert!(normalized.table.is_empty());
        assert_eq!(normalized.table.column_names(), vec!["timestamp", "pressao_mca"]);
    }
}
