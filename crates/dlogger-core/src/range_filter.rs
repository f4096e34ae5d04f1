use chrono::{DateTime, NaiveDate};
use polars::prelude::*;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::table::CanonicalTable;

/// Keeps rows whose calendar date lies in `[lower, upper]`, both ends inclusive.
///
/// Without both bounds the table comes back unchanged. An inverted window
/// yields an empty table with the same columns.
pub fn filter_by_date(
    table: &CanonicalTable,
    lower: Option<NaiveDate>,
    upper: Option<NaiveDate>,
) -> Result<CanonicalTable> {
    let (Some(lower), Some(upper)) = (lower, upper) else {
        return Ok(table.clone());
    };
    if lower > upper {
        debug!(%lower, %upper, "inverted date window, nothing selected");
        return Ok(table.empty_like());
    }

    let keep = table
        .timestamp_micros()?
        .into_iter()
        .map(|micros| {
            DateTime::from_timestamp_micros(micros)
                .map(|dt| {
                    let date = dt.date_naive();
                    lower <= date && date <= upper
                })
                .ok_or_else(|| {
                    PipelineError::InvalidTable(format!("timestamp {micros} is out of range"))
                })
        })
        .collect::<Result<Vec<bool>>>()?;

    let mask = BooleanChunked::from_slice("date_window".into(), &keep);
    let filtered = table.frame().filter(&mask)?;
    debug!(
        %lower,
        %upper,
        rows_in = table.height(),
        rows_out = filtered.height(),
        "applied date window"
    );
    Ok(table.with_frame(filtered))
}
