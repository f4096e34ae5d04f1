use std::io::Write;

use polars::prelude::*;

use crate::error::{PipelineError, Result};
use crate::table::{CanonicalTable, TIMESTAMP_COLUMN};

/// Timestamp plus primary metric columns, in timestamp order, ready for plotting.
#[derive(Debug, Clone)]
pub struct ChartProjection {
    frame: DataFrame,
    metrics: Vec<String>,
}

impl ChartProjection {
    pub fn from_table(table: &CanonicalTable) -> Result<Self> {
        let metrics = table.primary_metrics().to_vec();
        let mut columns = vec![TIMESTAMP_COLUMN.to_string()];
        columns.extend(metrics.iter().cloned());
        let frame = table.frame().select(columns)?;
        Ok(Self { frame, metrics })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// One CSV row per point: ISO-8601 timestamp, then each metric (blank for nulls).
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let csv_error = |err: csv::Error| PipelineError::ExportEncoding(err.to_string());
        let mut csv = csv::Writer::from_writer(writer);

        let mut header = vec![TIMESTAMP_COLUMN.to_string()];
        header.extend(self.metrics.iter().cloned());
        csv.write_record(&header).map_err(csv_error)?;

        let timestamps = self
            .frame
            .column(TIMESTAMP_COLUMN)?
            .cast(&DataType::Int64)?;
        let timestamps = timestamps.i64()?;
        let metrics = self
            .metrics
            .iter()
            .map(|metric| self.frame.column(metric)?.f64().cloned())
            .collect::<PolarsResult<Vec<_>>>()?;

        for row in 0..self.frame.height() {
            let mut record = Vec::with_capacity(metrics.len() + 1);
            let timestamp = timestamps
                .get(row)
                .and_then(chrono::DateTime::from_timestamp_micros)
                .ok_or_else(|| {
                    PipelineError::InvalidTable(format!("row {row} has no valid timestamp"))
                })?;
            record.push(timestamp.naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string());
            for values in &metrics {
                record.push(values.get(row).map(|v| v.to_string()).unwrap_or_default());
            }
            csv.write_record(&record).map_err(csv_error)?;
        }

        csv.flush()?;
        Ok(())
    }
}
