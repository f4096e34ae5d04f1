use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;

use crate::error::{PipelineError, Result};

pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Normalized, time-sorted measurements: one `timestamp` column plus the profile's fields.
#[derive(Debug, Clone)]
pub struct CanonicalTable {
    df: DataFrame,
    primary_metrics: Vec<String>,
}

impl CanonicalTable {
    pub fn new(df: DataFrame, primary_metrics: Vec<String>) -> Result<Self> {
        let timestamp = df.column(TIMESTAMP_COLUMN).map_err(|_| {
            PipelineError::InvalidTable(format!("missing '{TIMESTAMP_COLUMN}' column"))
        })?;
        if !matches!(timestamp.dtype(), DataType::Datetime(_, _)) {
            return Err(PipelineError::InvalidTable(format!(
                "'{TIMESTAMP_COLUMN}' must be a datetime column, found {}",
                timestamp.dtype()
            )));
        }
        if timestamp.null_count() > 0 {
            return Err(PipelineError::InvalidTable(format!(
                "'{TIMESTAMP_COLUMN}' contains nulls"
            )));
        }

        for metric in &primary_metrics {
            let column = df.column(metric).map_err(|_| {
                PipelineError::InvalidTable(format!("primary metric '{metric}' is missing"))
            })?;
            if column.dtype() != &DataType::Float64 {
                return Err(PipelineError::InvalidTable(format!(
                    "primary metric '{metric}' must be Float64, found {}",
                    column.dtype()
                )));
            }
        }

        Ok(Self {
            df,
            primary_metrics,
        })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn into_frame(self) -> DataFrame {
        self.df
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn width(&self) -> usize {
        self.df.width()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn primary_metrics(&self) -> &[String] {
        &self.primary_metrics
    }

    /// Microseconds since the Unix epoch, one per row.
    pub fn timestamp_micros(&self) -> Result<Vec<i64>> {
        let column = self.df.column(TIMESTAMP_COLUMN)?.cast(&DataType::Int64)?;
        let values = column.i64()?;
        values
            .into_iter()
            .map(|value| {
                value.ok_or_else(|| {
                    PipelineError::InvalidTable(format!("'{TIMESTAMP_COLUMN}' contains nulls"))
                })
            })
            .collect()
    }

    pub fn timestamps(&self) -> Result<Vec<NaiveDateTime>> {
        self.timestamp_micros()?
            .into_iter()
            .map(|micros| {
                DateTime::from_timestamp_micros(micros)
                    .map(|dt| dt.naive_utc())
                    .ok_or_else(|| {
                        PipelineError::InvalidTable(format!("timestamp {micros} is out of range"))
                    })
            })
            .collect()
    }

    /// Same metadata, new rows. The frame must keep the schema.
    pub(crate) fn with_frame(&self, df: DataFrame) -> Self {
        Self {
            df,
            primary_metrics: self.primary_metrics.clone(),
        }
    }

    pub(crate) fn empty_like(&self) -> Self {
        self.with_frame(self.df.clear())
    }

    /// Stable sort on the timestamp; rows sharing an instant keep their order.
    pub(crate) fn sorted_by_timestamp(self) -> Result<Self> {
        let sorted = self.df.sort(
            [TIMESTAMP_COLUMN],
            SortMultipleOptions::default().with_maintain_order(true),
        )?;
        Ok(Self {
            df: sorted,
            primary_metrics: self.primary_metrics,
        })
    }
}

/// Builds a microsecond datetime column from epoch micros.
pub(crate) fn timestamp_column(values: Vec<i64>) -> Result<Column> {
    let series = Series::new(TIMESTAMP_COLUMN.into(), values)
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;
    Ok(series.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(micros: Vec<i64>, pressure: Vec<Option<f64>>) -> DataFrame {
        DataFrame::new(vec![
            timestamp_column(micros).unwrap(),
            Series::new("pressao_mca".into(), pressure).into(),
        ])
        .unwrap()
    }

    #[test]
    fn accepts_datetime_and_float_metric() {
        let table = CanonicalTable::new(
            frame(vec![2_000_000, 1_000_000], vec![Some(1.0), None]),
            vec!["pressao_mca".to_string()],
        )
        .unwrap();
        assert_eq!(table.height(), 2);
        assert_eq!(table.column_names(), vec!["timestamp", "pressao_mca"]);
        assert_eq!(table.timestamp_micros().unwrap(), vec![2_000_000, 1_000_000]);
    }

    #[test]
    fn rejects_missing_or_mistyped_metric() {
        let df = frame(vec![1], vec![Some(1.0)]);
        assert!(matches!(
            CanonicalTable::new(df.clone(), vec!["volume".to_string()]),
            Err(PipelineError::InvalidTable(_))
        ));

        let mut df = df;
        df.with_column(Series::new("pressao_mca".into(), vec!["1.0"]))
            .unwrap();
        assert!(CanonicalTable::new(df, vec!["pressao_mca".to_string()]).is_err());
    }

    #[test]
    fn rejects_non_datetime_timestamp() {
        let df = DataFrame::new(vec![
            Series::new(TIMESTAMP_COLUMN.into(), vec![1i64]).into(),
            Series::new("pressao_mca".into(), vec![1.0f64]).into(),
        ])
        .unwrap();
        assert!(CanonicalTable::new(df, vec!["pressao_mca".to_string()]).is_err());
    }

    #[test]
    fn sort_is_stable_for_equal_instants() {
        let table = CanonicalTable::new(
            frame(
                vec![3_000_000, 1_000_000, 1_000_000],
                vec![Some(3.0), Some(1.0), Some(2.0)],
            ),
            vec!["pressao_mca".to_string()],
        )
        .unwrap()
        .sorted_by_timestamp()
        .unwrap();

        let values: Vec<Option<f64>> = table
            .frame()
            .column("pressao_mca")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(values, vec![Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn empty_like_keeps_schema() {
        let table = CanonicalTable::new(
            frame(vec![1], vec![Some(1.0)]),
            vec!["pressao_mca".to_string()],
        )
        .unwrap();
        let empty = table.empty_like();
        assert!(empty.is_empty());
        assert_eq!(empty.column_names(), table.column_names());
    }
}
