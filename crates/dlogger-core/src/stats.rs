use std::fmt;

use polars::prelude::*;
use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::numeric::round2;
use crate::table::CanonicalTable;

/// Min, mean and max of one numeric field, each rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryStats {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    pub count: usize,
}

impl SummaryStats {
    pub fn min_display(&self) -> String {
        format!("{:.2}", self.min)
    }

    pub fn mean_display(&self) -> String {
        format!("{:.2}", self.mean)
    }

    pub fn max_display(&self) -> String {
        format!("{:.2}", self.max)
    }
}

impl fmt::Display for SummaryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "min {} | mean {} | max {} (n = {})",
            self.min_display(),
            self.mean_display(),
            self.max_display(),
            self.count
        )
    }
}

/// Summarizes the non-null, finite values of `field`.
pub fn summarize(table: &CanonicalTable, field: &str) -> Result<SummaryStats> {
    let unknown = || PipelineError::UnknownField {
        field: field.to_string(),
    };
    let column = table.frame().column(field).map_err(|_| unknown())?;
    if column.dtype() != &DataType::Float64 {
        return Err(unknown());
    }

    let mut count = 0usize;
    let mut sum = 0.0f64;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for value in column.f64()?.into_iter().flatten() {
        if !value.is_finite() {
            continue;
        }
        count += 1;
        sum += value;
        min = min.min(value);
        max = max.max(value);
    }

    if count == 0 {
        return Err(PipelineError::EmptyAggregation {
            field: field.to_string(),
        });
    }

    Ok(SummaryStats {
        min: round2(min),
        mean: round2(sum / count as f64),
        max: round2(max),
        count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::timestamp_column;

    fn table(values: Vec<Option<f64>>) -> CanonicalTable {
        let micros = (0..values.len() as i64).collect();
        let df = DataFrame::new(vec![
            timestamp_column(micros).unwrap(),
            Series::new("pressao_mca".into(), values).into(),
        ])
        .unwrap();
        CanonicalTable::new(df, vec!["pressao_mca".to_string()]).unwrap()
    }

    #[test]
    fn summarizes_simple_series() {
        let stats = summarize(&table(vec![Some(1.0), Some(2.0), Some(3.0)]), "pressao_mca");
        let stats = stats.unwrap();
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.mean, 2.0);
        assert_eq!(stats.max, 3.0);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.mean_display(), "2.00");
    }

    #[test]
    fn nulls_are_skipped_and_results_rounded() {
        let stats = summarize(
            &table(vec![Some(1.111), None, Some(2.229)]),
            "pressao_mca",
        )
        .unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.min, 1.11);
        assert_eq!(stats.mean, 1.67);
        assert_eq!(stats.max, 2.23);
    }

    #[test]
    fn all_null_field_is_an_empty_aggregation() {
        let err = summarize(&table(vec![None, None]), "pressao_mca").unwrap_err();
        assert!(matches!(err, PipelineError::EmptyAggregation { ref field } if field == "pressao_mca"));

        let err = summarize(&table(vec![]), "pressao_mca").unwrap_err();
        assert!(matches!(err, PipelineError::EmptyAggregation { .. }));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let source = table(vec![Some(1.0)]);
        let err = summarize(&source, "volume").unwrap_err();
        assert!(matches!(err, PipelineError::UnknownField { .. }));

        let err = summarize(&source, "timestamp").unwrap_err();
        assert!(matches!(err, PipelineError::UnknownField { .. }));
    }
}
