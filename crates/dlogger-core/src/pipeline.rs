use chrono::NaiveDate;
use dlogger_parser::{load_raw_table, SourceFile};
use serde::Serialize;
use tracing::info;

use crate::chart::ChartProjection;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::export::{export_workbook, XLSX_FILE_NAME, XLSX_MIME_TYPE};
use crate::normalizer::{normalize, DroppedRow};
use crate::profiles::ProfileRegistry;
use crate::range_filter::filter_by_date;
use crate::stats::{summarize, SummaryStats};
use crate::table::CanonicalTable;

/// One upload plus the user's selections.
#[derive(Debug, Clone, Copy)]
pub struct PipelineRequest<'a> {
    pub contents: &'a [u8],
    pub filename: &'a str,
    pub vendor: &'a str,
    pub lower: Option<NaiveDate>,
    pub upper: Option<NaiveDate>,
    /// Defaults to the profile's first primary metric.
    pub stats_field: Option<&'a str>,
}

impl<'a> PipelineRequest<'a> {
    pub fn new(contents: &'a [u8], filename: &'a str, vendor: &'a str) -> Self {
        Self {
            contents,
            filename,
            vendor,
            lower: None,
            upper: None,
            stats_field: None,
        }
    }

    pub fn with_window(mut self, lower: Option<NaiveDate>, upper: Option<NaiveDate>) -> Self {
        self.lower = lower;
        self.upper = upper;
        self
    }

    pub fn with_stats_field(mut self, field: Option<&'a str>) -> Self {
        self.stats_field = field;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Workbook {
    pub bytes: Vec<u8>,
    pub file_name: &'static str,
    pub mime_type: &'static str,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub source: SourceFile,
    pub vendor: String,
    pub table: CanonicalTable,
    pub dropped_rows: Vec<DroppedRow>,
    pub dropped: usize,
    pub stats_field: String,
    pub statistics: SummaryStats,
    pub chart: ChartProjection,
    pub workbook: Workbook,
}

/// Serializable digest of a run, for logs and machine-readable output.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary<'a> {
    pub filename: &'a str,
    pub content_hash: &'a str,
    pub vendor: &'a str,
    pub rows: usize,
    pub dropped: usize,
    pub dropped_rows: &'a [DroppedRow],
    pub stats_field: &'a str,
    pub statistics: SummaryStats,
}

impl PipelineOutput {
    pub fn summary(&self) -> RunSummary<'_> {
        RunSummary {
            filename: &self.source.filename,
            content_hash: &self.source.content_hash,
            vendor: &self.vendor,
            rows: self.table.height(),
            dropped: self.dropped,
            dropped_rows: &self.dropped_rows,
            stats_field: &self.stats_field,
            statistics: self.statistics,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    registry: ProfileRegistry,
    config: PipelineConfig,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            registry: ProfileRegistry::builtin(),
            config: PipelineConfig::default(),
        }
    }
}

impl Pipeline {
    /// Built-in vendors plus any declared in `config`.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let registry = ProfileRegistry::builtin().with_profiles(config.profiles.iter().cloned())?;
        Ok(Self { registry, config })
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, request: &PipelineRequest<'_>) -> Result<PipelineOutput> {
        let profile = self.registry.get(request.vendor)?;
        let loader_options = self.config.loader.to_options()?;

        let raw = load_raw_table(request.contents, request.filename, &loader_options)?;
        info!(
            file = %raw.source().filename,
            format = %raw.source().format,
            hash = %raw.source().content_hash,
            vendor = %profile.id,
            rows = raw.len(),
            "loaded raw table"
        );

        let normalized = normalize(&raw, profile, &self.config.normalize)?;
        let table = filter_by_date(&normalized.table, request.lower, request.upper)?;

        let stats_field = match request.stats_field {
            Some(field) => field.to_string(),
            None => profile
                .primary_metrics()
                .first()
                .map(|metric| metric.to_string())
                .ok_or_else(|| PipelineError::InvalidProfile {
                    vendor: profile.id.clone(),
                    message: "no primary metric to summarize".to_string(),
                })?,
        };
        let statistics = summarize(&table, &stats_field)?;
        let chart = ChartProjection::from_table(&table)?;
        let bytes = export_workbook(&table, &self.config.export)?;

        info!(
            vendor = %profile.id,
            rows = table.height(),
            dropped = normalized.dropped,
            field = %stats_field,
            min = statistics.min,
            mean = statistics.mean,
            max = statistics.max,
            workbook_bytes = bytes.len(),
            "pipeline run complete"
        );

        Ok(PipelineOutput {
            source: raw.source().clone(),
            vendor: profile.id.clone(),
            table,
            dropped_rows: normalized.dropped_rows,
            dropped: normalized.dropped,
            stats_field,
            statistics,
            chart,
            workbook: Workbook {
                bytes,
                file_name: XLSX_FILE_NAME,
                mime_type: XLSX_MIME_TYPE,
            },
        })
    }
}
