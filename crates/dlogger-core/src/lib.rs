pub mod chart;
pub mod config;
pub mod error;
pub mod export;
pub mod normalizer;
mod numeric;
pub mod pipeline;
pub mod profiles;
pub mod range_filter;
pub mod stats;
pub mod table;
pub mod timestamp;

pub use chart::ChartProjection;
pub use config::{CastFailurePolicy, LoaderConfig, PipelineConfig};
pub use error::{PipelineError, Result};
pub use export::{column_letters, export_workbook, ExportOptions, XLSX_FILE_NAME, XLSX_MIME_TYPE};
pub use normalizer::{normalize, DropReason, DroppedRow, NormalizeOptions, Normalized};
pub use pipeline::{Pipeline, PipelineOutput, PipelineRequest, Workbook};
pub use profiles::{builtin_profiles, FieldRule, ProfileRegistry, TimestampRule, VendorProfile};
pub use range_filter::filter_by_date;
pub use stats::{summarize, SummaryStats};
pub use table::{CanonicalTable, TIMESTAMP_COLUMN};
