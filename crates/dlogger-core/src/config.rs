use std::fs;
use std::path::Path;

use dlogger_parser::LoaderOptions;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::export::ExportOptions;
use crate::normalizer::NormalizeOptions;
use crate::profiles::VendorProfile;

/// What to do with a row whose numeric field cannot be cast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CastFailurePolicy {
    #[default]
    DropRow,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub delimiter: char,
    pub preamble_lines: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        let defaults = LoaderOptions::default();
        Self {
            delimiter: char::from(defaults.delimiter),
            preamble_lines: defaults.preamble_lines,
        }
    }
}

impl LoaderConfig {
    pub fn to_options(&self) -> Result<LoaderOptions> {
        if !self.delimiter.is_ascii() {
            return Err(PipelineError::Config(format!(
                "delimiter '{}' must be a single ASCII character",
                self.delimiter
            )));
        }
        Ok(LoaderOptions {
            delimiter: self.delimiter as u8,
            preamble_lines: self.preamble_lines,
        })
    }
}

/// Everything a run can be tuned with; every section is optional in TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub loader: LoaderConfig,
    pub normalize: NormalizeOptions,
    pub export: ExportOptions,
    pub profiles: Vec<VendorProfile>,
}

impl PipelineConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(contents)?;
        config.loader.to_options()?;
        config.export.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        debug!(
            path = %path.display(),
            profiles = config.profiles.len(),
            "loaded pipeline config"
        );
        Ok(config)
    }
}
