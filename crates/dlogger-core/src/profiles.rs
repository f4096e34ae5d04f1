use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::table::TIMESTAMP_COLUMN;

/// How a profile rebuilds one timestamp from its date and time source columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimestampRule {
    /// `"<date> <time>"` parsed as one day-first datetime string.
    ConcatenateDateAndTimeString {
        date_column: String,
        time_column: String,
    },
    /// Calendar date plus a clock duration since midnight (`H:MM:SS`).
    DateAndDurationString {
        date_column: String,
        time_column: String,
    },
    /// Day-first date plus a numeric fraction of a 24 hour day.
    DateAndFractionOfDay {
        date_column: String,
        time_column: String,
    },
}

impl TimestampRule {
    pub fn name(&self) -> &'static str {
        match self {
            TimestampRule::ConcatenateDateAndTimeString { .. } => {
                "concatenate_date_and_time_string"
            }
            TimestampRule::DateAndDurationString { .. } => "date_and_duration_string",
            TimestampRule::DateAndFractionOfDay { .. } => "date_and_fraction_of_day",
        }
    }

    pub fn date_column(&self) -> &str {
        match self {
            TimestampRule::ConcatenateDateAndTimeString { date_column, .. }
            | TimestampRule::DateAndDurationString { date_column, .. }
            | TimestampRule::DateAndFractionOfDay { date_column, .. } => date_column,
        }
    }

    pub fn time_column(&self) -> &str {
        match self {
            TimestampRule::ConcatenateDateAndTimeString { time_column, .. }
            | TimestampRule::DateAndDurationString { time_column, .. }
            | TimestampRule::DateAndFractionOfDay { time_column, .. } => time_column,
        }
    }
}

impl fmt::Display for TimestampRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}, {})",
            self.name(),
            self.date_column(),
            self.time_column()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub primary: bool,
}

impl FieldRule {
    fn new(source: &str, target: &str, primary: bool) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            primary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorProfile {
    pub id: String,
    pub display_name: String,
    pub required_columns: Vec<String>,
    pub timestamp_rule: TimestampRule,
    pub field_rules: Vec<FieldRule>,
    #[serde(default)]
    pub columns_to_drop: Vec<String>,
}

impl VendorProfile {
    pub fn primary_metrics(&self) -> Vec<&str> {
        self.field_rules
            .iter()
            .filter(|rule| rule.primary)
            .map(|rule| rule.target.as_str())
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| PipelineError::InvalidProfile {
            vendor: self.id.clone(),
            message,
        };

        if self.id.trim().is_empty() {
            return Err(invalid("profile id must not be empty".to_string()));
        }

        let required: HashSet<&str> = self.required_columns.iter().map(String::as_str).collect();
        for column in [
            self.timestamp_rule.date_column(),
            self.timestamp_rule.time_column(),
        ] {
            if !required.contains(column) {
                return Err(invalid(format!(
                    "timestamp column '{column}' is not listed as required"
                )));
            }
        }

        let mut targets = HashSet::new();
        for rule in &self.field_rules {
            if !required.contains(rule.source.as_str()) {
                return Err(invalid(format!(
                    "field source '{}' is not listed as required",
                    rule.source
                )));
            }
            if rule.target == TIMESTAMP_COLUMN || !targets.insert(rule.target.as_str()) {
                return Err(invalid(format!(
                    "field target '{}' is reserved or repeated",
                    rule.target
                )));
            }
        }

        if self.primary_metrics().is_empty() {
            return Err(invalid("at least one field rule must be primary".to_string()));
        }

        Ok(())
    }
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_string()).collect()
}

fn lamon() -> VendorProfile {
    VendorProfile {
        id: "lamon".to_string(),
        display_name: "Lamon".to_string(),
        required_columns: columns(&["Data", "Hora", "Pressão(mca)"]),
        timestamp_rule: TimestampRule::ConcatenateDateAndTimeString {
            date_column: "Data".to_string(),
            time_column: "Hora".to_string(),
        },
        field_rules: vec![FieldRule::new("Pressão(mca)", "pressao_mca", true)],
        columns_to_drop: columns(&["Data", "Hora", "Pressão(mca)"]),
    }
}

fn sanesoluti() -> VendorProfile {
    VendorProfile {
        id: "sanesoluti".to_string(),
        display_name: "Sanesoluti".to_string(),
        required_columns: columns(&["Data", "Hora", "Pressão", "Volume Total"]),
        timestamp_rule: TimestampRule::DateAndDurationString {
            date_column: "Data".to_string(),
            time_column: "Hora".to_string(),
        },
        field_rules: vec![
            FieldRule::new("Pressão", "pressao_mca", true),
            FieldRule::new("Volume Total", "volume_total_m3", false),
        ],
        columns_to_drop: columns(&["Data", "Hora", "Pressão", "Volume Total"]),
    }
}

fn vectora() -> VendorProfile {
    VendorProfile {
        id: "vectora".to_string(),
        display_name: "Vectora".to_string(),
        required_columns: columns(&["Data", "Hora", "Pressão"]),
        timestamp_rule: TimestampRule::DateAndFractionOfDay {
            date_column: "Data".to_string(),
            time_column: "Hora".to_string(),
        },
        field_rules: vec![FieldRule::new("Pressão", "pressao_mca", true)],
        columns_to_drop: columns(&["Data", "Hora", "Pressão"]),
    }
}

static BUILTIN_PROFILES: Lazy<Vec<VendorProfile>> =
    Lazy::new(|| vec![lamon(), sanesoluti(), vectora()]);

pub fn builtin_profiles() -> &'static [VendorProfile] {
    BUILTIN_PROFILES.as_slice()
}

/// Vendor catalog; new vendors are registered, existing ones are never edited.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: Vec<VendorProfile>,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProfileRegistry {
    pub fn builtin() -> Self {
        Self {
            profiles: builtin_profiles().to_vec(),
        }
    }

    pub fn with_profiles(mut self, profiles: impl IntoIterator<Item = VendorProfile>) -> Result<Self> {
        for profile in profiles {
            self.register(profile)?;
        }
        Ok(self)
    }

    pub fn register(&mut self, profile: VendorProfile) -> Result<()> {
        profile.validate()?;
        if self.find(&profile.id).is_some() {
            return Err(PipelineError::DuplicateProfile(profile.id));
        }
        self.profiles.push(profile);
        Ok(())
    }

    /// Looks a vendor up by id or display name, ignoring ASCII case.
    pub fn get(&self, vendor: &str) -> Result<&VendorProfile> {
        self.find(vendor)
            .ok_or_else(|| PipelineError::UnknownVendor(vendor.to_string()))
    }

    pub fn profiles(&self) -> &[VendorProfile] {
        &self.profiles
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.profiles.iter().map(|profile| profile.id.as_str())
    }

    fn find(&self, vendor: &str) -> Option<&VendorProfile> {
        let wanted = vendor.trim();
        self.profiles.iter().find(|profile| {
            profile.id.eq_ignore_ascii_case(wanted)
                || profile.display_name.eq_ignore_ascii_case(wanted)
        })
    }
}
