//! Support placement configuration.
//!
//! The configuration source is a list of `Key: value` lines:
//!
//! ```text
//! SelectedFamily: Clevis Hanger
//! Discipline: Plumbing
//! Offest: 150
//! Spacing: 500
//! SupportType: Rod
//! File Location: /srv/specs/fems.txt
//! ```
//!
//! Offsets and spacings are in millimetres. Lines that carry no known key are
//! ignored. Optional keys `Units`, `QueryTimeout` (ms) and
//! `RequireOrientation` tune the coordinator.

use crate::rod::QueryBudget;
use crate::spec_table::{SpecLoadError, SpecTable};
use crate::units::LengthUnit;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read configuration {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing configuration key '{0}'")]
    MissingKey(&'static str),

    #[error("Invalid value for '{key}': '{value}'")]
    InvalidValue { key: &'static str, value: String },

    #[error(transparent)]
    Spec(#[from] SpecLoadError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportConfig {
    pub selected_family: Option<String>,
    pub discipline: Option<String>,
    /// Distance from each pipe end to the boundary supports (mm).
    pub offset: f64,
    /// Minimum distance allowed between two boundary supports (mm).
    pub min_spacing: f64,
    pub support_type: Option<String>,
    pub spec_file: Option<PathBuf>,
    pub units: LengthUnit,
    pub query_timeout: Option<Duration>,
    pub require_orientation: bool,
}

impl SupportConfig {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut selected_family = None;
        let mut discipline = None;
        let mut offset = None;
        let mut min_spacing = None;
        let mut support_type = None;
        let mut spec_file = None;
        let mut units = LengthUnit::default();
        let mut query_timeout = None;
        let mut require_orientation = false;

        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "SelectedFamily" => selected_family = Some(value.to_string()),
                "Discipline" => discipline = Some(value.to_string()),
                // Shipped configuration files spell it "Offest"
                "Offset" | "Offest" => offset = Some(parse_length("Offset", value)?),
                "Spacing" => min_spacing = Some(parse_length("Spacing", value)?),
                "SupportType" => support_type = Some(value.to_string()),
                "File Location" => spec_file = Some(PathBuf::from(value)),
                "Units" => {
                    units = value.parse().map_err(|_| ConfigError::InvalidValue {
                        key: "Units",
                        value: value.to_string(),
                    })?
                }
                "QueryTimeout" => {
                    let ms = value.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                        key: "QueryTimeout",
                        value: value.to_string(),
                    })?;
                    query_timeout = Some(Duration::from_millis(ms));
                }
                "RequireOrientation" => {
                    require_orientation = value.parse().map_err(|_| ConfigError::InvalidValue {
                        key: "RequireOrientation",
                        value: value.to_string(),
                    })?
                }
                _ => {}
            }
        }

        Ok(Self {
            selected_family,
            discipline,
            offset: offset.ok_or(ConfigError::MissingKey("Offset"))?,
            min_spacing: min_spacing.ok_or(ConfigError::MissingKey("Spacing"))?,
            support_type,
            spec_file,
            units,
            query_timeout,
            require_orientation,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn query_budget(&self) -> QueryBudget {
        match self.query_timeout {
            Some(timeout) => QueryBudget::with_timeout(timeout),
            None => QueryBudget::unlimited(),
        }
    }

    /// Load the spacing table named by `File Location`.
    pub fn load_spec_table(&self) -> Result<SpecTable, ConfigError> {
        let path = self
            .spec_file
            .as_ref()
            .ok_or(ConfigError::MissingKey("File Location"))?;
        Ok(SpecTable::from_path(path)?)
    }
}

fn parse_length(key: &'static str, value: &str) -> Result<f64, ConfigError> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}
