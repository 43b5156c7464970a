//! Analysis configuration
//!
//! Stored as a JSON object on disk; every field is optional:
//! ```json
//! {
//!   "folder": "data",
//!   "region": "downtown",
//!   "merged_weights": { "day": 50, "night": 10 },
//!   "weekday_weights": { "day": 70, "night": 30 },
//!   "plot_style": { "font_family": "serif", "dpi": 200 }
//! }
//! ```

use crate::charts::renderer::PlotStyle;
use crate::data::loader::DataLoader;
use crate::data::processor::{DisplayWeights, MonthWindow};
use crate::stats::aggregator::WeekdayOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Directory holding the aggregated trip CSV files.
    pub folder: PathBuf,
    /// Optional sub-directory of `folder`.
    pub region: Option<String>,
    pub merged_weights: DisplayWeights,
    pub weekday_weights: DisplayWeights,
    pub plot_style: PlotStyle,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("."),
            region: None,
            merged_weights: DisplayWeights::MERGED,
            weekday_weights: DisplayWeights::WEEKDAY,
            plot_style: PlotStyle::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Apply command-line overrides; `None` keeps the configured value.
    pub fn with_overrides(mut self, folder: Option<PathBuf>, region: Option<String>) -> Self {
        if let Some(folder) = folder {
            self.folder = folder;
        }
        if region.is_some() {
            self.region = region;
        }
        self
    }

    pub fn loader(&self) -> DataLoader {
        DataLoader::new(self.folder.clone()).with_region(self.region.as_deref())
    }

    pub fn weekday_options(&self, window: Option<MonthWindow>) -> WeekdayOptions {
        WeekdayOptions {
            window,
            merged_weights: self.merged_weights,
            weekday_weights: self.weekday_weights,
        }
    }
}
