//! Analyzer configuration, loaded from TOML or built in code.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Number of skipped-line samples kept in a parse report by default.
pub const DEFAULT_WARNING_SAMPLE_SIZE: usize = 5;

/// Log timestamps are whole seconds, so slot replay tolerates this much overlap.
pub const DEFAULT_SLOT_TOLERANCE_MS: i64 = 1000;

/// Settings for a single analysis run.
///
/// Every path the analyzer touches comes from here; nothing is read from a
/// module-level default.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct AnalyzerConfig {
    /// dbt log file to parse.
    pub log_path: Option<PathBuf>,
    /// dbt `manifest.json` supplying model dependencies.
    pub manifest_path: Option<PathBuf>,
    /// Plain JSON `{ "model": ["upstream", ...] }` map, used when no manifest is given.
    pub edges_path: Option<PathBuf>,
    /// Model whose critical path is reported.
    pub terminal_model: Option<String>,
    /// How many skipped lines are quoted in the parse summary.
    pub warning_sample_size: usize,
    /// Overlap allowed between consecutive runs on one inferred thread.
    pub slot_tolerance_ms: i64,
    /// Report only runs starting at or after this many seconds into the run.
    pub starting_point: f64,
    /// Runs lasting at least this many seconds are flagged slow in the report.
    pub highlight_threshold: Option<f64>,
    /// Runs lasting at least this many seconds are labelled in the report.
    pub label_threshold: Option<f64>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            manifest_path: None,
            edges_path: None,
            terminal_model: None,
            warning_sample_size: DEFAULT_WARNING_SAMPLE_SIZE,
            slot_tolerance_ms: DEFAULT_SLOT_TOLERANCE_MS,
            starting_point: 0.0,
            highlight_threshold: None,
            label_threshold: None,
        }
    }
}

impl AnalyzerConfig {
    /// Config for parsing a single log file with default options.
    pub fn for_log(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: Some(log_path.into()),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// Missing keys fall back to their defaults.
    pub fn load(config_path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}
