//! Error types for log parsing, graph construction and path analysis.

use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while turning a log into a [`RunTable`](crate::analyzer::RunTable).
#[derive(Debug, Error)]
pub enum ParseError {
    /// The log source could not be opened or read.
    #[error("failed to read log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A single line could not be parsed. Recovered by skipping the line.
    #[error("malformed log line: {0}")]
    Format(String),
    /// No line in the whole source produced a run record.
    #[error("no completed model runs found in log ({skipped} candidate lines skipped)")]
    EmptyLog { skipped: usize },
}

/// Integrity violations of the dependency graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("dependency cycle detected: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
    #[error("unknown model '{0}'")]
    UnknownNode(String),
    #[error("failed to load dependency definition {path}: {reason}")]
    Manifest { path: PathBuf, reason: String },
}

/// Failures of a critical-path query.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("model '{0}' is not part of the dependency graph")]
    NotInGraph(String),
    #[error("model '{0}' has no completed run in the log")]
    NotInLog(String),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Failures while loading an [`AnalyzerConfig`](crate::config::AnalyzerConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Failures while shaping a [`TimelineReport`](crate::report::TimelineReport).
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("the run table is empty; parse a log with completed runs before reporting")]
    EmptyTable,
}
