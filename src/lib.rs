//! Timeline and critical-path analysis of dbt run logs.
//!
//! - [`analyzer`] turns a dbt log into a [`RunTable`](analyzer::RunTable)
//! - [`graph`] holds the model dependency DAG
//! - [`critical_path`] joins the two and finds the longest dependency chain
//! - [`report`] shapes results for a timeline renderer

pub mod analyzer;
pub mod config;
pub mod critical_path;
pub mod error;
pub mod graph;
pub mod report;

pub use analyzer::{LogParser, RunRecord, RunTable};
pub use config::AnalyzerConfig;
pub use critical_path::{AnalysisWarning, CriticalPathResult, RunAnalysis};
pub use error::{AnalysisError, ConfigError, GraphError, ParseError, ReportError};
pub use graph::DependencyGraph;
