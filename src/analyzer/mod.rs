//! Analyzer module for turning dbt logs into a run timeline.
//!
//! Provides functionality for:
//! - Reading a finished log file
//! - Parsing completed-run lines into [`RunRecord`]s
//! - Inferring worker slots when the log has no thread tags

pub mod log_loader;
pub mod log_parser;
pub mod threads;
pub mod types;

pub use log_parser::{LogParser, ParseOptions, parse_str};
pub use types::{LineWarning, ParseReport, RunRecord, RunRow, RunTable};
