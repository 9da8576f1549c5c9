//! Hand-off of analysis results to a timeline renderer.
//!
//! Nothing here draws; it shapes the run table and critical path into rows
//! a renderer can place on a thread/time grid, as JSON or plain text.
//! [`ReportOptions`] decide which bars are shown, flagged slow or labelled.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write;

use crate::analyzer::types::delta_to_seconds;
use crate::analyzer::{RunRow, RunTable};
use crate::config::AnalyzerConfig;
use crate::critical_path::CriticalPathResult;
use crate::error::ReportError;

/// Presentation thresholds, all in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReportOptions {
    /// Runs starting before this offset are left out of the rows.
    pub starting_point: f64,
    /// Runs at least this long are flagged slow. `None` flags nothing.
    pub highlight_threshold: Option<f64>,
    /// Runs at least this long carry a label. `None` labels only the critical path.
    pub label_threshold: Option<f64>,
}

impl From<&AnalyzerConfig> for ReportOptions {
    fn from(config: &AnalyzerConfig) -> Self {
        Self {
            starting_point: config.starting_point,
            highlight_threshold: config.highlight_threshold,
            label_threshold: config.label_threshold,
        }
    }
}

fn at_least(value: f64, threshold: Option<f64>) -> bool {
    threshold.is_some_and(|threshold| value >= threshold)
}

/// One timeline bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineRow {
    #[serde(flatten)]
    pub run: RunRow,
    pub on_critical_path: bool,
    pub slow: bool,
    /// Whether a renderer should print the model name on the bar.
    pub show_label: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriticalPathSummary {
    pub terminal: String,
    pub total_run_time: f64,
    pub path: Vec<String>,
    pub warnings: Vec<String>,
}

impl From<&CriticalPathResult> for CriticalPathSummary {
    fn from(result: &CriticalPathResult) -> Self {
        Self {
            terminal: result.terminal.clone(),
            total_run_time: result.total_seconds(),
            path: result.path.clone(),
            warnings: result.warnings.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Everything a renderer needs for one run.
///
/// `threads` and `total_duration` describe the whole run, so the axes stay
/// the same whatever `starting_point` hides.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineReport {
    pub threads: usize,
    pub total_duration: f64,
    pub rows: Vec<TimelineRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical_path: Option<CriticalPathSummary>,
}

impl TimelineReport {
    pub fn new(
        table: &RunTable,
        critical_path: Option<&CriticalPathResult>,
        options: &ReportOptions,
    ) -> Result<Self, ReportError> {
        if table.is_empty() {
            return Err(ReportError::EmptyTable);
        }

        let highlighted: HashSet<&str> = critical_path
            .map(|result| result.path.iter().map(String::as_str).collect())
            .unwrap_or_default();

        let rows = table
            .iter()
            .map(RunRow::from)
            .filter(|run| run.relative_start_time >= options.starting_point)
            .map(|run| {
                let on_critical_path = highlighted.contains(run.model_name.as_str());
                TimelineRow {
                    slow: at_least(run.run_time, options.highlight_threshold),
                    show_label: on_critical_path || at_least(run.run_time, options.label_threshold),
                    on_critical_path,
                    run,
                }
            })
            .collect();

        Ok(Self {
            threads: table.thread_count(),
            total_duration: delta_to_seconds(table.total_duration()),
            rows,
            critical_path: critical_path.map(CriticalPathSummary::from),
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Fixed-width table, critical-path rows marked with `*`, slow rows with `!`.
    pub fn to_text(&self) -> String {
        let name_width = self
            .rows
            .iter()
            .map(|row| row.run.model_name.len())
            .max()
            .unwrap_or(0)
            .max("model".len());

        let mut out = String::new();
        let _ = writeln!(
            out,
            "   {:<name_width$}  {:>6}  {:>9}  {:>9}  {:>9}",
            "model", "thread", "start", "end", "run time"
        );
        for row in &self.rows {
            let marker = if row.on_critical_path { '*' } else { ' ' };
            let slow = if row.slow { '!' } else { ' ' };
            let _ = writeln!(
                out,
                "{}{} {:<name_width$}  {:>6}  {:>8.2}s  {:>8.2}s  {:>8.2}s",
                marker,
                slow,
                row.run.model_name,
                row.run.thread,
                row.run.relative_start_time,
                row.run.relative_end_time,
                row.run.run_time
            );
        }
        let _ = writeln!(
            out,
            "\n{} models on {} thread(s), {:.2}s wall clock",
            self.rows.len(),
            self.threads,
            self.total_duration
        );

        if let Some(critical) = &self.critical_path {
            let _ = writeln!(
                out,
                "Critical path to {} ({:.2}s): {}",
                critical.terminal,
                critical.total_run_time,
                critical.path.join(" -> ")
            );
            for warning in &critical.warnings {
                let _ = writeln!(out, "warning: {}", warning);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{ParseOptions, parse_str};
    use crate::critical_path::RunAnalysis;
    use crate::graph::DependencyGraph;

    const LOG: &str = "\
10:00:02  1 of 3 OK created table model s.stg .... [OK in 2.00s]
10:00:03  2 of 3 OK created view model s.other .... [OK in 1.00s]
10:00:06  3 of 3 OK created table model s.fct .... [OK in 3.00s]
";

    fn analysis() -> RunAnalysis {
        let (table, _) = parse_str(LOG, &ParseOptions::default()).unwrap();
        let graph = DependencyGraph::build([("stg", vec![]), ("other", vec![]), ("fct", vec!["stg", "other"])]).unwrap();
        RunAnalysis::new(table, graph)
    }

    #[test]
    fn rows_on_the_path_are_flagged() {
        let analysis = analysis();
        let path = analysis.longest_path_to("fct").unwrap();
        let report = TimelineReport::new(analysis.table(), Some(&path), &ReportOptions::default()).unwrap();

        let flags: Vec<(&str, bool, bool)> = report
            .rows
            .iter()
            .map(|row| (row.run.model_name.as_str(), row.on_critical_path, row.show_label))
            .collect();
        assert_eq!(flags, vec![("stg", true, true), ("other", false, false), ("fct", true, true)]);
        assert!(report.rows.iter().all(|row| !row.slow));
        assert_eq!(report.total_duration, 6.0);
    }

    #[test]
    fn thresholds_flag_slow_and_labelled_runs() {
        let analysis = analysis();
        let options = ReportOptions {
            highlight_threshold: Some(3.0),
            label_threshold: Some(2.0),
            ..ReportOptions::default()
        };
        let report = TimelineReport::new(analysis.table(), None, &options).unwrap();

        let flags: Vec<(&str, bool, bool)> = report
            .rows
            .iter()
            .map(|row| (row.run.model_name.as_str(), row.slow, row.show_label))
            .collect();
        assert_eq!(flags, vec![("stg", false, true), ("other", false, false), ("fct", true, true)]);
    }

    #[test]
    fn starting_point_hides_earlier_runs_but_keeps_axes() {
        let analysis = analysis();
        let options = ReportOptions {
            starting_point: 2.0,
            ..ReportOptions::default()
        };
        let report = TimelineReport::new(analysis.table(), None, &options).unwrap();

        let names: Vec<&str> = report.rows.iter().map(|row| row.run.model_name.as_str()).collect();
        assert_eq!(names, vec!["other", "fct"]);
        assert_eq!(report.total_duration, 6.0);
        assert_eq!(report.threads, 1);
    }

    #[test]
    fn empty_table_is_refused() {
        let err = TimelineReport::new(&RunTable::new(Vec::new()), None, &ReportOptions::default()).unwrap_err();
        assert!(matches!(err, ReportError::EmptyTable));
    }

    #[test]
    fn options_come_from_config() {
        let config = AnalyzerConfig {
            starting_point: 1.5,
            highlight_threshold: Some(60.0),
            ..AnalyzerConfig::default()
        };
        assert_eq!(
            ReportOptions::from(&config),
            ReportOptions {
                starting_point: 1.5,
                highlight_threshold: Some(60.0),
                label_threshold: None,
            }
        );
    }

    #[test]
    fn json_flattens_run_fields() {
        let analysis = analysis();
        let report = TimelineReport::new(analysis.table(), None, &ReportOptions::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(value["rows"][2]["model_name"], "fct");
        assert_eq!(value["rows"][2]["relative_start_time"], 3.0);
        assert_eq!(value["rows"][2]["on_critical_path"], false);
        assert_eq!(value["rows"][2]["slow"], false);
        assert!(value.get("critical_path").is_none());
    }

    #[test]
    fn text_lists_path_and_marks_rows() {
        let analysis = analysis();
        let path = analysis.longest_path_to("fct").unwrap();
        let options = ReportOptions {
            highlight_threshold: Some(3.0),
            ..ReportOptions::default()
        };
        let text = TimelineReport::new(analysis.table(), Some(&path), &options).unwrap().to_text();

        assert!(text.contains("*  stg"));
        assert!(text.contains("   other"));
        assert!(text.contains("*! fct"));
        assert!(text.contains("Critical path to fct (5.00s): stg -> fct"));
    }
}
