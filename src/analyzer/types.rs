//! Type definitions specific to the analyzer module.

use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;
use std::collections::HashMap;

/// One completed model execution.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    /// Model name without its schema qualifier.
    pub model_name: String,
    /// 1-based worker slot that executed the model.
    pub thread: u32,
    /// Run time in seconds, as printed in the log (hundredths).
    pub run_time: f64,
    /// Wall-clock time at which the model finished.
    pub absolute_end_time: NaiveDateTime,
    /// Offset of the model start from the run origin.
    pub relative_start_time: TimeDelta,
    /// Offset of the model end from the run origin.
    pub relative_end_time: TimeDelta,
    /// 1-based line of the log this record was parsed from.
    pub line_number: usize,
}

impl RunRecord {
    /// Run time as an exact millisecond delta.
    pub fn run_time_delta(&self) -> TimeDelta {
        seconds_to_delta(self.run_time)
    }

    /// Wall-clock time at which the model started.
    pub fn absolute_start_time(&self) -> NaiveDateTime {
        self.absolute_end_time - self.run_time_delta()
    }
}

/// Convert log seconds to a millisecond-exact delta.
///
/// Log run times carry two decimals, so rounding to milliseconds is lossless.
pub fn seconds_to_delta(seconds: f64) -> TimeDelta {
    TimeDelta::milliseconds((seconds * 1000.0).round() as i64)
}

/// Like [`seconds_to_delta`], but `None` for values no delta can hold.
pub fn try_seconds_to_delta(seconds: f64) -> Option<TimeDelta> {
    let millis = (seconds * 1000.0).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    TimeDelta::try_milliseconds(millis as i64)
}

/// Convert a delta back to fractional seconds for presentation.
pub fn delta_to_seconds(delta: TimeDelta) -> f64 {
    delta.num_milliseconds() as f64 / 1000.0
}

/// Ordered, immutable sequence of run records in log line order.
#[derive(Debug, Clone, PartialEq)]
pub struct RunTable {
    records: Vec<RunRecord>,
    index: HashMap<String, usize>,
}

impl RunTable {
    /// Build a table from records already in line order with unique names.
    pub(crate) fn new(records: Vec<RunRecord>) -> Self {
        let index = records
            .iter()
            .enumerate()
            .map(|(idx, record)| (record.model_name.clone(), idx))
            .collect();
        Self { records, index }
    }

    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RunRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up the record for a model by name.
    pub fn get(&self, model_name: &str) -> Option<&RunRecord> {
        self.index.get(model_name).map(|&idx| &self.records[idx])
    }

    pub fn contains(&self, model_name: &str) -> bool {
        self.index.contains_key(model_name)
    }

    /// Number of distinct worker slots used by the run.
    pub fn thread_count(&self) -> usize {
        let mut threads: Vec<u32> = self.records.iter().map(|r| r.thread).collect();
        threads.sort_unstable();
        threads.dedup();
        threads.len()
    }

    /// Wall-clock span from the run origin to the last model finishing.
    pub fn total_duration(&self) -> TimeDelta {
        self.records
            .iter()
            .map(|r| r.relative_end_time)
            .max()
            .unwrap_or_else(TimeDelta::zero)
    }

    /// Rows handed to the presentation layer, in line order.
    pub fn rows(&self) -> Vec<RunRow> {
        self.records.iter().map(RunRow::from).collect()
    }
}

impl<'a> IntoIterator for &'a RunTable {
    type Item = &'a RunRecord;
    type IntoIter = std::slice::Iter<'a, RunRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// A table row as consumed by a timeline renderer. Times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRow {
    pub model_name: String,
    pub thread: u32,
    pub run_time: f64,
    pub relative_start_time: f64,
    pub relative_end_time: f64,
}

impl From<&RunRecord> for RunRow {
    fn from(record: &RunRecord) -> Self {
        Self {
            model_name: record.model_name.clone(),
            thread: record.thread,
            run_time: record.run_time,
            relative_start_time: delta_to_seconds(record.relative_start_time),
            relative_end_time: delta_to_seconds(record.relative_end_time),
        }
    }
}

/// A candidate line that was skipped during parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct LineWarning {
    pub line_number: usize,
    pub reason: String,
    pub line: String,
}

/// Line-level problems collected while parsing a log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseReport {
    pub warnings: Vec<LineWarning>,
    /// Number of runs dropped because a later line re-ran the same model.
    pub overwritten_runs: usize,
    sample_size: usize,
}

impl ParseReport {
    pub(crate) fn new(sample_size: usize) -> Self {
        Self {
            warnings: Vec::new(),
            overwritten_runs: 0,
            sample_size,
        }
    }

    pub(crate) fn skip(&mut self, line_number: usize, reason: impl Into<String>, line: &str) {
        self.warnings.push(LineWarning {
            line_number,
            reason: reason.into(),
            line: line.to_string(),
        });
    }

    pub fn skipped_lines(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Count of skipped lines plus the first few of them, or `None` when clean.
    pub fn summary(&self) -> Option<String> {
        if self.warnings.is_empty() {
            return None;
        }

        let mut summary = format!("skipped {} malformed log line(s)", self.warnings.len());
        for warning in self.warnings.iter().take(self.sample_size) {
            summary.push_str(&format!(
                "\n  line {}: {} ({})",
                warning.line_number,
                warning.reason,
                warning.line.trim()
            ));
        }
        if self.warnings.len() > self.sample_size {
            summary.push_str(&format!("\n  ... and {} more", self.warnings.len() - self.sample_size));
        }
        Some(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(name: &str, thread: u32, start_ms: i64, run_time: f64) -> RunRecord {
        let end = NaiveDate::from_ymd_opt(2025, 2, 5)
            .unwrap()
            .and_hms_opt(20, 0, 0)
            .unwrap();
        RunRecord {
            model_name: name.to_string(),
            thread,
            run_time,
            absolute_end_time: end,
            relative_start_time: TimeDelta::milliseconds(start_ms),
            relative_end_time: TimeDelta::milliseconds(start_ms) + seconds_to_delta(run_time),
            line_number: 1,
        }
    }

    #[test]
    fn seconds_round_trip_through_milliseconds() {
        assert_eq!(seconds_to_delta(3.92), TimeDelta::milliseconds(3920));
        assert_eq!(seconds_to_delta(0.1 + 0.2), TimeDelta::milliseconds(300));
        assert_eq!(try_seconds_to_delta(3.92), Some(TimeDelta::milliseconds(3920)));
        assert_eq!(try_seconds_to_delta(f64::INFINITY), None);
        assert_eq!(try_seconds_to_delta(1e300), None);
        assert_eq!(delta_to_seconds(TimeDelta::milliseconds(14550)), 14.55);
    }

    #[test]
    fn table_lookup_and_aggregates() {
        let table = RunTable::new(vec![record("a", 1, 0, 2.0), record("b", 2, 500, 4.25), record("c", 1, 2000, 1.0)]);

        assert_eq!(table.len(), 3);
        assert_eq!(table.get("b").map(|r| r.thread), Some(2));
        assert!(table.get("missing").is_none());
        assert_eq!(table.thread_count(), 2);
        assert_eq!(table.total_duration(), TimeDelta::milliseconds(4750));
    }

    #[test]
    fn rows_expose_seconds() {
        let table = RunTable::new(vec![record("a", 1, 3460, 2.46)]);
        let rows = table.rows();
        assert_eq!(
            rows,
            vec![RunRow {
                model_name: "a".to_string(),
                thread: 1,
                run_time: 2.46,
                relative_start_time: 3.46,
                relative_end_time: 5.92,
            }]
        );
    }

    #[test]
    fn absolute_start_subtracts_run_time() {
        let r = record("a", 1, 0, 3.92);
        assert_eq!(r.absolute_end_time - r.absolute_start_time(), TimeDelta::milliseconds(3920));
    }

    #[test]
    fn report_summary_is_bounded_by_sample_size() {
        let mut report = ParseReport::new(2);
        assert!(report.summary().is_none());

        report.skip(3, "no timestamp", "OK created view model a.b [OK in 1.0s]");
        report.skip(7, "no run time", "12:00:00  OK created view model a.c");
        report.skip(9, "no run time", "12:00:01  OK created view model a.d");

        let summary = report.summary().unwrap();
        assert!(summary.starts_with("skipped 3 malformed log line(s)"));
        assert!(summary.contains("line 3: no timestamp"));
        assert!(summary.contains("line 7: no run time"));
        assert!(!summary.contains("line 9"));
        assert!(summary.ends_with("... and 1 more"));
    }
}
