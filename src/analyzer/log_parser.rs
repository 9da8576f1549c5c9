//! Parse dbt log lines and assemble them into a [`RunTable`].
//!
//! A completed model run looks like this, with the date prefix and context
//! tag being optional:
//!
//! ```text
//! 2025-02-05T20:56:23+0000 [base] 20:56:23  1 of 13 OK created incremental table model main_event.e_order_event_1 ....... [OK in 3.92s]
//! 20:56:23  1 of 13 OK created view table model mart.e_order_event_1 ........ [OK in 3.92s]
//! ```

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::log_loader::read_log;
use super::threads::assign_slots;
use super::types::{ParseReport, RunRecord, RunTable, seconds_to_delta, try_seconds_to_delta};
use crate::config::{AnalyzerConfig, DEFAULT_SLOT_TOLERANCE_MS, DEFAULT_WARNING_SAMPLE_SIZE};
use crate::error::ParseError;

static CLOCK_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{2}:\d{2}:\d{2}").expect("valid clock regex"));

static DATE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2})").expect("valid date prefix regex"));

static MODEL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bmodel\s+[^\s.]+\.([^\s.]+)").expect("valid model name regex"));

static RUN_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\[\]]*?(\d+(?:\.\d+)?)s\]").expect("valid run time regex"));

static THREAD_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bThread-(\d+)\b").expect("valid thread tag regex"));

static COMPLETED_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bcreated\b.*\bmodel\s+[^\s.]+\.[^\s.]+").expect("valid completed run regex"));

/// A clock time this many hours earlier than the previous one means the log crossed midnight.
const MIDNIGHT_ROLLOVER_HOURS: i64 = 12;

/// Extract the `HH:MM:SS` clock time that dbt prints before the progress counter.
///
/// When the line starts with an ISO-8601 date prefix the first clock match
/// belongs to that prefix, so the second one is returned.
pub fn parse_timestamp(line: &str) -> Result<&str, ParseError> {
    let skip = if DATE_PREFIX.is_match(line) { 1 } else { 0 };

    CLOCK_TIME
        .find_iter(line)
        .nth(skip)
        .map(|m| m.as_str())
        .ok_or_else(|| ParseError::Format(format!("no HH:MM:SS timestamp in '{}'", line.trim())))
}

/// Timestamp of the optional ISO-8601 prefix, without its UTC offset.
pub fn parse_prefix_timestamp(line: &str) -> Option<NaiveDateTime> {
    let caps = DATE_PREFIX.captures(line)?;
    NaiveDateTime::parse_from_str(&caps[1], "%Y-%m-%dT%H:%M:%S").ok()
}

/// Calendar date of the optional ISO-8601 prefix.
pub fn parse_date_prefix(line: &str) -> Option<NaiveDate> {
    parse_prefix_timestamp(line).map(|prefix| prefix.date())
}

/// Date on which `clock_time` falls, given the prefix stamped next to it.
///
/// The prefix and the dbt clock are written moments apart, so a gap of more
/// than half a day means one of them already crossed midnight.
fn clock_date(prefix: NaiveDateTime, clock_time: NaiveTime) -> NaiveDate {
    let date = prefix.date();
    let gap = prefix.time() - clock_time;
    let rollover = TimeDelta::hours(MIDNIGHT_ROLLOVER_HOURS);

    if gap > rollover {
        date.succ_opt().unwrap_or(date)
    } else if gap < -rollover {
        date.pred_opt().unwrap_or(date)
    } else {
        date
    }
}

/// Extract the model name that follows `model <schema>.`, without the schema.
///
/// Only the `model` anchor is matched, so any materialization keyword
/// (incremental, view, python, ...) may precede it.
pub fn parse_model_name(line: &str) -> Result<&str, ParseError> {
    MODEL_NAME
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| ParseError::Format(format!("no 'model <schema>.<name>' in '{}'", line.trim())))
}

/// Extract the run time in seconds from the trailing `[... in 3.92s]` annotation.
pub fn parse_run_time(line: &str) -> Result<f64, ParseError> {
    let seconds = RUN_TIME
        .captures_iter(line)
        .last()
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| ParseError::Format(format!("no '[... in <seconds>s]' annotation in '{}'", line.trim())))?;

    let value: f64 = seconds
        .as_str()
        .parse()
        .map_err(|_| ParseError::Format(format!("invalid run time '{}'", seconds.as_str())))?;

    // The log prints hundredths.
    Ok((value * 100.0).round() / 100.0)
}

/// Explicit worker tag (`Thread-3`) carried by verbose dbt logs.
pub fn parse_thread(line: &str) -> Option<u32> {
    THREAD_TAG.captures(line).and_then(|caps| caps[1].parse().ok())
}

/// Whether the line reports a model that finished building.
///
/// Progress headers, `START` lines, banners and warnings return `false`.
pub fn is_completed_run_line(line: &str) -> bool {
    COMPLETED_RUN.is_match(line)
}

/// Fields pulled out of a single completed-run line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    pub model_name: String,
    pub clock_time: NaiveTime,
    /// Date of `clock_time` when the line carries an ISO-8601 prefix.
    pub date: Option<NaiveDate>,
    pub run_time: f64,
    pub thread: Option<u32>,
}

impl ParsedLine {
    /// Run time as a millisecond delta; [`parse_line`] only accepts run times that fit.
    pub fn run_time_delta(&self) -> TimeDelta {
        seconds_to_delta(self.run_time)
    }
}

/// Parse every field of a completed-run line.
pub fn parse_line(line: &str) -> Result<ParsedLine, ParseError> {
    let timestamp = parse_timestamp(line)?;
    let clock_time = NaiveTime::parse_from_str(timestamp, "%H:%M:%S")
        .map_err(|e| ParseError::Format(format!("invalid clock time '{}': {}", timestamp, e)))?;

    let run_time = parse_run_time(line)?;
    if try_seconds_to_delta(run_time).is_none() {
        return Err(ParseError::Format(format!("run time {}s is out of range", run_time)));
    }

    Ok(ParsedLine {
        model_name: parse_model_name(line)?.to_string(),
        clock_time,
        date: parse_prefix_timestamp(line).map(|prefix| clock_date(prefix, clock_time)),
        run_time,
        thread: parse_thread(line),
    })
}

/// Options controlling how a log is turned into a table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParseOptions {
    pub warning_sample_size: usize,
    pub slot_tolerance: TimeDelta,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            warning_sample_size: DEFAULT_WARNING_SAMPLE_SIZE,
            slot_tolerance: TimeDelta::milliseconds(DEFAULT_SLOT_TOLERANCE_MS),
        }
    }
}

impl From<&AnalyzerConfig> for ParseOptions {
    fn from(config: &AnalyzerConfig) -> Self {
        Self {
            warning_sample_size: config.warning_sample_size,
            slot_tolerance: TimeDelta::milliseconds(config.slot_tolerance_ms.max(0)),
        }
    }
}

/// Converts one dbt log file into a [`RunTable`].
#[derive(Debug, Clone)]
pub struct LogParser {
    log_path: PathBuf,
    options: ParseOptions,
}

impl LogParser {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self::with_options(log_path, ParseOptions::default())
    }

    pub fn with_options(log_path: impl Into<PathBuf>, options: ParseOptions) -> Self {
        Self {
            log_path: log_path.into(),
            options,
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Read the raw log text.
    pub fn read(&self) -> Result<String, ParseError> {
        read_log(&self.log_path)
    }

    /// Parse the log file, logging a summary of any skipped lines.
    pub fn parse_logs(&self) -> Result<RunTable, ParseError> {
        let (table, report) = self.parse_logs_with_report()?;
        if let Some(summary) = report.summary() {
            log::warn!("{}: {}", self.log_path.display(), summary);
        }
        Ok(table)
    }

    /// Parse the log file and return the skipped-line report alongside the table.
    pub fn parse_logs_with_report(&self) -> Result<(RunTable, ParseReport), ParseError> {
        let text = self.read()?;
        let parsed = parse_str(&text, &self.options)?;
        log::info!(
            "Parsed {} model runs on {} thread(s) from {}",
            parsed.0.len(),
            parsed.0.thread_count(),
            self.log_path.display()
        );
        Ok(parsed)
    }
}

/// A completed-run line with its resolved wall-clock span.
struct PendingRecord {
    line: ParsedLine,
    absolute_start_time: NaiveDateTime,
    absolute_end_time: NaiveDateTime,
    line_number: usize,
}

/// A completed-run line and the number of midnights crossed before it.
struct ClockedLine<'a> {
    line: ParsedLine,
    day_offset: i64,
    line_number: usize,
    raw: &'a str,
}

/// Parse log text that is already in memory.
///
/// Relative times are `absolute_end_time - run_time - origin`, where the
/// origin is the earliest such start over every completed run in the log,
/// re-runs included. Log clock times are whole seconds, so records that ran
/// back to back on one thread can appear to overlap by up to a second.
pub fn parse_str(text: &str, options: &ParseOptions) -> Result<(RunTable, ParseReport), ParseError> {
    let mut report = ParseReport::new(options.warning_sample_size);
    let pending = collect_runs(text, &mut report);

    let origin = pending
        .iter()
        .map(|p| p.absolute_start_time)
        .min()
        .ok_or(ParseError::EmptyLog {
            skipped: report.skipped_lines(),
        })?;
    let pending = keep_latest_runs(pending, &mut report);

    let intervals: Vec<(TimeDelta, TimeDelta)> = pending
        .iter()
        .map(|p| (p.absolute_start_time - origin, p.absolute_end_time - origin))
        .collect();

    let threads: Vec<u32> = match pending.iter().map(|p| p.line.thread).collect::<Option<Vec<u32>>>() {
        Some(tagged) => tagged,
        None => assign_slots(&intervals, options.slot_tolerance),
    };

    let records = pending
        .into_iter()
        .zip(intervals)
        .zip(threads)
        .map(|((p, (start, end)), thread)| RunRecord {
            model_name: p.line.model_name,
            thread,
            run_time: p.line.run_time,
            absolute_end_time: p.absolute_end_time,
            relative_start_time: start,
            relative_end_time: end,
            line_number: p.line_number,
        })
        .collect();

    Ok((RunTable::new(records), report))
}

/// Parse every completed-run line, resolving clock times to full timestamps.
///
/// Midnight is tracked on the dbt clock for every line. Dated lines pin the
/// calendar; an undated line takes the date of the nearest dated line before
/// it (or, failing that, the first one after it) shifted by the midnights in
/// between. A log with no dated line starts on [`NaiveDate::default`].
fn collect_runs(text: &str, report: &mut ParseReport) -> Vec<PendingRecord> {
    let lines = clock_lines(text, report);

    let mut anchor = lines
        .iter()
        .find_map(|c| c.line.date.map(|date| (date, c.day_offset)))
        .unwrap_or((NaiveDate::default(), 0));

    let mut pending = Vec::with_capacity(lines.len());
    for clocked in lines {
        if let Some(date) = clocked.line.date {
            anchor = (date, clocked.day_offset);
        }

        let span = anchor
            .0
            .checked_add_signed(TimeDelta::days(clocked.day_offset - anchor.1))
            .map(|date| date.and_time(clocked.line.clock_time))
            .and_then(|end| Some((end.checked_sub_signed(clocked.line.run_time_delta())?, end)));

        let Some((absolute_start_time, absolute_end_time)) = span else {
            let reason = format!("run time {}s reaches outside the calendar", clocked.line.run_time);
            log::debug!("Skipping line {}: {}", clocked.line_number, reason);
            report.skip(clocked.line_number, reason, clocked.raw);
            continue;
        };

        pending.push(PendingRecord {
            line: clocked.line,
            absolute_start_time,
            absolute_end_time,
            line_number: clocked.line_number,
        });
    }

    pending
}

/// Parse candidate lines and count midnight crossings on the dbt clock.
fn clock_lines<'a>(text: &'a str, report: &mut ParseReport) -> Vec<ClockedLine<'a>> {
    let mut lines = Vec::new();
    let mut day_offset = 0i64;
    let mut last_clock: Option<NaiveTime> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_number = idx + 1;
        if !is_completed_run_line(raw) {
            continue;
        }

        let line = match parse_line(raw) {
            Ok(line) => line,
            Err(e) => {
                log::debug!("Skipping line {}: {}", line_number, e);
                report.skip(line_number, e.to_string(), raw);
                continue;
            }
        };

        if let Some(previous) = last_clock {
            if previous - line.clock_time > TimeDelta::hours(MIDNIGHT_ROLLOVER_HOURS) {
                day_offset += 1;
            }
        }
        last_clock = Some(line.clock_time);

        lines.push(ClockedLine {
            line,
            day_offset,
            line_number,
            raw,
        });
    }

    lines
}

/// Drop earlier runs of models that were re-run later in the same log.
fn keep_latest_runs(pending: Vec<PendingRecord>, report: &mut ParseReport) -> Vec<PendingRecord> {
    let last_seen: HashMap<String, usize> = pending
        .iter()
        .enumerate()
        .map(|(idx, p)| (p.line.model_name.clone(), idx))
        .collect();

    let total = pending.len();
    let kept: Vec<PendingRecord> = pending
        .into_iter()
        .enumerate()
        .filter(|(idx, p)| last_seen.get(&p.line.model_name) == Some(idx))
        .map(|(_, p)| p)
        .collect();

    report.overwritten_runs = total - kept.len();
    if report.overwritten_runs > 0 {
        log::debug!("{} earlier run(s) replaced by re-runs of the same model", report.overwritten_runs);
    }
    kept
}
