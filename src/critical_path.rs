//! Critical path computation over a parsed run and its dependency graph.
//!
//! `finish(n) = run_time(n) + max(finish(d) for d in upstream(n))`, evaluated
//! once per node in topological order. Each node remembers the dependency
//! that produced its maximum, and the path is read back from the terminal.
//!
//! When two dependencies finish at the same time the lexicographically
//! smaller name wins. The rule is applied at each branch point on the way
//! back, so the result is the path local tie-breaking produces, which is not
//! necessarily the smallest of all maximal paths.

use chrono::TimeDelta;
use std::collections::HashMap;
use std::fmt;

use crate::analyzer::RunTable;
use crate::analyzer::types::delta_to_seconds;
use crate::error::AnalysisError;
use crate::graph::DependencyGraph;

/// Non-fatal problem found while computing a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisWarning {
    /// A model upstream of the terminal never completed in this log; counted as zero.
    MissingTiming { model: String },
}

impl fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisWarning::MissingTiming { model } => {
                write!(f, "model '{}' has no run in the log, counted as 0s", model)
            }
        }
    }
}

/// Longest-duration chain of models ending at `terminal`.
#[derive(Debug, Clone, PartialEq)]
pub struct CriticalPathResult {
    pub terminal: String,
    /// Cumulative run time of the path.
    pub total: TimeDelta,
    /// Model names from a source to `terminal`, both inclusive.
    pub path: Vec<String>,
    pub warnings: Vec<AnalysisWarning>,
}

impl CriticalPathResult {
    pub fn total_seconds(&self) -> f64 {
        delta_to_seconds(self.total)
    }

    pub fn contains(&self, model_name: &str) -> bool {
        self.path.iter().any(|m| m == model_name)
    }
}

/// A parsed run joined with the dependency graph it executed.
#[derive(Debug, Clone)]
pub struct RunAnalysis {
    table: RunTable,
    graph: DependencyGraph,
}

impl RunAnalysis {
    pub fn new(table: RunTable, graph: DependencyGraph) -> Self {
        let untimed = graph.nodes().filter(|name| !table.contains(name)).count();
        if untimed > 0 {
            log::debug!("{} of {} graph models have no run in the log", untimed, graph.len());
        }
        Self { table, graph }
    }

    pub fn table(&self) -> &RunTable {
        &self.table
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Compute the critical path ending at `terminal`.
    ///
    /// # Errors
    ///
    /// [`AnalysisError::NotInGraph`] or [`AnalysisError::NotInLog`] when the
    /// terminal is missing from either side. Upstream models without a run are
    /// not errors; they cost zero and are reported in the result's warnings.
    pub fn longest_path_to(&self, terminal: &str) -> Result<CriticalPathResult, AnalysisError> {
        if !self.graph.contains(terminal) {
            return Err(AnalysisError::NotInGraph(terminal.to_string()));
        }
        if !self.table.contains(terminal) {
            return Err(AnalysisError::NotInLog(terminal.to_string()));
        }

        let ancestors = self.graph.sources_reachable_from(terminal)?;
        let mut finish: HashMap<&str, TimeDelta> = HashMap::with_capacity(ancestors.len() + 1);
        let mut best_upstream: HashMap<&str, &str> = HashMap::new();
        let mut warnings = Vec::new();

        for name in self.graph.topological_order() {
            let name = name.as_str();
            if name != terminal && !ancestors.contains(name) {
                continue;
            }

            let run_time = match self.table.get(name) {
                Some(record) => record.run_time_delta(),
                None => {
                    log::warn!("Model '{}' upstream of '{}' has no run in the log, counting it as 0s", name, terminal);
                    warnings.push(AnalysisWarning::MissingTiming { model: name.to_string() });
                    TimeDelta::zero()
                }
            };

            // Upstream names iterate in ascending order, so a strict `>` keeps the smaller name on ties.
            let mut best: Option<(&str, TimeDelta)> = None;
            for dep in self.graph.upstream_of(name)? {
                let dep_finish = finish[dep.as_str()];
                match best {
                    Some((_, current)) if dep_finish <= current => {}
                    _ => best = Some((dep.as_str(), dep_finish)),
                }
            }

            let upstream_finish = match best {
                Some((dep, dep_finish)) => {
                    best_upstream.insert(name, dep);
                    dep_finish
                }
                None => TimeDelta::zero(),
            };
            finish.insert(name, run_time.checked_add(&upstream_finish).unwrap_or(TimeDelta::MAX));
        }

        let mut path = vec![terminal.to_string()];
        let mut current = terminal;
        while let Some(&previous) = best_upstream.get(current) {
            path.push(previous.to_string());
            current = previous;
        }
        path.reverse();

        let total = finish[terminal];
        log::info!(
            "Critical path to '{}': {} models, {:.2}s",
            terminal,
            path.len(),
            delta_to_seconds(total)
        );

        Ok(CriticalPathResult {
            terminal: terminal.to_string(),
            total,
            path,
            warnings,
        })
    }

    /// Critical paths for several terminals, stopping at the first failure.
    pub fn critical_paths_to<'a, I>(&self, terminals: I) -> Result<Vec<CriticalPathResult>, AnalysisError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        terminals.into_iter().map(|t| self.longest_path_to(t)).collect()
    }
}
