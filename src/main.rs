use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use env_logger::Builder;
use log::{LevelFilter, info};
use std::path::PathBuf;

use dbt_run_analyser::analyzer::{LogParser, ParseOptions};
use dbt_run_analyser::graph::{DependencyGraph, load_edge_map, load_manifest};
use dbt_run_analyser::report::{ReportOptions, TimelineReport};
use dbt_run_analyser::{AnalyzerConfig, RunAnalysis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Reconstruct a dbt run timeline and its critical path from a log file.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// dbt log file to analyse.
    log: Option<PathBuf>,

    /// TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// dbt manifest.json with model dependencies.
    #[arg(long, conflicts_with = "edges")]
    manifest: Option<PathBuf>,

    /// JSON object mapping each model to its upstream models.
    #[arg(long)]
    edges: Option<PathBuf>,

    /// Model whose critical path is reported.
    #[arg(long)]
    model: Option<String>,

    /// Leave out runs starting earlier than this many seconds into the run.
    #[arg(long, value_name = "SECONDS")]
    starting_point: Option<f64>,

    /// Flag runs lasting at least this many seconds as slow.
    #[arg(long, value_name = "SECONDS")]
    highlight: Option<f64>,

    /// Label runs lasting at least this many seconds.
    #[arg(long, value_name = "SECONDS")]
    label_threshold: Option<f64>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Debug logging for this crate.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logging setup
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(
            Some("dbt_run_analyser"),
            if args.verbose { LevelFilter::Debug } else { LevelFilter::Info },
        )
        .parse_default_env()
        .init();

    let mut config = match &args.config {
        Some(path) => AnalyzerConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AnalyzerConfig::default(),
    };
    merge_args(&mut config, &args);

    let Some(log_path) = config.log_path.clone() else {
        bail!("No log file given; pass a path or set log-path in the config");
    };

    info!("Analysing {}", log_path.display());
    let parser = LogParser::with_options(log_path.clone(), ParseOptions::from(&config));
    let table = parser
        .parse_logs()
        .with_context(|| format!("Failed to parse {}", log_path.display()))?;

    let options = ReportOptions::from(&config);
    let report = match &config.terminal_model {
        Some(terminal) => {
            let graph = load_graph(&config)?;
            let analysis = RunAnalysis::new(table, graph);
            let result = analysis.longest_path_to(terminal)?;
            TimelineReport::new(analysis.table(), Some(&result), &options)?
        }
        None => TimelineReport::new(&table, None, &options)?,
    };

    print_report(&report, args.format)
}

fn load_graph(config: &AnalyzerConfig) -> anyhow::Result<DependencyGraph> {
    let edges = if let Some(path) = &config.manifest_path {
        load_manifest(path)?
    } else if let Some(path) = &config.edges_path {
        load_edge_map(path)?
    } else {
        bail!("A terminal model needs a dependency source; pass --manifest or --edges");
    };
    DependencyGraph::build(edges).context("Invalid dependency graph")
}

/// Command-line values take precedence over the config file.
fn merge_args(config: &mut AnalyzerConfig, args: &Args) {
    if args.log.is_some() {
        config.log_path = args.log.clone();
    }
    if args.manifest.is_some() {
        config.manifest_path = args.manifest.clone();
        config.edges_path = None;
    }
    if args.edges.is_some() {
        config.edges_path = args.edges.clone();
        config.manifest_path = None;
    }
    if args.model.is_some() {
        config.terminal_model = args.model.clone();
    }
    if let Some(starting_point) = args.starting_point {
        config.starting_point = starting_point;
    }
    if args.highlight.is_some() {
        config.highlight_threshold = args.highlight;
    }
    if args.label_threshold.is_some() {
        config.label_threshold = args.label_threshold;
    }
}

fn print_report(report: &TimelineReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => print!("{}", report.to_text()),
        OutputFormat::Json => println!("{}", report.to_json().context("Failed to serialize report")?),
    }
    Ok(())
}
