use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod aggregate;
mod columns;
mod config;
mod error;
mod metric;
mod models;
mod normalize;
mod pipeline;
mod range;
mod report;

use config::{parse_delimiter, FileConfig, PipelineConfig};
use error::PipelineError;
use models::MetricKind;

const LOG_ENV: &str = "RETENTION_LOG";

/// Distinct from clap's usage-error status (2).
const EXIT_NOTHING_TO_REPORT: u8 = 3;

#[derive(Parser)]
#[command(name = "attendance-retention")]
#[command(about = "Month-over-month retention and churn for group session attendance", long_about = None)]
struct Cli {
    /// JSON file with session_types, columns and delimiter
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log filter, e.g. info or debug (falls back to RETENTION_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct InputArgs {
    /// Attendance export: .xlsx/.xls/.ods workbook or CSV with a header row
    #[arg(long, short)]
    input: PathBuf,
    /// Field delimiter; use "tab" for TSV
    #[arg(long)]
    delimiter: Option<String>,
    /// Exact header of the visit date column
    #[arg(long)]
    date_column: Option<String>,
    /// Exact header of the client name column
    #[arg(long)]
    name_column: Option<String>,
    /// Exact header of the session type column
    #[arg(long)]
    session_column: Option<String>,
}

#[derive(Args, Clone)]
struct WindowArgs {
    #[arg(long, value_enum, default_value_t = MetricKind::Retention)]
    metric: MetricKind,
    /// First day to include (YYYY-MM-DD or DD.MM.YYYY)
    #[arg(long, value_parser = parse_date)]
    start: Option<NaiveDate>,
    /// Last day to include (YYYY-MM-DD or DD.MM.YYYY)
    #[arg(long, value_parser = parse_date)]
    end: Option<NaiveDate>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Csv,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the metric for each consecutive month pair
    Compute {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        window: WindowArgs,
        /// Order rows from highest to lowest value
        #[arg(long)]
        sort_desc: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show resolved columns and row accounting for an export
    Inspect {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long, default_value = "retention_report.md")]
        out: PathBuf,
    },
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    normalize::parse_day_first(value)
        .ok_or_else(|| PipelineError::InvalidDate(value.to_string()).to_string())
}

fn setup_logging(cli_level: Option<&str>) -> anyhow::Result<()> {
    let filter = match cli_level {
        Some(level) => EnvFilter::try_new(level).context("invalid --log-level")?,
        None => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .with_env_filter(filter)
        .init();
    Ok(())
}

fn build_config(
    config_path: Option<&Path>,
    input: &InputArgs,
    window: Option<&WindowArgs>,
) -> anyhow::Result<PipelineConfig> {
    let mut config = PipelineConfig::default();

    if let Some(path) = config_path {
        let file = FileConfig::load(path)?;
        config = config.with_file(file)?;
        debug!(path = %path.display(), "loaded config file");
    }

    if let Some(delimiter) = &input.delimiter {
        config.delimiter = parse_delimiter(delimiter)?;
    }
    if input.date_column.is_some() {
        config.columns.date = input.date_column.clone();
    }
    if input.name_column.is_some() {
        config.columns.name = input.name_column.clone();
    }
    if input.session_column.is_some() {
        config.columns.session = input.session_column.clone();
    }
    if let Some(window) = window {
        config.metric = window.metric;
        config.start = window.start;
        config.end = window.end;
    }

    Ok(config)
}

fn write_output(out: Option<&Path>, content: &[u8]) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Result written to {}.", path.display());
        }
        None => io::stdout().write_all(content)?,
    }
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Compute {
            input,
            window,
            sort_desc,
            format,
            out,
        } => {
            let mut config = build_config(cli.config.as_deref(), &input, Some(&window))?;
            config.sort_descending = sort_desc;

            let table = pipeline::read_path(&input.input, config.delimiter)?;
            let result = pipeline::run(&table, &config)?;
            info!(metric = result.metric.label(), rows = result.rows.len(), "computed metric");

            let rendered = match format {
                OutputFormat::Table => report::render_table(&result).into_bytes(),
                OutputFormat::Csv => {
                    let mut buffer = Vec::new();
                    report::write_csv(&mut buffer, &result)?;
                    buffer
                }
                OutputFormat::Json => {
                    let mut json = report::render_json(&result)?;
                    json.push('\n');
                    json.into_bytes()
                }
            };
            write_output(out.as_deref(), &rendered)?;
        }
        Commands::Inspect { input } => {
            let config = build_config(cli.config.as_deref(), &input, None)?;
            let table = pipeline::read_path(&input.input, config.delimiter)?;
            let inspection = pipeline::inspect(&table, &config)?;

            print!("{}", report::render_columns(&table, &inspection.columns));
            println!("Data check:");
            print!("{}", report::render_diagnostics(&inspection.diagnostics));
            print!("{}", report::render_months(&inspection.months));
        }
        Commands::Report { input, window, out } => {
            let config = build_config(cli.config.as_deref(), &input, Some(&window))?;
            let table = pipeline::read_path(&input.input, config.delimiter)?;
            let analysis = pipeline::analyze(&table, &config)?;
            let source = input.input.display().to_string();
            let report = report::build_report(&source, &table, &analysis, config.metric);

            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = setup_logging(cli.log_level.as_deref()) {
        eprintln!("Error: {err:#}");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<PipelineError>() {
            Some(pipeline_err) if pipeline_err.is_empty_result() => {
                eprintln!("Nothing to report: {pipeline_err}");
                ExitCode::from(EXIT_NOTHING_TO_REPORT)
            }
            _ => {
                eprintln!("Error: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}
