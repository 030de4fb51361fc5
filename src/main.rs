use std::path::PathBuf;

use bill_injector::config::PipelineConfig;
use bill_injector::sync;
use bill_injector::{Result, ToolError};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_logging(cli.verbose).and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| ToolError::Logging(error.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Inject(args) => execute_inject(&args.resolve()?),
        Command::Validate(args) => execute_validate(&args.resolve()?),
        Command::Run(args) => {
            let config = args.resolve()?;
            execute_inject(&config)?;
            execute_validate(&config)
        }
    }
}

fn execute_inject(config: &PipelineConfig) -> Result<()> {
    let summary = sync::inject_bills(config)?;
    println!(
        "Inserted {} bill row(s) for {} meter(s) into {} ({} record(s) skipped).",
        summary.outcome.rows_inserted,
        summary.outcome.meters.len(),
        summary.output.display(),
        summary.outcome.records_skipped,
    );
    Ok(())
}

fn execute_validate(config: &PipelineConfig) -> Result<()> {
    let report = sync::validate_output(config)?;
    if report.is_empty() {
        println!("No warnings or errors.");
    } else {
        println!(
            "{} warning(s), {} error(s); report written to {}.",
            report.warnings().count(),
            report.errors().count(),
            config.report().display(),
        );
    }
    if report.has_errors() {
        info!("validation errors are reported but do not abort the run");
    }
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Inject billing-provider bills into a meter upload template and validate the result."
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Filter the template and insert one row per matched bill.
    Inject(PathArgs),
    /// Cross-check a synthesized workbook against the billing export.
    Validate(PathArgs),
    /// Inject, then validate the written workbook.
    Run(PathArgs),
}

#[derive(clap::Args)]
struct PathArgs {
    /// JSON file providing any of the settings below.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Billing export (.xlsx or .csv).
    #[arg(long)]
    source: Option<PathBuf>,

    /// Upload template workbook.
    #[arg(long)]
    template: Option<PathBuf>,

    /// Synthesized workbook path.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Sheet receiving the bills.
    #[arg(long)]
    sheet: Option<String>,

    /// Validation report path.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write the meters that received rows to this JSON file.
    #[arg(long)]
    meter_set: Option<PathBuf>,

    /// Save the template after filtering, before any rows are inserted.
    #[arg(long)]
    filtered_snapshot: Option<PathBuf>,
}

impl PathArgs {
    fn resolve(self) -> Result<PipelineConfig> {
        let base = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };
        Ok(base.merged_with(PipelineConfig {
            source: self.source,
            template: self.template,
            output: self.output,
            sheet: self.sheet,
            report: self.report,
            meter_set: self.meter_set,
            filtered_snapshot: self.filtered_snapshot,
        }))
    }
}
