//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - dispatches to the fetch / enrich / project / index / run handlers

use std::fs::File;

use chrono::Local;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, EnrichArgs, FetchArgs, IndexArgs, ProjectArgs, RunArgs};
use crate::data::{RetryPolicy, SourceClient};
use crate::error::AppError;
use crate::index::build_documents;
use crate::io::{read_enriched_csv_from_path, render_enriched_csv, write_all_atomic, write_atomic};
use crate::project::DatasetProjector;

pub mod pipeline;

/// Environment variable holding the log filter (e.g. `debug`, `covid_curves=trace`).
pub const LOG_ENV: &str = "COVID_LOG";

/// Entry point for the `covid` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Fetch(args) => handle_fetch(args),
        Command::Enrich(args) => handle_enrich(args),
        Command::Project(args) => handle_project(args),
        Command::Index(args) => handle_index(args),
        Command::Run(args) => handle_run(args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    // Ignore a second initialisation (e.g. when embedded in tests).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_fetch(args: FetchArgs) -> Result<(), AppError> {
    let client = SourceClient::new(&args.url)?;
    let policy = RetryPolicy {
        max_attempts: args.max_retries,
        interval: std::time::Duration::from_secs(args.retry_interval_secs),
    };

    let body = client.fetch_fresh(Local::now().date_naive(), &policy)?;
    write_atomic(&args.output, &body)?;
    info!(path = %args.output.display(), "source file saved");
    Ok(())
}

fn handle_enrich(args: EnrichArgs) -> Result<(), AppError> {
    let config = args.options.to_config(None);
    let file = open(&args.input)?;

    let (_, _, records) = pipeline::enrich_reader(file, &config)?;
    write_atomic(&args.output, &render_enriched_csv(&records)?)?;
    info!(path = %args.output.display(), records = records.len(), "enriched CSV saved");
    Ok(())
}

fn handle_project(args: ProjectArgs) -> Result<(), AppError> {
    let records = read_enriched_csv_from_path(&args.input)?;
    let projection = DatasetProjector::new()?.project(&records);
    if projection.datasets.is_empty() {
        return Err(AppError::new(3, "No projectable entities in the enriched CSV."));
    }

    let output = args
        .output
        .unwrap_or_else(|| args.format.file_name().into());
    write_atomic(&output, &pipeline::render_projection(&projection, args.format)?)?;
    info!(path = %output.display(), entities = projection.datasets.len(), "projection saved");
    Ok(())
}

fn handle_index(args: IndexArgs) -> Result<(), AppError> {
    let records = read_enriched_csv_from_path(&args.input)?;
    let documents = build_documents(&records);

    let bulk = crate::index::render_bulk_body(&args.index_name, &documents)?;
    let mapping = pipeline::render_mapping()?;
    write_all_atomic(&[
        (args.output.clone(), bulk.as_bytes()),
        (args.mapping.clone(), mapping.as_slice()),
    ])?;
    info!(
        path = %args.output.display(),
        documents = documents.len(),
        index = %args.index_name,
        "bulk body saved"
    );
    Ok(())
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = args.options.to_config(Some(&args.index_name));
    let file = open(&args.input)?;

    let run = pipeline::run_pipeline(file, &config)?;
    if run.projection.datasets.is_empty() {
        return Err(AppError::new(3, "No projectable entities in the input."));
    }
    let artifacts = pipeline::render_artifacts(&run, args.format, &config)?;
    let written = pipeline::publish(&args.out_dir, &artifacts)?;

    println!("{}", crate::report::format_run_summary(&run, &written));
    Ok(())
}

fn open(path: &std::path::Path) -> Result<File, AppError> {
    File::open(path).map_err(|e| AppError::new(2, format!("Failed to open '{}': {e}", path.display())))
}
