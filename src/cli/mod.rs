//! Command-line parsing.
//!
//! Argument parsing and command dispatch stay separate from the enrichment
//! code. Most options can also come from the environment (or a `.env` file).

use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};

use crate::data::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_INTERVAL_SECS, DEFAULT_SOURCE_URL};
use crate::domain::{DEFAULT_CASES_THRESHOLD, DEFAULT_DEATHS_THRESHOLD, PipelineConfig, ProjectionFormat};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "covid", version, about = "Daily COVID-19 case/death enrichment and projection")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download today's source CSV, retrying until it carries today's data.
    Fetch(FetchArgs),
    /// Enrich a raw CSV with running totals and day-N indices.
    Enrich(EnrichArgs),
    /// Build the per-country chart projection from an enriched CSV.
    Project(ProjectArgs),
    /// Build the search-index bulk body and mapping from an enriched CSV.
    Index(IndexArgs),
    /// Enrich, project and index in one go, publishing all artifacts or none.
    Run(RunArgs),
}

/// Enrichment options: thresholds that start the day-N counters and the
/// reporting date the input must cover.
#[derive(Debug, Args, Clone)]
pub struct EnrichOptions {
    /// Cumulative cases that mark the start of sustained spread.
    #[arg(long, env = "COVID_CASES_THRESHOLD", default_value_t = DEFAULT_CASES_THRESHOLD)]
    pub cases_threshold: u64,

    /// Cumulative deaths that start the deaths-based day counter.
    #[arg(long, env = "COVID_DEATHS_THRESHOLD", default_value_t = DEFAULT_DEATHS_THRESHOLD)]
    pub deaths_threshold: u64,

    /// Reporting date (YYYY-MM-DD) the input must contain rows for. Defaults to today.
    #[arg(long, env = "COVID_REPORT_DATE")]
    pub report_date: Option<NaiveDate>,
}

#[derive(Debug, Args, Clone)]
pub struct FetchArgs {
    /// Source URL of the case-distribution CSV.
    #[arg(long, env = "COVID_SOURCE_URL", default_value = DEFAULT_SOURCE_URL)]
    pub url: String,

    /// Where to save the downloaded CSV.
    #[arg(long, short = 'o', default_value = "data.csv")]
    pub output: PathBuf,

    /// Maximum number of download attempts.
    #[arg(long, env = "COVID_MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Seconds to wait between attempts.
    #[arg(long, env = "COVID_RETRY_INTERVAL_SECS", default_value_t = DEFAULT_RETRY_INTERVAL_SECS)]
    pub retry_interval_secs: u64,
}

#[derive(Debug, Args, Clone)]
pub struct EnrichArgs {
    /// Raw CSV as published.
    #[arg(long, short = 'i', default_value = "data.csv")]
    pub input: PathBuf,

    /// Enriched CSV to write.
    #[arg(long, short = 'o', default_value = "data_final.csv")]
    pub output: PathBuf,

    #[command(flatten)]
    pub options: EnrichOptions,
}

#[derive(Debug, Args, Clone)]
pub struct ProjectArgs {
    /// Enriched CSV produced by `covid enrich`.
    #[arg(long, short = 'i', default_value = "data_final.csv")]
    pub input: PathBuf,

    /// Projection file to write (defaults to `data.json` / `data.js`).
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ProjectionFormat::Json)]
    pub format: ProjectionFormat,
}

#[derive(Debug, Args, Clone)]
pub struct IndexArgs {
    /// Enriched CSV produced by `covid enrich`.
    #[arg(long, short = 'i', default_value = "data_final.csv")]
    pub input: PathBuf,

    /// NDJSON bulk body to write.
    #[arg(long, short = 'o', default_value = "bulk.ndjson")]
    pub output: PathBuf,

    /// Index mapping JSON to write.
    #[arg(long, default_value = "mapping.json")]
    pub mapping: PathBuf,

    /// Target index name for the bulk action lines.
    #[arg(long, env = "COVID_INDEX_NAME", default_value = "coviddata")]
    pub index_name: String,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Raw CSV as published.
    #[arg(long, short = 'i', default_value = "data.csv")]
    pub input: PathBuf,

    /// Directory receiving every artifact.
    #[arg(long, env = "COVID_OUT_DIR", default_value = "out")]
    pub out_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = ProjectionFormat::Json)]
    pub format: ProjectionFormat,

    /// Target index name for the bulk action lines.
    #[arg(long, env = "COVID_INDEX_NAME", default_value = "coviddata")]
    pub index_name: String,

    #[command(flatten)]
    pub options: EnrichOptions,
}

impl EnrichOptions {
    pub fn to_config(&self, index_name: Option<&str>) -> PipelineConfig {
        let defaults = PipelineConfig::default();
        PipelineConfig {
            cases_threshold: self.cases_threshold,
            deaths_threshold: self.deaths_threshold,
            index_name: index_name.map(str::to_string).unwrap_or(defaults.index_name),
            report_date: Some(self.report_date.unwrap_or_else(|| Local::now().date_naive())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_defaults() {
        let cli = Cli::try_parse_from(["covid", "run"]).unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.input, PathBuf::from("data.csv"));
        assert_eq!(args.format, ProjectionFormat::Json);
        let config = args.options.to_config(Some(&args.index_name));
        assert_eq!(config.deaths_threshold, DEFAULT_DEATHS_THRESHOLD);
    }

    #[test]
    fn thresholds_are_overridable() {
        let cli = Cli::try_parse_from(["covid", "enrich", "--cases-threshold", "100", "--deaths-threshold", "5"])
            .unwrap();
        let Command::Enrich(args) = cli.command else {
            panic!("expected enrich");
        };
        let config = args.options.to_config(None);
        assert_eq!(config.cases_threshold, 100);
        assert_eq!(config.deaths_threshold, 5);
        assert_eq!(config.index_name, "coviddata");
        assert!(config.report_date.is_some());
    }

    #[test]
    fn report_date_is_overridable_for_reruns() {
        let cli = Cli::try_parse_from(["covid", "run", "--report-date", "2020-03-02"]).unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = args.options.to_config(Some(&args.index_name));
        assert_eq!(config.report_date, NaiveDate::from_ymd_opt(2020, 3, 2));
    }
}
