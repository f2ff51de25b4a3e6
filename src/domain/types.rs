//! Shared domain types.
//!
//! Records are immutable once built: the loader creates `CaseRecord`s, the
//! enricher derives exactly one `EnrichedRecord` from each, and the projector
//! folds those into one `EntityProjection` per entity.

use chrono::{Duration, NaiveDate};
use clap::ValueEnum;

/// Date format of the `dateRep` column (`DD/MM/YYYY`).
pub const DATE_REP_FMT: &str = "%d/%m/%Y";

/// Column layout of the source file. Must match exactly, in order.
pub const INPUT_COLUMNS: [&str; 10] = [
    "dateRep",
    "day",
    "month",
    "year",
    "cases",
    "deaths",
    "countriesAndTerritories",
    "geoId",
    "countryterritoryCode",
    "popData2018",
];

/// Column layout of the enriched row stream.
pub const ENRICHED_COLUMNS: [&str; 14] = [
    "dateRep",
    "day",
    "month",
    "year",
    "cases",
    "deaths",
    "countriesAndTerritories",
    "geoId",
    "countryterritoryCode",
    "popData2018",
    "dayNwithCases",
    "dayNwithDeaths",
    "casesRunningTotal",
    "deathsRunningTotal",
];

/// Cumulative cases needed before an entity counts as having sustained spread.
pub const DEFAULT_CASES_THRESHOLD: u64 = 50;
/// Cumulative deaths needed before the deaths-based day counter starts.
pub const DEFAULT_DEATHS_THRESHOLD: u64 = 10;

/// Sentinel for day-N values before (or without) an anchor.
pub const DAY_N_NONE: i64 = -1;

/// Which metric a cumulative computation runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Cases,
    Deaths,
}

impl Metric {
    pub fn value(self, record: &CaseRecord) -> u64 {
        match self {
            Metric::Cases => record.cases,
            Metric::Deaths => record.deaths,
        }
    }
}

/// A raw row of the source file.
///
/// `date_rep` is kept as text: the enricher parses it, because a bad date is
/// fatal for the whole entity rather than for the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseRecord {
    /// 1-based line in the source file.
    pub line: u64,
    pub date_rep: String,
    pub cases: u64,
    pub deaths: u64,
    pub entity_name: String,
    pub entity_code: String,
    pub country_code: String,
    pub population: Option<u64>,
}

/// A `CaseRecord` plus the per-entity derived statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedRecord {
    pub report_date: NaiveDate,
    pub corrected_date: NaiveDate,
    pub cases: u64,
    pub deaths: u64,
    /// Entity name with commas removed.
    pub entity_name: String,
    pub entity_code: String,
    pub country_code: String,
    pub population: Option<u64>,
    pub day_n_cases: i64,
    pub day_n_deaths: i64,
    pub cases_running_total: u64,
    pub deaths_running_total: u64,
}

/// The source report date is one day ahead of the actual observation day.
pub fn correct_report_date(report_date: NaiveDate) -> NaiveDate {
    report_date - Duration::days(1)
}

/// One entity's enriched history as parallel, chronologically ordered columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityProjection {
    pub code: String,
    /// Corrected dates.
    pub dates: Vec<NaiveDate>,
    pub cases: Vec<u64>,
    pub deaths: Vec<u64>,
    pub cases_running_total: Vec<u64>,
    pub deaths_running_total: Vec<u64>,
    pub day_n_cases: Vec<i64>,
    pub day_n_deaths: Vec<i64>,
    pub population: Option<u64>,
}

impl EntityProjection {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn push(&mut self, record: &EnrichedRecord) {
        self.dates.push(record.corrected_date);
        self.cases.push(record.cases);
        self.deaths.push(record.deaths);
        self.cases_running_total.push(record.cases_running_total);
        self.deaths_running_total.push(record.deaths_running_total);
        self.day_n_cases.push(record.day_n_cases);
        self.day_n_deaths.push(record.day_n_deaths);
        if record.population.is_some() {
            self.population = record.population;
        }
    }
}

/// An entity listed in the projection metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMeta {
    pub code: String,
    pub display_name: String,
}

/// Full projector output: `entities[i]` describes `datasets[i]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub entities: Vec<EntityMeta>,
    /// Latest corrected date over all projected records ("data as of").
    pub most_recent_date: Option<NaiveDate>,
    pub datasets: Vec<EntityProjection>,
    /// Enriched rows left out because of an invalid code or empty name.
    pub skipped_rows: usize,
}

/// Run configuration as understood by the library.
///
/// Derived from CLI flags (plus environment defaults).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub cases_threshold: u64,
    pub deaths_threshold: u64,
    /// Target index name written into bulk action lines.
    pub index_name: String,
    /// When set, the input must carry at least one row with this `dateRep`.
    pub report_date: Option<NaiveDate>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cases_threshold: DEFAULT_CASES_THRESHOLD,
            deaths_threshold: DEFAULT_DEATHS_THRESHOLD,
            index_name: "coviddata".to_string(),
            report_date: None,
        }
    }
}

impl PipelineConfig {
    pub fn threshold(&self, metric: Metric) -> u64 {
        match metric {
            Metric::Cases => self.cases_threshold,
            Metric::Deaths => self.deaths_threshold,
        }
    }
}

/// On-disk rendering of the projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProjectionFormat {
    /// `data.json`
    Json,
    /// `data.js`, an ES module of constants.
    Js,
}

impl ProjectionFormat {
    pub fn file_name(self) -> &'static str {
        match self {
            ProjectionFormat::Json => "data.json",
            ProjectionFormat::Js => "data.js",
        }
    }
}
