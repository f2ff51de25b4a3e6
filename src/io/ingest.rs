//! CSV ingest of the raw daily case/death file.
//!
//! Design goals:
//! - **Strict schema**: the header must match `INPUT_COLUMNS` exactly, in order
//! - **Strict mandatory fields**: `cases`/`deaths` must be integers >= 0
//! - **Lenient optional fields**: a bad `popData2018` becomes unknown
//! - **No reordering**: records keep input-file order; the enricher sorts

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use tracing::{debug, info};

use crate::domain::{CaseRecord, DATE_REP_FMT, INPUT_COLUMNS};
use crate::error::PipelineError;

const COL_DATE_REP: usize = 0;
const COL_CASES: usize = 4;
const COL_DEATHS: usize = 5;
const COL_NAME: usize = 6;
const COL_CODE: usize = 7;
const COL_COUNTRY_CODE: usize = 8;
const COL_POPULATION: usize = 9;

/// Ingest output: records grouped by entity code.
#[derive(Debug, Clone, Default)]
pub struct LoadedRecords {
    /// Entity code -> records in input-file order. Iterates in code order.
    pub by_entity: BTreeMap<String, Vec<CaseRecord>>,
    pub rows_read: usize,
    /// Rows whose population was missing or malformed.
    pub unknown_population: usize,
}

impl LoadedRecords {
    pub fn entity_count(&self) -> usize {
        self.by_entity.len()
    }
}

/// Load the raw CSV from disk.
pub fn load_case_records_from_path(path: &Path) -> Result<LoadedRecords, PipelineError> {
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let loaded = load_case_records(file)?;
    info!(
        path = %path.display(),
        rows = loaded.rows_read,
        entities = loaded.entity_count(),
        "loaded case records"
    );
    Ok(loaded)
}

/// Parse raw CSV rows into `CaseRecord`s grouped by entity code.
///
/// Fails before reading any row if the header is not the expected one.
pub fn load_case_records<R: Read>(reader: R) -> Result<LoadedRecords, PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    check_header(&headers)?;

    let mut loaded = LoadedRecords::default();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let row = parse_row(&record, line)?;
        if row.population.is_none() {
            loaded.unknown_population += 1;
        }
        loaded.rows_read += 1;
        loaded
            .by_entity
            .entry(row.entity_code.clone())
            .or_default()
            .push(row);
    }

    if loaded.unknown_population > 0 {
        debug!(rows = loaded.unknown_population, "rows with unknown population");
    }

    Ok(loaded)
}

/// Reject a file that has no row for `report_date`: the source has not been
/// updated yet, and enriching it would publish yesterday's figures as today's.
pub fn require_report_date(loaded: &LoadedRecords, report_date: NaiveDate) -> Result<(), PipelineError> {
    let dates = loaded
        .by_entity
        .values()
        .flatten()
        .filter_map(|r| NaiveDate::parse_from_str(&r.date_rep, DATE_REP_FMT).ok());

    let mut latest: Option<NaiveDate> = None;
    for date in dates {
        if date == report_date {
            return Ok(());
        }
        latest = latest.max(Some(date));
    }

    Err(PipelineError::StaleData {
        expected: report_date.format(DATE_REP_FMT).to_string(),
        latest: latest.map_or_else(|| "unknown".to_string(), |d| d.format(DATE_REP_FMT).to_string()),
    })
}

fn check_header(headers: &StringRecord) -> Result<(), PipelineError> {
    let found: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| normalize_header_name(idx, name))
        .collect();

    if found.iter().map(String::as_str).eq(INPUT_COLUMNS.iter().copied()) {
        return Ok(());
    }

    Err(PipelineError::SchemaMismatch {
        expected: INPUT_COLUMNS.join(","),
        found: found.join(","),
    })
}

fn normalize_header_name(idx: usize, name: &str) -> String {
    // Some exports prefix the first header with a UTF-8 BOM.
    let name = if idx == 0 {
        name.trim_start_matches('\u{feff}')
    } else {
        name
    };
    name.trim().to_string()
}

fn parse_row(record: &StringRecord, line: u64) -> Result<CaseRecord, PipelineError> {
    if record.len() != INPUT_COLUMNS.len() {
        return Err(PipelineError::RowShape {
            line,
            expected: INPUT_COLUMNS.len(),
            found: record.len(),
        });
    }

    let field = |idx: usize| record.get(idx).unwrap_or_default();

    Ok(CaseRecord {
        line,
        date_rep: field(COL_DATE_REP).to_string(),
        cases: parse_count(field(COL_CASES), "cases", line)?,
        deaths: parse_count(field(COL_DEATHS), "deaths", line)?,
        entity_name: field(COL_NAME).to_string(),
        entity_code: field(COL_CODE).to_string(),
        country_code: field(COL_COUNTRY_CODE).to_string(),
        population: field(COL_POPULATION).parse::<u64>().ok(),
    })
}

fn parse_count(raw: &str, field: &'static str, line: u64) -> Result<u64, PipelineError> {
    raw.parse::<u64>().map_err(|_| PipelineError::RowParse {
        line,
        field,
        value: raw.to_string(),
    })
}
