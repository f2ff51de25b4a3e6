//! The enriched row stream (CSV) and atomic artifact writes.
//!
//! The stream is the hand-off format between enrichment and the downstream
//! consumers (projector, index documents), so it can be written and read back.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::{DATE_REP_FMT, ENRICHED_COLUMNS, EnrichedRecord};
use crate::error::PipelineError;

/// One row of the enriched CSV, field names matching `ENRICHED_COLUMNS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedRow {
    #[serde(rename = "dateRep")]
    pub date_rep: String,
    pub day: String,
    pub month: String,
    pub year: String,
    pub cases: u64,
    pub deaths: u64,
    #[serde(rename = "countriesAndTerritories")]
    pub countries_and_territories: String,
    #[serde(rename = "geoId")]
    pub geo_id: String,
    #[serde(rename = "countryterritoryCode")]
    pub country_territory_code: String,
    #[serde(rename = "popData2018")]
    pub pop_data_2018: Option<u64>,
    #[serde(rename = "dayNwithCases")]
    pub day_n_with_cases: i64,
    #[serde(rename = "dayNwithDeaths")]
    pub day_n_with_deaths: i64,
    #[serde(rename = "casesRunningTotal")]
    pub cases_running_total: u64,
    #[serde(rename = "deathsRunningTotal")]
    pub deaths_running_total: u64,
}

impl From<&EnrichedRecord> for EnrichedRow {
    fn from(r: &EnrichedRecord) -> Self {
        let d = r.corrected_date;
        EnrichedRow {
            date_rep: d.format(DATE_REP_FMT).to_string(),
            day: format!("{:02}", d.day()),
            month: format!("{:02}", d.month()),
            year: d.year().to_string(),
            cases: r.cases,
            deaths: r.deaths,
            countries_and_territories: r.entity_name.clone(),
            geo_id: r.entity_code.clone(),
            country_territory_code: r.country_code.clone(),
            pop_data_2018: r.population,
            day_n_with_cases: r.day_n_cases,
            day_n_with_deaths: r.day_n_deaths,
            cases_running_total: r.cases_running_total,
            deaths_running_total: r.deaths_running_total,
        }
    }
}

impl EnrichedRow {
    /// Rebuild the record. `dateRep` holds the corrected date.
    pub fn into_record(self, line: u64) -> Result<EnrichedRecord, PipelineError> {
        let corrected_date =
            NaiveDate::parse_from_str(&self.date_rep, DATE_REP_FMT).map_err(|_| {
                PipelineError::DateParse {
                    entity: self.geo_id.clone(),
                    line,
                    value: self.date_rep.clone(),
                }
            })?;

        Ok(EnrichedRecord {
            report_date: corrected_date + Duration::days(1),
            corrected_date,
            cases: self.cases,
            deaths: self.deaths,
            entity_name: self.countries_and_territories,
            entity_code: self.geo_id,
            country_code: self.country_territory_code,
            population: self.pop_data_2018,
            day_n_cases: self.day_n_with_cases,
            day_n_deaths: self.day_n_with_deaths,
            cases_running_total: self.cases_running_total,
            deaths_running_total: self.deaths_running_total,
        })
    }
}

/// Serialize the enriched stream (header + one row per record, in order).
pub fn write_enriched_csv<W: Write>(writer: W, records: &[EnrichedRecord]) -> Result<(), PipelineError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);
    for record in records {
        writer.serialize(EnrichedRow::from(record))?;
    }
    if records.is_empty() {
        writer.write_record(ENRICHED_COLUMNS)?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Render the enriched stream into memory.
pub fn render_enriched_csv(records: &[EnrichedRecord]) -> Result<Vec<u8>, PipelineError> {
    let mut buf = Vec::new();
    write_enriched_csv(&mut buf, records)?;
    Ok(buf)
}

/// Parse an enriched stream, preserving row order.
pub fn read_enriched_csv<R: Read>(reader: R) -> Result<Vec<EnrichedRecord>, PipelineError> {
    let mut reader = csv::Reader::from_reader(reader);

    let headers = reader.headers()?.clone();
    if !headers.iter().eq(ENRICHED_COLUMNS.iter().copied()) {
        return Err(PipelineError::SchemaMismatch {
            expected: ENRICHED_COLUMNS.join(","),
            found: headers.iter().collect::<Vec<_>>().join(","),
        });
    }

    let mut out = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let row: EnrichedRow = record.deserialize(Some(&headers))?;
        out.push(row.into_record(line)?);
    }
    Ok(out)
}

pub fn read_enriched_csv_from_path(path: &Path) -> Result<Vec<EnrichedRecord>, PipelineError> {
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    read_enriched_csv(file)
}

/// Write `contents` to `path` via a sibling temporary file and a rename, so a
/// failed run never leaves a partial artifact behind.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), PipelineError> {
    write_all_atomic(&[(path.to_path_buf(), contents)])
}

/// Publish several files together: all of them or none.
///
/// Every file is staged to its temporary path first; targets are only renamed
/// into place once all staging succeeded. If a rename fails, the remaining
/// temporaries and the targets already renamed are removed.
pub fn write_all_atomic(files: &[(PathBuf, &[u8])]) -> Result<(), PipelineError> {
    let mut staged = Vec::with_capacity(files.len());
    for (path, contents) in files {
        match stage(path, contents) {
            Ok(tmp) => staged.push(tmp),
            Err(e) => {
                discard(&staged);
                return Err(e);
            }
        }
    }

    for (i, ((path, _), tmp)) in files.iter().zip(&staged).enumerate() {
        if let Err(e) = fs::rename(tmp, path) {
            discard(&staged[i..]);
            for (done, _) in &files[..i] {
                let _ = fs::remove_file(done);
            }
            return Err(PipelineError::io(path, e));
        }
    }
    Ok(())
}

fn stage(path: &Path, contents: &[u8]) -> Result<PathBuf, PipelineError> {
    let tmp = temp_path(path);
    let result = File::create(&tmp).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(PipelineError::io(&tmp, e));
    }
    Ok(tmp)
}

fn discard(temporaries: &[PathBuf]) {
    for tmp in temporaries {
        let _ = fs::remove_file(tmp);
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(code: &str, day: u32, population: Option<u64>) -> EnrichedRecord {
        let report_date = NaiveDate::from_ymd_opt(2020, 3, day).unwrap();
        EnrichedRecord {
            report_date,
            corrected_date: report_date - Duration::days(1),
            cases: 12,
            deaths: 1,
            entity_name: "Bonaire Saint Eustatius and Saba".to_string(),
            entity_code: code.to_string(),
            country_code: "BES".to_string(),
            population,
            day_n_cases: -1,
            day_n_deaths: 3,
            cases_running_total: 40,
            deaths_running_total: 11,
        }
    }

    #[test]
    fn writes_header_and_corrected_date_fields() {
        let bytes = render_enriched_csv(&[record("BQ", 5, None)]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), ENRICHED_COLUMNS.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "04/03/2020,04,03,2020,12,1,Bonaire Saint Eustatius and Saba,BQ,BES,,-1,3,40,11"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn empty_stream_still_has_header() {
        let text = String::from_utf8(render_enriched_csv(&[]).unwrap()).unwrap();
        assert_eq!(text.trim_end(), ENRICHED_COLUMNS.join(","));
    }

    #[test]
    fn reads_back_what_it_writes() {
        let records = vec![record("BQ", 5, Some(25_711)), record("X1", 6, None)];
        let bytes = render_enriched_csv(&records).unwrap();
        let back = read_enriched_csv(bytes.as_slice()).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn rejects_raw_input_header() {
        let raw = "dateRep,day,month,year,cases,deaths,countriesAndTerritories,geoId,countryterritoryCode,popData2018\n";
        let err = read_enriched_csv(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
    }

    #[test]
    fn atomic_write_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data_final.csv");
        write_atomic(&path, b"old").unwrap();
        write_atomic(&path, b"new").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn grouped_write_leaves_nothing_when_one_target_is_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("bulk.ndjson");
        let blocked = dir.path().join("mapping.json");
        fs::create_dir_all(blocked.join("occupied")).unwrap();

        let files = [(first.clone(), &b"{}"[..]), (blocked.clone(), &b"{}"[..])];
        let err = write_all_atomic(&files).unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));

        assert!(!first.exists());
        assert!(blocked.is_dir());
        assert!(!temp_path(&first).exists());
        assert!(!temp_path(&blocked).exists());
    }

    #[test]
    fn grouped_write_publishes_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        write_all_atomic(&[(a.clone(), &b"1"[..]), (b.clone(), &b"2"[..])]).unwrap();
        assert_eq!(fs::read(&a).unwrap(), b"1");
        assert_eq!(fs::read(&b).unwrap(), b"2");
    }
}
