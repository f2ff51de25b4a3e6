//! Reshape the enriched stream into one column-oriented record per entity.
//!
//! The stream is already chronological per entity, so rows are appended in
//! stream order and never re-sorted here.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use regex::Regex;
use tracing::{info, warn};

use crate::domain::{EnrichedRecord, EntityMeta, EntityProjection, Projection};
use crate::error::PipelineError;

/// Entity codes that may appear in the projection.
pub const ENTITY_CODE_PATTERN: &str = "^[A-Z]{2}$";

/// Entities are ordered by the combined `name#code` string.
fn order_key(name: &str, code: &str) -> String {
    format!("{name}#{code}")
}

/// Why a row was left out of the projection. Recoverable: the row stays in
/// the enriched stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SkipReason {
    InvalidEntityCode,
    MissingEntityName,
}

#[derive(Debug, Clone)]
pub struct DatasetProjector {
    code_pattern: Regex,
}

impl DatasetProjector {
    pub fn new() -> Result<Self, PipelineError> {
        Ok(Self {
            code_pattern: Regex::new(ENTITY_CODE_PATTERN)?,
        })
    }

    /// Check whether a row can be projected.
    pub fn validate(&self, record: &EnrichedRecord) -> Result<(), SkipReason> {
        if !self.code_pattern.is_match(&record.entity_code) {
            return Err(SkipReason::InvalidEntityCode);
        }
        if record.entity_name.is_empty() {
            return Err(SkipReason::MissingEntityName);
        }
        Ok(())
    }

    /// Fold the enriched stream into per-entity projections.
    ///
    /// Entities are ordered by `name#code`. A code appearing under several
    /// names is listed and projected once, under the name that sorts first,
    /// so `entities[i]` always describes `datasets[i]`.
    pub fn project(&self, records: &[EnrichedRecord]) -> Projection {
        let mut by_code: BTreeMap<&str, EntityProjection> = BTreeMap::new();
        let mut pairs: BTreeMap<String, (&str, &str)> = BTreeMap::new();
        let mut skipped: BTreeMap<(&str, &str), (SkipReason, usize)> = BTreeMap::new();
        let mut most_recent_date: Option<NaiveDate> = None;

        for record in records {
            let name = record.entity_name.as_str();
            let code = record.entity_code.as_str();

            if let Err(reason) = self.validate(record) {
                skipped.entry((name, code)).or_insert((reason, 0)).1 += 1;
                continue;
            }

            pairs.entry(order_key(name, code)).or_insert((name, code));
            most_recent_date = most_recent_date.max(Some(record.corrected_date));
            by_code
                .entry(code)
                .or_insert_with(|| EntityProjection {
                    code: code.to_string(),
                    ..EntityProjection::default()
                })
                .push(record);
        }

        let mut skipped_rows = 0usize;
        for ((name, code), (reason, rows)) in &skipped {
            warn!(entity_name = name, entity_code = code, ?reason, rows, "ignoring entity rows");
            skipped_rows += rows;
        }

        let mut emitted = HashSet::new();
        let mut entities = Vec::with_capacity(by_code.len());
        let mut datasets = Vec::with_capacity(by_code.len());
        for &(name, code) in pairs.values() {
            if !emitted.insert(code) {
                continue;
            }
            if let Some(projection) = by_code.remove(code) {
                entities.push(EntityMeta {
                    code: code.to_string(),
                    display_name: name.replace('_', " "),
                });
                datasets.push(projection);
            }
        }

        info!(
            entities = entities.len(),
            datasets = datasets.len(),
            skipped_rows,
            "projection built"
        );

        Projection {
            entities,
            most_recent_date,
            datasets,
            skipped_rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn record(name: &str, code: &str, day: u32, cases: u64, population: Option<u64>) -> EnrichedRecord {
        let report_date = NaiveDate::from_ymd_opt(2020, 3, day).unwrap();
        EnrichedRecord {
            report_date,
            corrected_date: report_date - Duration::days(1),
            cases,
            deaths: 0,
            entity_name: name.to_string(),
            entity_code: code.to_string(),
            country_code: String::new(),
            population,
            day_n_cases: -1,
            day_n_deaths: -1,
            cases_running_total: cases,
            deaths_running_total: 0,
        }
    }

    fn projector() -> DatasetProjector {
        DatasetProjector::new().unwrap()
    }

    #[test]
    fn invalid_codes_and_empty_names_are_skipped() {
        let records = vec![
            record("Testland", "X1", 2, 1, None),
            record("", "AB", 2, 1, None),
            record("Kosovo", "XK", 2, 1, None),
            record("Cases_on_an_international_conveyance_Japan", "JPG11668", 2, 1, None),
        ];
        let p = projector();
        assert_eq!(p.validate(&records[0]), Err(SkipReason::InvalidEntityCode));
        assert_eq!(p.validate(&records[1]), Err(SkipReason::MissingEntityName));
        assert_eq!(p.validate(&records[3]), Err(SkipReason::InvalidEntityCode));

        let projection = p.project(&records);
        assert_eq!(projection.skipped_rows, 3);
        assert_eq!(
            projection.entities,
            vec![EntityMeta {
                code: "XK".to_string(),
                display_name: "Kosovo".to_string()
            }]
        );
        assert_eq!(projection.datasets.len(), 1);
    }

    #[test]
    fn lowercase_code_is_invalid() {
        let p = projector();
        assert_eq!(
            p.validate(&record("Testland", "pt", 2, 1, None)),
            Err(SkipReason::InvalidEntityCode)
        );
    }

    #[test]
    fn entities_sorted_by_name_then_code_with_display_names() {
        let records = vec![
            record("United_Kingdom", "UK", 2, 1, None),
            record("Austria", "AT", 2, 1, None),
            record("United_Kingdom", "UK", 3, 1, None),
        ];
        let projection = projector().project(&records);
        let listed: Vec<(&str, &str)> = projection
            .entities
            .iter()
            .map(|e| (e.code.as_str(), e.display_name.as_str()))
            .collect();
        assert_eq!(listed, vec![("AT", "Austria"), ("UK", "United Kingdom")]);

        let codes: Vec<&str> = projection.datasets.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec!["AT", "UK"]);
    }

    #[test]
    fn columns_keep_stream_order() {
        let records = vec![
            record("Portugal", "PT", 2, 1, None),
            record("Spain", "ES", 2, 5, None),
            record("Portugal", "PT", 3, 2, None),
            record("Portugal", "PT", 4, 3, None),
        ];
        let projection = projector().project(&records);
        let pt = projection.datasets.iter().find(|d| d.code == "PT").unwrap();
        assert_eq!(pt.cases, vec![1, 2, 3]);
        assert_eq!(pt.len(), 3);
        assert!(pt.dates.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(pt.day_n_cases.len(), pt.len());
        assert_eq!(pt.deaths_running_total.len(), pt.len());
    }

    #[test]
    fn population_is_last_known_value() {
        let records = vec![
            record("Portugal", "PT", 2, 1, Some(10)),
            record("Portugal", "PT", 3, 1, Some(11)),
            record("Portugal", "PT", 4, 1, None),
        ];
        let projection = projector().project(&records);
        assert_eq!(projection.datasets[0].population, Some(11));
    }

    #[test]
    fn most_recent_date_is_max_corrected_date() {
        let records = vec![
            record("Portugal", "PT", 9, 1, None),
            record("Spain", "ES", 3, 1, None),
            record("Testland", "X1", 20, 1, None),
        ];
        let projection = projector().project(&records);
        assert_eq!(
            projection.most_recent_date,
            Some(NaiveDate::from_ymd_opt(2020, 3, 8).unwrap())
        );
    }

    #[test]
    fn code_under_two_names_is_projected_once() {
        let records = vec![
            record("Namibia", "NA", 2, 1, None),
            record("Namibia_", "NA", 3, 1, None),
        ];
        let projection = projector().project(&records);
        assert_eq!(
            projection.entities,
            vec![EntityMeta {
                code: "NA".to_string(),
                display_name: "Namibia".to_string()
            }]
        );
        assert_eq!(projection.datasets.len(), 1);
        assert_eq!(projection.datasets[0].len(), 2);
    }

    #[test]
    fn entities_and_datasets_stay_aligned() {
        let records = vec![
            record("Zambia", "ZM", 2, 1, None),
            record("Namibia", "NA", 2, 1, None),
            record("Aruba", "NA", 3, 1, None),
            record("Chile", "CL", 2, 1, None),
        ];
        let projection = projector().project(&records);
        assert_eq!(projection.entities.len(), projection.datasets.len());
        for (meta, dataset) in projection.entities.iter().zip(&projection.datasets) {
            assert_eq!(meta.code, dataset.code);
        }
        assert_eq!(projection.entities[0].display_name, "Aruba");
    }

    #[test]
    fn order_uses_combined_name_and_code() {
        // ' ' sorts below '#', so "A B#BB" comes before "A#AA".
        let records = vec![
            record("A", "AA", 2, 1, None),
            record("A B", "BB", 2, 1, None),
        ];
        let projection = projector().project(&records);
        let codes: Vec<&str> = projection.entities.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["BB", "AA"]);
        let codes: Vec<&str> = projection.datasets.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec!["BB", "AA"]);
    }

    #[test]
    fn empty_stream_projects_nothing() {
        let projection = projector().project(&[]);
        assert_eq!(projection, Projection::default());
    }

    #[test]
    fn projection_is_deterministic() {
        let records: Vec<_> = ["ZW", "AF", "PT", "BR", "AF"]
            .iter()
            .enumerate()
            .map(|(i, code)| record(&format!("Name{code}"), code, i as u32 + 2, 1, None))
            .collect();
        let a = projector().project(&records);
        let b = projector().project(&records);
        assert_eq!(a, b);
    }
}
