//! Per-entity time-series enrichment.
//!
//! For each entity: parse dates, sort ascending, resolve both anchors, then
//! a single ascending pass computes running totals and day-N indices.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::domain::{
    CaseRecord, DATE_REP_FMT, EnrichedRecord, Metric, PipelineConfig, correct_report_date,
};
use crate::enrich::anchor::{Anchor, resolve_anchor};
use crate::error::PipelineError;

/// A raw record paired with its parsed report date.
#[derive(Debug, Clone, Copy)]
pub struct DatedRecord<'a> {
    pub date: NaiveDate,
    pub record: &'a CaseRecord,
}

/// Enrichment output for a single entity.
#[derive(Debug, Clone)]
pub struct EnrichedEntity {
    pub code: String,
    pub cases_anchor: Anchor,
    pub deaths_anchor: Anchor,
    /// Ascending by report date; same length as the input.
    pub records: Vec<EnrichedRecord>,
}

/// Enrich every entity and concatenate the results in entity-code order.
///
/// Entities are processed in parallel. The output order is fixed by the map's
/// key order, and if several entities fail the first one in that order wins.
pub fn enrich_all(
    by_entity: &BTreeMap<String, Vec<CaseRecord>>,
    config: &PipelineConfig,
) -> Result<Vec<EnrichedRecord>, PipelineError> {
    let entities: Vec<(&String, &Vec<CaseRecord>)> = by_entity.iter().collect();

    let results: Vec<Result<EnrichedEntity, PipelineError>> = entities
        .par_iter()
        .map(|(code, records)| enrich_entity(code, records, config))
        .collect();

    let mut out = Vec::with_capacity(by_entity.values().map(Vec::len).sum());
    let mut anchored_cases = 0usize;
    let mut anchored_deaths = 0usize;
    for result in results {
        let entity = result?;
        anchored_cases += usize::from(entity.cases_anchor != Anchor::NotFound);
        anchored_deaths += usize::from(entity.deaths_anchor != Anchor::NotFound);
        out.extend(entity.records);
    }

    info!(
        entities = by_entity.len(),
        records = out.len(),
        anchored_cases,
        anchored_deaths,
        "enrichment finished"
    );
    Ok(out)
}

/// Enrich one entity's records (given in any order).
pub fn enrich_entity(
    code: &str,
    records: &[CaseRecord],
    config: &PipelineConfig,
) -> Result<EnrichedEntity, PipelineError> {
    let series = sort_chronologically(code, records)?;

    let cases_anchor = resolve_anchor(&series, Metric::Cases, config.threshold(Metric::Cases));
    let deaths_anchor = resolve_anchor(&series, Metric::Deaths, config.threshold(Metric::Deaths));
    debug!(entity = code, ?cases_anchor, ?deaths_anchor, "anchors resolved");

    let mut cases_running_total = 0u64;
    let mut deaths_running_total = 0u64;
    let mut out = Vec::with_capacity(series.len());

    for DatedRecord { date, record } in series {
        cases_running_total = cases_running_total.saturating_add(record.cases);
        deaths_running_total = deaths_running_total.saturating_add(record.deaths);

        out.push(EnrichedRecord {
            report_date: date,
            corrected_date: correct_report_date(date),
            cases: record.cases,
            deaths: record.deaths,
            entity_name: sanitize_name(&record.entity_name),
            entity_code: record.entity_code.clone(),
            country_code: record.country_code.clone(),
            population: record.population,
            day_n_cases: cases_anchor.day_n(date),
            day_n_deaths: deaths_anchor.day_n(date),
            cases_running_total,
            deaths_running_total,
        });
    }

    Ok(EnrichedEntity {
        code: code.to_string(),
        cases_anchor,
        deaths_anchor,
        records: out,
    })
}

/// Parse every report date and sort ascending (stable).
///
/// A single unparsable date fails the whole entity.
fn sort_chronologically<'a>(
    code: &str,
    records: &'a [CaseRecord],
) -> Result<Vec<DatedRecord<'a>>, PipelineError> {
    let mut series = records
        .iter()
        .map(|record| {
            NaiveDate::parse_from_str(&record.date_rep, DATE_REP_FMT)
                .map(|date| DatedRecord { date, record })
                .map_err(|_| PipelineError::DateParse {
                    entity: code.to_string(),
                    line: record.line,
                    value: record.date_rep.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    series.sort_by_key(|item| item.date);

    let duplicates = series.windows(2).filter(|w| w[0].date == w[1].date).count();
    if duplicates > 0 {
        warn!(entity = code, duplicates, "duplicate report dates; keeping input order");
    }

    Ok(series)
}

/// Commas are the output row delimiter and must not appear in free text.
fn sanitize_name(name: &str) -> String {
    name.replace(',', "")
}
