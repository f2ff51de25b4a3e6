//! Search-index documents for the enriched stream.
//!
//! The indexing collaborator owns the index lifecycle; this module only
//! guarantees that document field names and value formats match
//! `FIELD_MAPPING`, and renders the bulk request body.

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::domain::EnrichedRecord;
use crate::error::PipelineError;
use crate::io::export::EnrichedRow;

/// Sortable `dateRep` form, matching the index's `basic_date` format.
pub const INDEX_DATE_FMT: &str = "%Y%m%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// `basic_date` (`YYYYMMDD`).
    Date,
    Keyword,
    Integer,
}

/// Index mapping agreed with the indexing collaborator, in document order.
pub const FIELD_MAPPING: [(&str, FieldType); 14] = [
    ("dateRep", FieldType::Date),
    ("day", FieldType::Keyword),
    ("month", FieldType::Keyword),
    ("year", FieldType::Keyword),
    ("cases", FieldType::Integer),
    ("deaths", FieldType::Integer),
    ("countriesAndTerritories", FieldType::Keyword),
    ("geoId", FieldType::Keyword),
    ("countryterritoryCode", FieldType::Keyword),
    ("popData2018", FieldType::Integer),
    ("dayNwithCases", FieldType::Integer),
    ("dayNwithDeaths", FieldType::Integer),
    ("casesRunningTotal", FieldType::Integer),
    ("deathsRunningTotal", FieldType::Integer),
];

/// A normalized index document. Every value is a string; the index mapping
/// does the typing. An unknown population is left out rather than sent empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDocument {
    #[serde(rename = "dateRep")]
    pub date_rep: String,
    pub day: String,
    pub month: String,
    pub year: String,
    pub cases: String,
    pub deaths: String,
    #[serde(rename = "countriesAndTerritories")]
    pub countries_and_territories: String,
    #[serde(rename = "geoId")]
    pub geo_id: String,
    #[serde(rename = "countryterritoryCode")]
    pub country_territory_code: String,
    #[serde(rename = "popData2018", skip_serializing_if = "Option::is_none")]
    pub pop_data_2018: Option<String>,
    #[serde(rename = "dayNwithCases")]
    pub day_n_with_cases: String,
    #[serde(rename = "dayNwithDeaths")]
    pub day_n_with_deaths: String,
    #[serde(rename = "casesRunningTotal")]
    pub cases_running_total: String,
    #[serde(rename = "deathsRunningTotal")]
    pub deaths_running_total: String,
}

impl From<&EnrichedRecord> for IndexDocument {
    fn from(record: &EnrichedRecord) -> Self {
        let row = EnrichedRow::from(record);
        IndexDocument {
            date_rep: record.corrected_date.format(INDEX_DATE_FMT).to_string(),
            day: zero_pad(&row.day),
            month: zero_pad(&row.month),
            year: row.year,
            cases: row.cases.to_string(),
            deaths: row.deaths.to_string(),
            countries_and_territories: row.countries_and_territories,
            geo_id: row.geo_id,
            country_territory_code: row.country_territory_code,
            pop_data_2018: row.pop_data_2018.map(|p| p.to_string()),
            day_n_with_cases: row.day_n_with_cases.to_string(),
            day_n_with_deaths: row.day_n_with_deaths.to_string(),
            cases_running_total: row.cases_running_total.to_string(),
            deaths_running_total: row.deaths_running_total.to_string(),
        }
    }
}

fn zero_pad(value: &str) -> String {
    format!("{value:0>2}")
}

/// Build one document per record, in stream order.
pub fn build_documents(records: &[EnrichedRecord]) -> Vec<IndexDocument> {
    records.iter().map(IndexDocument::from).collect()
}

/// The `{"properties": {...}}` body for the index mapping call.
pub fn mapping_json() -> Value {
    let properties: Map<String, Value> = FIELD_MAPPING
        .iter()
        .map(|(field, ty)| {
            let spec = match ty {
                FieldType::Date => json!({"type": "date", "format": "basic_date"}),
                FieldType::Keyword => json!({"type": "keyword"}),
                FieldType::Integer => json!({"type": "integer"}),
            };
            (field.to_string(), spec)
        })
        .collect();
    json!({ "properties": properties })
}

#[derive(Serialize)]
struct BulkAction<'a> {
    index: BulkTarget<'a>,
}

#[derive(Serialize)]
struct BulkTarget<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_id")]
    id: String,
}

/// Render the NDJSON bulk body: an action line then the document, per record.
///
/// Document ids are a 1-based counter over the whole stream.
pub fn render_bulk_body(index_name: &str, documents: &[IndexDocument]) -> Result<String, PipelineError> {
    let mut out = String::new();
    for (i, doc) in documents.iter().enumerate() {
        let action = BulkAction {
            index: BulkTarget {
                index: index_name,
                id: (i + 1).to_string(),
            },
        };
        out.push_str(&serde_json::to_string(&action)?);
        out.push('\n');
        out.push_str(&serde_json::to_string(doc)?);
        out.push('\n');
    }
    Ok(out)
}
