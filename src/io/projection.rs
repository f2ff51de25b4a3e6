//! Serialize the projection for the front-end collaborator.
//!
//! Internally the per-entity columns are real sequences; they are joined with
//! `DATASET_DELIMITER` only here. Two renderings share one schema:
//! - JSON (`ProjectionFile`)
//! - an ES module exporting the same values as constants (`data.js`)

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::domain::{EntityProjection, Projection};
use crate::error::PipelineError;
use crate::project::ENTITY_CODE_PATTERN;

/// Separator for multi-valued dataset fields (distinct from the CSV comma).
pub const DATASET_DELIMITER: &str = "#";
/// Chart x-axis date format.
pub const AXIS_DATE_FMT: &str = "%b %d";
/// "Data as of" date format.
pub const MOST_RECENT_DATE_FMT: &str = "%B %d, %Y";

/// Positions of the fields inside each dataset tuple.
pub const IDX_CODE: usize = 0;
pub const IDX_DATES: usize = 1;
pub const IDX_CASES: usize = 2;
pub const IDX_DEATHS: usize = 3;
pub const IDX_CASES_RUNNING: usize = 4;
pub const IDX_DEATHS_RUNNING: usize = 5;
pub const IDX_DAY_N_CASES: usize = 6;
pub const IDX_DAY_N_DEATHS: usize = 7;
pub const IDX_POPULATION: usize = 8;

/// One dataset tuple, fields at the `IDX_*` positions.
pub type DatasetTuple = [String; 9];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityEntry {
    pub code: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldIndexLegend {
    pub code: usize,
    pub dates: usize,
    pub cases: usize,
    pub deaths: usize,
    pub cases_running_total: usize,
    pub deaths_running_total: usize,
    pub day_n_with_cases: usize,
    pub day_n_with_deaths: usize,
    pub population: usize,
}

impl Default for FieldIndexLegend {
    fn default() -> Self {
        Self {
            code: IDX_CODE,
            dates: IDX_DATES,
            cases: IDX_CASES,
            deaths: IDX_DEATHS,
            cases_running_total: IDX_CASES_RUNNING,
            deaths_running_total: IDX_DEATHS_RUNNING,
            day_n_with_cases: IDX_DAY_N_CASES,
            day_n_with_deaths: IDX_DAY_N_DEATHS,
            population: IDX_POPULATION,
        }
    }
}

/// The projection as written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionFile {
    pub entities: Vec<EntityEntry>,
    pub most_recent_date: Option<String>,
    pub field_index_legend: FieldIndexLegend,
    pub delimiter: String,
    pub sanitizer_regex: String,
    pub datasets: Vec<DatasetTuple>,
}

impl From<&Projection> for ProjectionFile {
    fn from(p: &Projection) -> Self {
        ProjectionFile {
            entities: p
                .entities
                .iter()
                .map(|e| EntityEntry {
                    code: e.code.clone(),
                    display_name: e.display_name.clone(),
                })
                .collect(),
            most_recent_date: p
                .most_recent_date
                .map(|d| d.format(MOST_RECENT_DATE_FMT).to_string()),
            field_index_legend: FieldIndexLegend::default(),
            delimiter: DATASET_DELIMITER.to_string(),
            sanitizer_regex: ENTITY_CODE_PATTERN.to_string(),
            datasets: p.datasets.iter().map(dataset_tuple).collect(),
        }
    }
}

fn dataset_tuple(d: &EntityProjection) -> DatasetTuple {
    let dates = d.dates.iter().map(|dt| dt.format(AXIS_DATE_FMT));
    [
        d.code.clone(),
        join(dates),
        join(&d.cases),
        join(&d.deaths),
        join(&d.cases_running_total),
        join(&d.deaths_running_total),
        join(&d.day_n_cases),
        join(&d.day_n_deaths),
        d.population.unwrap_or(0).to_string(),
    ]
}

fn join<I>(values: I) -> String
where
    I: IntoIterator,
    I::Item: Display,
{
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(DATASET_DELIMITER)
}

/// Render the projection as pretty-printed JSON.
pub fn render_projection_json(projection: &Projection) -> Result<Vec<u8>, PipelineError> {
    let mut buf = serde_json::to_vec_pretty(&ProjectionFile::from(projection))?;
    buf.push(b'\n');
    Ok(buf)
}

/// Render the projection as an ES module of constants.
pub fn render_projection_js(projection: &Projection) -> Result<String, PipelineError> {
    let file = ProjectionFile::from(projection);
    let legend = &file.field_index_legend;

    let mut out = String::new();
    out.push_str(&format!("export const sanitizer_regex=/{}/;\n", file.sanitizer_regex));
    out.push_str(&format!(
        "export const dataset_delimiter={};\n",
        serde_json::to_string(&file.delimiter)?
    ));
    let indices = [
        ("geoid", legend.code),
        ("dates", legend.dates),
        ("cases", legend.cases),
        ("deaths", legend.deaths),
        ("casesrunning", legend.cases_running_total),
        ("deathsrunning", legend.deaths_running_total),
        ("dayncases", legend.day_n_with_cases),
        ("dayndeaths", legend.day_n_with_deaths),
        ("population", legend.population),
    ];
    for (name, idx) in indices {
        out.push_str(&format!("export const dataset_{name}_idx={idx};\n"));
    }
    out.push_str(&format!(
        "export const most_recent_data={};\n",
        serde_json::to_string(&file.most_recent_date)?
    ));
    out.push_str(&format!(
        "export const countries={};\n",
        serde_json::to_string(&file.entities)?
    ));
    out.push_str(&format!(
        "export const datasets={};\n",
        serde_json::to_string(&file.datasets)?
    ));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntityMeta;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn sample() -> Projection {
        let d = |day| NaiveDate::from_ymd_opt(2020, 3, day).unwrap();
        Projection {
            entities: vec![EntityMeta {
                code: "PT".to_string(),
                display_name: "Portugal".to_string(),
            }],
            most_recent_date: Some(d(30)),
            datasets: vec![EntityProjection {
                code: "PT".to_string(),
                dates: vec![d(1), d(2), d(3)],
                cases: vec![0, 2, 0],
                deaths: vec![0, 0, 1],
                cases_running_total: vec![0, 2, 2],
                deaths_running_total: vec![0, 0, 1],
                day_n_cases: vec![-1, -1, -1],
                day_n_deaths: vec![-1, -1, -1],
                population: Some(10_281_762),
            }],
            skipped_rows: 0,
        }
    }

    #[test]
    fn dataset_fields_follow_legend_order() {
        let file = ProjectionFile::from(&sample());
        let row = &file.datasets[0];
        assert_eq!(row[IDX_CODE], "PT");
        assert_eq!(row[IDX_DATES], "Mar 01#Mar 02#Mar 03");
        assert_eq!(row[IDX_CASES], "0#2#0");
        assert_eq!(row[IDX_DEATHS], "0#0#1");
        assert_eq!(row[IDX_CASES_RUNNING], "0#2#2");
        assert_eq!(row[IDX_DEATHS_RUNNING], "0#0#1");
        assert_eq!(row[IDX_DAY_N_CASES], "-1#-1#-1");
        assert_eq!(row[IDX_DAY_N_DEATHS], "-1#-1#-1");
        assert_eq!(row[IDX_POPULATION], "10281762");
        assert_eq!(file.most_recent_date.as_deref(), Some("March 30, 2020"));
    }

    #[test]
    fn unknown_population_renders_as_zero() {
        let mut p = sample();
        p.datasets[0].population = None;
        let file = ProjectionFile::from(&p);
        assert_eq!(file.datasets[0][IDX_POPULATION], "0");
    }

    #[test]
    fn json_round_trip_keeps_array_lengths() {
        let p = sample();
        let bytes = render_projection_json(&p).unwrap();
        let file: ProjectionFile = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(file.entities.len(), file.datasets.len());
        for (row, dataset) in file.datasets.iter().zip(&p.datasets) {
            for idx in IDX_DATES..=IDX_DAY_N_DEATHS {
                assert_eq!(row[idx].split(&file.delimiter).count(), dataset.len());
            }
        }
    }

    #[test]
    fn json_uses_camel_case_keys() {
        let value: serde_json::Value =
            serde_json::from_slice(&render_projection_json(&sample()).unwrap()).unwrap();
        assert_eq!(value["entities"][0]["displayName"], "Portugal");
        assert_eq!(value["fieldIndexLegend"]["dayNWithDeaths"], 7);
        assert_eq!(value["sanitizerRegex"], "^[A-Z]{2}$");
    }

    #[test]
    fn js_module_exports_constants() {
        let js = render_projection_js(&sample()).unwrap();
        assert!(js.starts_with("export const sanitizer_regex=/^[A-Z]{2}$/;\n"));
        assert!(js.contains("export const dataset_delimiter=\"#\";\n"));
        assert!(js.contains("export const dataset_population_idx=8;\n"));
        assert!(js.contains("export const most_recent_data=\"March 30, 2020\";\n"));
        assert!(js.contains(r#"export const countries=[{"code":"PT","displayName":"Portugal"}];"#));
        assert!(js.contains(r#"export const datasets=[["PT","Mar 01#Mar 02#Mar 03","#));
    }
}
