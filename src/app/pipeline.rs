//! Shared pipeline logic used by the individual subcommands and by `run`.
//!
//! raw CSV -> grouped records -> enriched stream -> (projection, index documents)
//!
//! Everything is computed in memory first; artifacts are only written once the
//! whole run succeeded, each through an atomic rename.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::domain::{EnrichedRecord, PipelineConfig, Projection, ProjectionFormat};
use crate::enrich::enrich_all;
use crate::error::{AppError, PipelineError};
use crate::index::{IndexDocument, build_documents, mapping_json, render_bulk_body};
use crate::io::{
    load_case_records, render_enriched_csv, render_projection_js, render_projection_json,
    require_report_date, write_all_atomic,
};
use crate::project::DatasetProjector;

pub const ENRICHED_FILE: &str = "data_final.csv";
pub const BULK_FILE: &str = "bulk.ndjson";
pub const MAPPING_FILE: &str = "mapping.json";

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub rows_read: usize,
    pub entities: usize,
    pub records: Vec<EnrichedRecord>,
    pub projection: Projection,
    pub documents: Vec<IndexDocument>,
}

/// Serialized artifacts, ready to publish.
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub enriched_csv: Vec<u8>,
    pub projection: Vec<u8>,
    pub projection_format: ProjectionFormat,
    pub bulk_body: Vec<u8>,
    pub mapping: Vec<u8>,
}

/// Load and enrich a raw CSV.
pub fn enrich_reader<R: Read>(
    reader: R,
    config: &PipelineConfig,
) -> Result<(usize, usize, Vec<EnrichedRecord>), AppError> {
    let loaded = load_case_records(reader)?;
    if loaded.rows_read == 0 {
        return Err(AppError::new(3, "Input CSV has a valid header but no rows."));
    }
    if let Some(date) = config.report_date {
        require_report_date(&loaded, date)?;
    }
    let records = enrich_all(&loaded.by_entity, config)?;
    Ok((loaded.rows_read, loaded.entity_count(), records))
}

/// Execute the full pipeline on a raw CSV and return the computed outputs.
pub fn run_pipeline<R: Read>(reader: R, config: &PipelineConfig) -> Result<RunOutput, AppError> {
    let (rows_read, entities, records) = enrich_reader(reader, config)?;

    let projection = DatasetProjector::new()?.project(&records);
    let documents = build_documents(&records);

    Ok(RunOutput {
        rows_read,
        entities,
        records,
        projection,
        documents,
    })
}

pub fn render_projection(projection: &Projection, format: ProjectionFormat) -> Result<Vec<u8>, PipelineError> {
    match format {
        ProjectionFormat::Json => render_projection_json(projection),
        ProjectionFormat::Js => render_projection_js(projection).map(String::into_bytes),
    }
}

pub fn render_mapping() -> Result<Vec<u8>, PipelineError> {
    let mut buf = serde_json::to_vec_pretty(&mapping_json())?;
    buf.push(b'\n');
    Ok(buf)
}

/// Serialize every artifact of a run. Nothing touches the disk here.
pub fn render_artifacts(
    output: &RunOutput,
    format: ProjectionFormat,
    config: &PipelineConfig,
) -> Result<Artifacts, PipelineError> {
    Ok(Artifacts {
        enriched_csv: render_enriched_csv(&output.records)?,
        projection: render_projection(&output.projection, format)?,
        projection_format: format,
        bulk_body: render_bulk_body(&config.index_name, &output.documents)?.into_bytes(),
        mapping: render_mapping()?,
    })
}

/// Write the artifacts into `dir` and return the written paths.
///
/// Either every artifact is published or none is.
pub fn publish(dir: &Path, artifacts: &Artifacts) -> Result<Vec<PathBuf>, PipelineError> {
    fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;

    let files: Vec<(PathBuf, &[u8])> = vec![
        (dir.join(ENRICHED_FILE), artifacts.enriched_csv.as_slice()),
        (dir.join(artifacts.projection_format.file_name()), artifacts.projection.as_slice()),
        (dir.join(BULK_FILE), artifacts.bulk_body.as_slice()),
        (dir.join(MAPPING_FILE), artifacts.mapping.as_slice()),
    ];
    write_all_atomic(&files)?;

    for (path, contents) in &files {
        info!(path = %path.display(), bytes = contents.len(), "artifact written");
    }
    Ok(files.into_iter().map(|(path, _)| path).collect())
}
