//! Terminal summaries.
//!
//! Formatting lives here so the pipeline stays free of presentation concerns.

use std::path::PathBuf;

use crate::app::pipeline::RunOutput;
use crate::io::MOST_RECENT_DATE_FMT;

/// Format the end-of-run summary printed by `covid run`.
pub fn format_run_summary(run: &RunOutput, written: &[PathBuf]) -> String {
    let mut out = String::new();

    out.push_str("=== covid - enrichment run ===\n");
    out.push_str(&format!(
        "Input: rows={} | entities={}\n",
        run.rows_read, run.entities
    ));
    out.push_str(&format!(
        "Projection: entities={} | skipped rows={}\n",
        run.projection.datasets.len(),
        run.projection.skipped_rows
    ));
    match run.projection.most_recent_date {
        Some(date) => out.push_str(&format!("Data as of: {}\n", date.format(MOST_RECENT_DATE_FMT))),
        None => out.push_str("Data as of: n/a\n"),
    }
    out.push_str(&format!("Index documents: {}\n", run.documents.len()));

    if !written.is_empty() {
        out.push_str("\nArtifacts:\n");
        for path in written {
            out.push_str(&format!("- {}\n", path.display()));
        }
    }

    out
}
