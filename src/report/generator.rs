//! CSV report generation.
//!
//! This module writes the detailed per-image table and the per-entity
//! summary table, and renders the summary printed after a run.

use crate::models::{EntitySummary, RunMetadata, RunRecord};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

const DETAILED_HEADER: [&str; 4] = ["entity_id", "filename", "score", "rationale"];
const SUMMARY_HEADER: [&str; 2] = ["entity_id", "average_score"];

/// One row of the summary table.
#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    entity_id: &'a str,
    average_score: Option<f64>,
}

/// Write the detailed table, one row per record in submission order.
pub fn write_detailed_csv<W: Write>(records: &[RunRecord], writer: W) -> Result<()> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    csv.write_record(DETAILED_HEADER)?;
    for record in records {
        csv.serialize(record)?;
    }
    csv.flush()?;

    Ok(())
}

/// Write the summary table, one row per entity.
///
/// An entity without an average (all items failed and failures excluded)
/// gets an empty `average_score` cell.
pub fn write_summary_csv<W: Write>(summaries: &[EntitySummary], writer: W) -> Result<()> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    csv.write_record(SUMMARY_HEADER)?;
    for summary in summaries {
        csv.serialize(SummaryRow {
            entity_id: &summary.entity_id,
            average_score: summary.average_score,
        })?;
    }
    csv.flush()?;

    Ok(())
}

/// Write both report files.
pub fn save_reports(
    records: &[RunRecord],
    summaries: &[EntitySummary],
    detailed_path: &Path,
    summary_path: &Path,
) -> Result<()> {
    let detailed = std::fs::File::create(detailed_path)
        .with_context(|| format!("Failed to create {}", detailed_path.display()))?;
    write_detailed_csv(records, detailed)
        .with_context(|| format!("Failed to write {}", detailed_path.display()))?;

    let summary = std::fs::File::create(summary_path)
        .with_context(|| format!("Failed to create {}", summary_path.display()))?;
    write_summary_csv(summaries, summary)
        .with_context(|| format!("Failed to write {}", summary_path.display()))?;

    Ok(())
}

/// Render the end-of-run summary shown on the console.
pub fn generate_console_summary(metadata: &RunMetadata, summaries: &[EntitySummary]) -> String {
    let mut output = String::new();

    output.push_str("--- Grading Complete ---\n");
    output.push_str(&format!("Folder:   {}\n", metadata.folder));
    output.push_str(&format!("Model:    {}\n", metadata.model_used));
    output.push_str(&format!(
        "Started:  {}\n",
        metadata.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    output.push_str(&format!(
        "Images:   {} graded, {} failed (failures: {})\n",
        metadata.images_graded, metadata.images_failed, metadata.failure_policy
    ));
    output.push_str(&format!("Duration: {:.1}s\n\n", metadata.duration_seconds));

    let width = summaries
        .iter()
        .map(|s| s.entity_id.len())
        .max()
        .unwrap_or(0)
        .max("Entity".len());

    output.push_str(&format!(
        "{:<width$}  {:>7}  {:>5}  {:>6}\n",
        "Entity",
        "Average",
        "Items",
        "Failed",
        width = width
    ));

    for summary in summaries {
        let average = summary
            .average_score
            .map(|avg| format!("{:.2}", avg))
            .unwrap_or_else(|| "-".to_string());

        output.push_str(&format!(
            "{:<width$}  {:>7}  {:>5}  {:>6}\n",
            summary.entity_id,
            average,
            summary.submissions,
            summary.failures,
            width = width
        ));
    }

    output
}
