//! Data models for the grading pipeline.
//!
//! This module contains the core data structures passed between the
//! scanner, the classifier, the batch runner and the report writer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Score recorded for an artifact whose classification failed.
pub const FAILURE_SCORE: u8 = 0;

/// Highest score the rubric allows.
pub const MAX_SCORE: u8 = 10;

/// Name recorded when the model finds no identity in the image.
pub const UNKNOWN_NAME: &str = "Unknown_User";

/// An image submitted for grading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Full path to the image on disk.
    pub path: PathBuf,
    /// File name as listed in the folder (with extension).
    pub file_name: String,
    /// Submitter identifier derived from the file name.
    pub entity_id: String,
}

/// Parsed payload returned by the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Verdict {
    /// Name the model found in the image, or `Unknown_User`.
    #[serde(default = "unknown_name")]
    pub detected_name: String,
    /// Rubric score, 0 to 10 inclusive.
    pub score: u8,
    /// Model's explanation of the score.
    pub reasoning: String,
}

fn unknown_name() -> String {
    UNKNOWN_NAME.to_string()
}

/// Result of attempting to classify one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationOutcome {
    pub score: u8,
    pub rationale: String,
    pub succeeded: bool,
    /// Present only when the classifier returned a verdict.
    pub detected_name: Option<String>,
}

impl ClassificationOutcome {
    /// Creates a successful outcome from a classifier verdict.
    pub fn success(verdict: Verdict) -> Self {
        Self {
            score: verdict.score,
            rationale: verdict.reasoning,
            succeeded: true,
            detected_name: Some(verdict.detected_name),
        }
    }

    /// Creates a failed outcome carrying the sentinel score.
    pub fn failed(rationale: impl Into<String>) -> Self {
        Self {
            score: FAILURE_SCORE,
            rationale: rationale.into(),
            succeeded: false,
            detected_name: None,
        }
    }
}

/// One row of the detailed report, in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRecord {
    pub entity_id: String,
    #[serde(rename = "filename")]
    pub file_name: String,
    pub score: u8,
    pub rationale: String,
    /// Not a report column; consumed by the failure policy.
    #[serde(skip)]
    pub succeeded: bool,
}

impl RunRecord {
    /// Builds the record for an artifact from its classification outcome.
    pub fn new(artifact: &Artifact, outcome: ClassificationOutcome) -> Self {
        Self {
            entity_id: artifact.entity_id.clone(),
            file_name: artifact.file_name.clone(),
            score: outcome.score,
            rationale: outcome.rationale,
            succeeded: outcome.succeeded,
        }
    }
}

/// Per-submitter average derived from the run records.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySummary {
    pub entity_id: String,
    /// `None` when the failure policy left no scores to average.
    pub average_score: Option<f64>,
    /// Number of records for this entity.
    pub submissions: usize,
    /// Number of those records whose classification failed.
    pub failures: usize,
}

/// How failed classifications contribute to an entity's average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Failed items count as a score of 0.
    #[default]
    Include,
    /// Failed items are left out of the mean.
    Exclude,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Include => write!(f, "include"),
            FailurePolicy::Exclude => write!(f, "exclude"),
        }
    }
}

/// Metadata about a grading run, shown in the console summary.
#[derive(Debug, Clone)]
pub struct RunMetadata {
    /// Folder the images were read from.
    pub folder: String,
    /// Model identifier sent to the classifier.
    pub model_used: String,
    /// When the batch started.
    pub started_at: DateTime<Utc>,
    /// Number of images graded.
    pub images_graded: usize,
    /// Number of images whose classification failed.
    pub images_failed: usize,
    /// How failures were treated in the averages.
    pub failure_policy: FailurePolicy,
    /// Wall-clock duration of the batch in seconds.
    pub duration_seconds: f64,
}
