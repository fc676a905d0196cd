//! Sequential batch loop over the discovered artifacts.

use super::Sleeper;
use crate::classifier::RateLimitedInvoker;
use crate::models::{Artifact, RunRecord};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Options for the batch loop.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Pause after every classifier call, successful or not.
    pub pacing_delay: Duration,
    /// Whether to draw a progress bar.
    pub show_progress: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            pacing_delay: Duration::from_secs(2),
            show_progress: true,
        }
    }
}

/// Grades artifacts one at a time, in the order given.
pub struct BatchRunner {
    config: RunnerConfig,
    invoker: RateLimitedInvoker,
    sleeper: Arc<dyn Sleeper>,
}

impl BatchRunner {
    pub fn new(config: RunnerConfig, invoker: RateLimitedInvoker, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            config,
            invoker,
            sleeper,
        }
    }

    /// Classify every artifact and return one record per artifact, in input order.
    ///
    /// Failed classifications are recorded with the sentinel score; they never
    /// stop the batch.
    pub async fn run(&self, artifacts: &[Artifact]) -> Vec<RunRecord> {
        if artifacts.is_empty() {
            debug!("No artifacts to grade");
            return Vec::new();
        }

        info!("Grading {} images", artifacts.len());
        let pb = self.progress_bar(artifacts.len());
        let mut records = Vec::with_capacity(artifacts.len());

        for (i, artifact) in artifacts.iter().enumerate() {
            pb.set_message(artifact.file_name.clone());

            let outcome = self.invoker.classify(artifact).await;

            if outcome.succeeded {
                pb.println(format!(
                    "[{}/{}] {} -> Score: {}",
                    i + 1,
                    artifacts.len(),
                    artifact.file_name,
                    outcome.score
                ));
                if let Some(ref name) = outcome.detected_name {
                    debug!("{}: detected name {}", artifact.file_name, name);
                }
            } else {
                warn!("{} failed: {}", artifact.file_name, outcome.rationale);
                pb.println(format!(
                    "[{}/{}] {} -> Failed",
                    i + 1,
                    artifacts.len(),
                    artifact.file_name
                ));
            }

            records.push(RunRecord::new(artifact, outcome));
            pb.inc(1);

            self.sleeper.sleep(self.config.pacing_delay).await;
        }

        pb.finish_with_message("Grading complete");
        records
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    }
}
