//! Batch grading pipeline.
//!
//! This module contains the sequential runner and the wait primitive it
//! shares with the classifier's backoff loop.

mod runner;
mod sleeper;

pub use runner::{BatchRunner, RunnerConfig};
pub use sleeper::{Sleeper, TokioSleeper};

#[cfg(test)]
pub(crate) use sleeper::testing;

#[cfg(test)]
mod tests {
    use super::testing::RecordingSleeper;
    use super::*;
    use crate::analysis::summarize;
    use crate::classifier::testing::{verdict, ScriptedClassifier};
    use crate::classifier::{ClassifyError, InvokerConfig, RateLimitedInvoker};
    use crate::models::FailurePolicy;
    use crate::scanner::{ImageScanner, ScanConfig};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_folder_to_reports() {
        let shots = TempDir::new().unwrap();
        std::fs::write(shots.path().join("alice_1.png"), b"a").unwrap();
        std::fs::write(shots.path().join("bob_1.jpg"), b"b").unwrap();
        std::fs::write(shots.path().join("notes.txt"), b"skip").unwrap();

        let artifacts = ImageScanner::new(shots.path().to_path_buf(), ScanConfig::default())
            .scan()
            .unwrap();

        let rate_limited = || -> Result<crate::models::Verdict, ClassifyError> {
            Err(ClassifyError::RateLimited("429".to_string()))
        };
        let classifier = Arc::new(ScriptedClassifier::new(vec![
            Ok(verdict(9)),
            rate_limited(),
            rate_limited(),
            Ok(verdict(5)),
        ]));
        let sleeper = Arc::new(RecordingSleeper::default());
        let invoker = RateLimitedInvoker::new(
            InvokerConfig {
                base_wait: Duration::from_secs(10),
                ..InvokerConfig::default()
            },
            classifier.clone(),
            sleeper.clone(),
        );
        let runner = BatchRunner::new(
            RunnerConfig {
                pacing_delay: Duration::from_secs(2),
                show_progress: false,
            },
            invoker,
            sleeper.clone(),
        );

        let records = runner.run(&artifacts).await;
        let summaries = summarize(&records, FailurePolicy::Include);

        let out = TempDir::new().unwrap();
        let detailed = out.path().join("detailed.csv");
        let summary = out.path().join("summary.csv");
        crate::report::save_reports(&records, &summaries, &detailed, &summary).unwrap();

        let detailed_text = std::fs::read_to_string(&detailed).unwrap();
        let detailed_lines: Vec<_> = detailed_text.lines().collect();
        assert_eq!(detailed_lines.len(), 3);
        assert!(detailed_lines[1].starts_with("alice,alice_1.png,9,"));
        assert!(detailed_lines[2].starts_with("bob,bob_1.jpg,5,"));

        let summary_text = std::fs::read_to_string(&summary).unwrap();
        let summary_lines: Vec<_> = summary_text.lines().collect();
        assert_eq!(summary_lines.len(), 3);
        assert_eq!(summaries[0].average_score, Some(9.0));
        assert_eq!(summaries[1].average_score, Some(5.0));

        assert_eq!(classifier.calls(), 4);
        // Backoff 10 s + 20 s on bob, plus 2 s pacing after each image.
        assert_eq!(sleeper.total(), Duration::from_secs(34));
    }
}
