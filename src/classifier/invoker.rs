//! Bounded retry with linear backoff around a single classifier call.

use super::{ClassifyError, ClassifyRequest, Classifier};
use crate::models::{Artifact, ClassificationOutcome};
use crate::pipeline::Sleeper;
use crate::scanner::mime_type_for;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Rationale recorded when every attempt was rate limited.
pub const EXHAUSTED_RATIONALE: &str = "exhausted retries due to rate limiting";

/// Immutable settings for the invoker.
#[derive(Debug, Clone)]
pub struct InvokerConfig {
    pub model: String,
    pub rubric: String,
    pub max_attempts: u32,
    pub base_wait: Duration,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            model: "gemini-flash-latest".to_string(),
            rubric: super::DEFAULT_RUBRIC.to_string(),
            max_attempts: 3,
            base_wait: Duration::from_secs(10),
        }
    }
}

impl InvokerConfig {
    /// Wait after the given rate-limited attempt (1-based): `base_wait * attempt`,
    /// saturating at `Duration::MAX`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.base_wait.saturating_mul(attempt)
    }
}

/// Classifies one artifact, retrying only on rate-limit signals.
pub struct RateLimitedInvoker {
    config: InvokerConfig,
    classifier: Arc<dyn Classifier>,
    sleeper: Arc<dyn Sleeper>,
}

impl RateLimitedInvoker {
    pub fn new(
        config: InvokerConfig,
        classifier: Arc<dyn Classifier>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            config,
            classifier,
            sleeper,
        }
    }

    /// Classify an artifact. Never fails: every error becomes a failed outcome.
    pub async fn classify(&self, artifact: &Artifact) -> ClassificationOutcome {
        let image = match tokio::fs::read(&artifact.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return ClassificationOutcome::failed(format!(
                    "Local error: cannot read {}: {}",
                    artifact.file_name, e
                ))
            }
        };

        let request = ClassifyRequest {
            model: &self.config.model,
            rubric: &self.config.rubric,
            image: &image,
            mime_type: mime_type_for(&artifact.path),
        };

        for attempt in 1..=self.config.max_attempts {
            debug!(
                "Classifying {} (attempt {}/{})",
                artifact.file_name, attempt, self.config.max_attempts
            );

            match self.classifier.classify(request.clone()).await {
                Ok(verdict) => return ClassificationOutcome::success(verdict),
                Err(ClassifyError::RateLimited(message)) => {
                    let wait = self.config.backoff_for(attempt);
                    warn!(
                        "Rate limit hit on {} ({}). Waiting {}s before retrying...",
                        artifact.file_name,
                        message,
                        wait.as_secs_f64()
                    );
                    self.sleeper.sleep(wait).await;
                }
                Err(e) => return ClassificationOutcome::failed(e.to_string()),
            }
        }

        ClassificationOutcome::failed(EXHAUSTED_RATIONALE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::testing::{verdict, ScriptedClassifier};
    use crate::pipeline::testing::RecordingSleeper;
    use tempfile::TempDir;

    struct Harness {
        _dir: TempDir,
        artifact: Artifact,
        classifier: Arc<ScriptedClassifier>,
        sleeper: Arc<RecordingSleeper>,
        invoker: RateLimitedInvoker,
    }

    fn harness(script: Vec<Result<crate::models::Verdict, ClassifyError>>) -> Harness {
        harness_with_base_wait(Duration::from_secs(10), script)
    }

    fn harness_with_base_wait(
        base_wait: Duration,
        script: Vec<Result<crate::models::Verdict, ClassifyError>>,
    ) -> Harness {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("alice_1.png");
        std::fs::write(&path, b"\x89PNG").unwrap();

        let classifier = Arc::new(ScriptedClassifier::new(script));
        let sleeper = Arc::new(RecordingSleeper::default());
        let config = InvokerConfig {
            base_wait,
            ..InvokerConfig::default()
        };
        let invoker = RateLimitedInvoker::new(config, classifier.clone(), sleeper.clone());

        Harness {
            _dir: dir,
            artifact: Artifact {
                path,
                file_name: "alice_1.png".to_string(),
                entity_id: "alice".to_string(),
            },
            classifier,
            sleeper,
            invoker,
        }
    }

    fn rate_limited() -> Result<crate::models::Verdict, ClassifyError> {
        Err(ClassifyError::RateLimited("429".to_string()))
    }

    #[test]
    fn test_backoff_is_linear() {
        let config = InvokerConfig::default();
        assert_eq!(config.backoff_for(1), Duration::from_secs(10));
        assert_eq!(config.backoff_for(2), Duration::from_secs(20));
        assert_eq!(config.backoff_for(3), Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_saturates() {
        let config = InvokerConfig {
            base_wait: Duration::from_secs(u64::MAX / 2 + 1),
            ..InvokerConfig::default()
        };
        assert_eq!(config.backoff_for(2), Duration::MAX);
    }

    #[tokio::test]
    async fn test_huge_base_wait_does_not_panic() {
        let h = harness_with_base_wait(
            Duration::from_secs(u64::MAX / 2 + 1),
            vec![rate_limited(), rate_limited(), Ok(verdict(7))],
        );
        let outcome = h.invoker.classify(&h.artifact).await;

        assert!(outcome.succeeded);
        assert_eq!(outcome.score, 7);
        assert_eq!(h.sleeper.waits()[1], Duration::MAX);
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let h = harness(vec![Ok(verdict(8))]);
        let outcome = h.invoker.classify(&h.artifact).await;

        assert!(outcome.succeeded);
        assert_eq!(outcome.score, 8);
        assert_eq!(h.classifier.calls(), 1);
        assert!(h.sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limited_twice_then_success() {
        let h = harness(vec![rate_limited(), rate_limited(), Ok(verdict(5))]);
        let outcome = h.invoker.classify(&h.artifact).await;

        assert!(outcome.succeeded);
        assert_eq!(outcome.score, 5);
        assert_eq!(h.classifier.calls(), 3);

        let waits = h.sleeper.waits();
        assert_eq!(waits.len(), 2);
        assert!(waits[1] > waits[0]);
        assert_eq!(waits, vec![Duration::from_secs(10), Duration::from_secs(20)]);
    }

    #[tokio::test]
    async fn test_rate_limited_every_attempt() {
        let h = harness(vec![rate_limited(), rate_limited(), rate_limited()]);
        let outcome = h.invoker.classify(&h.artifact).await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.rationale, EXHAUSTED_RATIONALE);
        assert_eq!(h.classifier.calls(), 3);
        assert_eq!(
            h.sleeper.waits(),
            vec![
                Duration::from_secs(10),
                Duration::from_secs(20),
                Duration::from_secs(30)
            ]
        );
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let h = harness(vec![
            Err(ClassifyError::Client {
                status: 400,
                message: "Bad Request".to_string(),
            }),
            Ok(verdict(9)),
        ]);
        let outcome = h.invoker.classify(&h.artifact).await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.rationale, "API error 400: Bad Request");
        assert_eq!(h.classifier.calls(), 1);
        assert!(h.sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn test_parse_error_not_retried() {
        let h = harness(vec![
            Err(ClassifyError::Parse("verdict is not valid JSON".to_string())),
            Ok(verdict(9)),
        ]);
        let outcome = h.invoker.classify(&h.artifact).await;

        assert!(!outcome.succeeded);
        assert!(outcome.rationale.starts_with("Parse error"));
        assert_eq!(h.classifier.calls(), 1);
        assert!(h.sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_not_retried() {
        let h = harness(vec![
            Err(ClassifyError::Transport("Request timed out after 120s".to_string())),
            Ok(verdict(9)),
        ]);
        let outcome = h.invoker.classify(&h.artifact).await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.score, 0);
        assert!(outcome.rationale.starts_with("Transport error"));
        assert_eq!(h.classifier.calls(), 1);
        assert!(h.sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_image_skips_remote_call() {
        let mut h = harness(vec![Ok(verdict(9))]);
        h.artifact.path = h.artifact.path.with_file_name("missing.png");

        let outcome = h.invoker.classify(&h.artifact).await;

        assert!(!outcome.succeeded);
        assert!(outcome.rationale.starts_with("Local error"));
        assert_eq!(h.classifier.calls(), 0);
    }
}
