//! Vision classifier client and the retrying invoker around it.

mod gemini;
mod invoker;
mod rubric;

pub use gemini::{GeminiClassifier, GeminiConfig};
pub use invoker::{InvokerConfig, RateLimitedInvoker, EXHAUSTED_RATIONALE};
pub use rubric::{load_rubric, DEFAULT_RUBRIC};

use crate::models::Verdict;
use async_trait::async_trait;
use thiserror::Error;

/// A single classification request: rubric text plus one image.
#[derive(Debug, Clone)]
pub struct ClassifyRequest<'a> {
    pub model: &'a str,
    pub rubric: &'a str,
    pub image: &'a [u8],
    pub mime_type: &'a str,
}

/// Failure classes produced at the classifier boundary.
///
/// Only `RateLimited` is retried; every other variant fails the item at once.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error {status}: {message}")]
    Client { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// A remote service that grades one image against a rubric.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, request: ClassifyRequest<'_>) -> Result<Verdict, ClassifyError>;
}
