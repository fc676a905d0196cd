//! Gemini `generateContent` client.
//!
//! Sends the rubric and one inline image per request and turns every
//! failure into a [`ClassifyError`] variant right here, so callers never
//! inspect status codes or error strings themselves.

use super::{ClassifyError, ClassifyRequest, Classifier};
use crate::models::{Verdict, MAX_SCORE, UNKNOWN_NAME};
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Connection settings for the Gemini API.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_url: String,
    pub api_key: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: String::new(),
            temperature: 0.0,
            timeout_seconds: 120,
        }
    }
}

/// Gemini API request body.
#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Image { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
}

/// Gemini API response body.
#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Gemini error envelope (`{"error": {...}}`).
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Classifier backed by the Gemini REST API.
pub struct GeminiClassifier {
    config: GeminiConfig,
    http_client: reqwest::Client,
}

impl GeminiClassifier {
    /// Create a new client with the configured request timeout.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_url.trim_end_matches('/'),
            model
        )
    }
}

#[async_trait]
impl Classifier for GeminiClassifier {
    async fn classify(&self, request: ClassifyRequest<'_>) -> Result<Verdict, ClassifyError> {
        let url = self.endpoint(request.model);

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text {
                        text: request.rubric,
                    },
                    Part::Image {
                        inline_data: InlineData {
                            mime_type: request.mime_type,
                            data: BASE64.encode(request.image),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                response_mime_type: "application/json",
            },
        };

        debug!("POST {} ({} image bytes)", url, request.image.len());

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifyError::Transport(format!(
                        "Request timed out after {}s",
                        self.config.timeout_seconds
                    ))
                } else if e.is_connect() {
                    ClassifyError::Transport(format!(
                        "Cannot connect to {}",
                        self.config.api_url
                    ))
                } else {
                    ClassifyError::Transport(format!("Failed to send request: {}", e))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ClassifyError::Transport(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(classify_failure(status, &text));
        }

        let payload: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| ClassifyError::Parse(format!("invalid response body: {}", e)))?;

        parse_verdict(&candidate_text(payload)?)
    }
}

/// Map a non-success HTTP response onto the error taxonomy.
fn classify_failure(status: StatusCode, body: &str) -> ClassifyError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();

    let exhausted = envelope
        .as_ref()
        .is_some_and(|env| env.error.status == "RESOURCE_EXHAUSTED");

    let message = match envelope {
        Some(env) if !env.error.message.is_empty() => env.error.message,
        _ => body.trim().to_string(),
    };

    if status == StatusCode::TOO_MANY_REQUESTS || exhausted {
        ClassifyError::RateLimited(message)
    } else {
        ClassifyError::Client {
            status: status.as_u16(),
            message,
        }
    }
}

/// Pull the text of the first candidate's first text part.
fn candidate_text(response: GenerateContentResponse) -> Result<String, ClassifyError> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
        .ok_or_else(|| ClassifyError::Parse("response contained no text candidate".to_string()))
}

/// Parse the model's JSON verdict, rejecting anything outside the rubric.
fn parse_verdict(text: &str) -> Result<Verdict, ClassifyError> {
    let verdict: Verdict = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| ClassifyError::Parse(format!("invalid verdict: {}", e)))?;

    if verdict.score > MAX_SCORE {
        return Err(ClassifyError::Parse(format!(
            "score {} outside 0-{}",
            verdict.score, MAX_SCORE
        )));
    }

    Ok(verdict)
}

/// Remove a surrounding markdown fence such as ```json ... ```, on one
/// line or several.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let body = rest.strip_suffix("```").unwrap_or(rest).trim();

    // Skip a language tag such as `json` in front of the payload.
    match body.find('{') {
        Some(start) => &body[start..],
        None => body,
    }
}
