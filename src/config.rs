//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.screengrade.toml` files.

use crate::models::FailurePolicy;
use crate::scanner::SetupError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".screengrade.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Retry and pacing settings.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Scanner settings.
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Folder containing the screenshots.
    #[serde(default = "default_folder")]
    pub folder: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            folder: default_folder(),
        }
    }
}

fn default_folder() -> PathBuf {
    PathBuf::from("./ambassador_screenshots")
}

/// Vision model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier.
    #[serde(default = "default_model")]
    pub name: String,

    /// Gemini API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API key. Usually supplied through `GEMINI_API_KEY` instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Temperature for generation. 0.0 keeps grading deterministic.
    #[serde(default)]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// File with a custom rubric, replacing the built-in one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric_file: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            api_url: default_api_url(),
            api_key: None,
            temperature: 0.0,
            timeout_seconds: default_timeout(),
            rubric_file: None,
        }
    }
}

fn default_model() -> String {
    "gemini-flash-latest".to_string()
}

fn default_api_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_timeout() -> u64 {
    120
}

/// Retry, backoff and pacing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per image before giving up on rate limits.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff unit; attempt N waits N times this.
    #[serde(default = "default_base_wait")]
    pub base_wait_seconds: u64,

    /// Pause between images.
    #[serde(default = "default_pacing")]
    pub pacing_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_wait_seconds: default_base_wait(),
            pacing_seconds: default_pacing(),
        }
    }
}

impl RetryConfig {
    pub fn base_wait(&self) -> Duration {
        Duration::from_secs(self.base_wait_seconds)
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_secs(self.pacing_seconds)
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_wait() -> u64 {
    10
}

fn default_pacing() -> u64 {
    2
}

/// Image scanner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Image extensions to include.
    #[serde(default = "crate::scanner::default_image_extensions")]
    pub extensions: Vec<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            extensions: crate::scanner::default_image_extensions(),
        }
    }
}

/// Report output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Per-image CSV path.
    #[serde(default = "default_detailed_output")]
    pub detailed_output: PathBuf,

    /// Per-entity CSV path.
    #[serde(default = "default_summary_output")]
    pub summary_output: PathBuf,

    /// Whether failed images count as 0 or are left out of averages.
    #[serde(default)]
    pub failed_scores: FailurePolicy,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            detailed_output: default_detailed_output(),
            summary_output: default_summary_output(),
            failed_scores: FailurePolicy::default(),
        }
    }
}

fn default_detailed_output() -> PathBuf {
    PathBuf::from("ai_graded_submissions_detailed.csv")
}

fn default_summary_output() -> PathBuf {
    PathBuf::from("ambassador_final_grades.csv")
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments (and the environment variables backing them) take
    /// precedence over config file settings, but only when provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref folder) = args.folder {
            self.general.folder = folder.clone();
        }

        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref api_url) = args.api_url {
            self.model.api_url = api_url.clone();
        }
        if let Some(ref api_key) = args.api_key {
            self.model.api_key = Some(api_key.clone());
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if let Some(ref rubric) = args.rubric {
            self.model.rubric_file = Some(rubric.clone());
        }

        if let Some(max_attempts) = args.max_attempts {
            self.retry.max_attempts = max_attempts;
        }
        if let Some(base_wait) = args.base_wait {
            self.retry.base_wait_seconds = base_wait;
        }
        if let Some(pacing) = args.pacing {
            self.retry.pacing_seconds = pacing;
        }

        if let Some(ref extensions) = args.extensions {
            self.scanner.extensions = extensions.clone();
        }

        if let Some(ref detailed) = args.detailed_output {
            self.report.detailed_output = detailed.clone();
        }
        if let Some(ref summary) = args.summary_output {
            self.report.summary_output = summary.clone();
        }
        if let Some(policy) = args.failed_scores {
            self.report.failed_scores = policy;
        }
    }

    /// Reject settings that would leave the batch unable to make a single
    /// classifier call.
    pub fn validate(&self) -> std::result::Result<(), SetupError> {
        if self.retry.max_attempts == 0 {
            return Err(SetupError::InvalidConfig(
                "[retry].max_attempts must be at least 1".to_string(),
            ));
        }
        if self.model.timeout_seconds == 0 {
            return Err(SetupError::InvalidConfig(
                "[model].timeout_seconds must be at least 1".to_string(),
            ));
        }
        if self.scanner.extensions.is_empty() {
            return Err(SetupError::InvalidConfig(
                "[scanner].extensions must list at least one extension".to_string(),
            ));
        }
        Ok(())
    }

    /// The API key, if one is configured and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.model
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.name, "gemini-flash-latest");
        assert_eq!(config.model.temperature, 0.0);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_wait(), Duration::from_secs(10));
        assert_eq!(config.retry.pacing_delay(), Duration::from_secs(2));
        assert!(config.scanner.extensions.contains(&"webp".to_string()));
        assert_eq!(config.report.failed_scores, FailurePolicy::Include);
        assert!(config.api_key().is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
folder = "./shots"

[model]
name = "gemini-2.0-flash"
api_key = "secret"

[retry]
max_attempts = 5
base_wait_seconds = 1

[report]
failed_scores = "exclude"
summary_output = "grades.csv"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.folder, PathBuf::from("./shots"));
        assert_eq!(config.model.name, "gemini-2.0-flash");
        assert_eq!(config.api_key(), Some("secret"));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_wait_seconds, 1);
        assert_eq!(config.retry.pacing_seconds, 2);
        assert_eq!(config.report.failed_scores, FailurePolicy::Exclude);
        assert_eq!(config.report.summary_output, PathBuf::from("grades.csv"));
        assert_eq!(
            config.report.detailed_output,
            PathBuf::from("ai_graded_submissions_detailed.csv")
        );
    }

    #[test]
    fn test_blank_api_key_ignored() {
        let mut config = Config::default();
        config.model.api_key = Some("   ".to_string());
        assert!(config.api_key().is_none());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_attempts_in_file_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retry]\nmax_attempts = 0").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.retry.max_attempts, 0);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, SetupError::InvalidConfig(_)));
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn test_zero_timeout_in_file_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[model]\ntimeout_seconds = 0").unwrap();

        let config = Config::load(file.path()).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_seconds"));
    }

    #[test]
    fn test_cli_override_repairs_file_value() {
        let mut config: Config = toml::from_str("[retry]\nmax_attempts = 0").unwrap();
        let mut args = crate::cli::tests::make_args();
        args.max_attempts = Some(2);

        config.merge_with_args(&args);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_with_args() {
        let mut config = Config::default();
        let mut args = crate::cli::tests::make_args();
        args.model = Some("gemini-pro-vision".to_string());
        args.base_wait = Some(3);
        args.failed_scores = Some(FailurePolicy::Exclude);

        config.merge_with_args(&args);

        assert_eq!(config.model.name, "gemini-pro-vision");
        assert_eq!(config.retry.base_wait_seconds, 3);
        assert_eq!(config.retry.pacing_seconds, 2);
        assert_eq!(config.report.failed_scores, FailurePolicy::Exclude);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[retry]"));
        assert!(toml_str.contains("[report]"));
        assert!(!toml_str.contains("api_key"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.retry.max_attempts, 3);
    }
}
