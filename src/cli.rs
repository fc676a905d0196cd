//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Every option is optional so that values from
//! `.screengrade.toml` are only overridden when given explicitly.

use crate::models::FailurePolicy;
use clap::Parser;
use std::path::PathBuf;

/// ScreenGrade - grade screenshot submissions with a vision LLM
///
/// Sends every image in a folder to Gemini with a scoring rubric,
/// retries politely when rate limited, and writes a detailed CSV plus a
/// per-submitter average CSV.
///
/// Examples:
///   screengrade --folder ./ambassador_screenshots
///   screengrade --folder ./shots --failed-scores exclude
///   screengrade --folder ./shots --dry-run
///   screengrade --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Folder containing the images to grade
    ///
    /// Default: from config or ./ambassador_screenshots
    #[arg(short, long, value_name = "DIR")]
    pub folder: Option<PathBuf>,

    /// Gemini model to use for grading
    #[arg(short, long, env = "SCREENGRADE_MODEL")]
    pub model: Option<String>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Gemini API base URL
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .screengrade.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// File containing a custom grading rubric
    #[arg(long, value_name = "FILE")]
    pub rubric: Option<PathBuf>,

    /// Attempts per image when rate limited
    #[arg(long, value_name = "COUNT")]
    pub max_attempts: Option<u32>,

    /// Backoff unit in seconds (attempt N waits N times this)
    #[arg(long, value_name = "SECS")]
    pub base_wait: Option<u64>,

    /// Pause between images in seconds
    #[arg(long, value_name = "SECS")]
    pub pacing: Option<u64>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Image extensions to include (comma-separated)
    ///
    /// Example: --extensions png,jpg
    #[arg(long, value_name = "EXTS", value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    /// Output path for the per-image CSV
    #[arg(long, value_name = "FILE")]
    pub detailed_output: Option<PathBuf>,

    /// Output path for the per-submitter CSV
    #[arg(long, value_name = "FILE")]
    pub summary_output: Option<PathBuf>,

    /// How failed images count toward averages (include, exclude)
    #[arg(long, value_name = "POLICY")]
    pub failed_scores: Option<FailurePolicy>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// List the images that would be graded without calling the API
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .screengrade.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.max_attempts == Some(0) {
            return Err("Max attempts must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if let Some(ref exts) = self.extensions {
            if exts.iter().all(|e| e.trim().is_empty()) {
                return Err("At least one extension is required".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
