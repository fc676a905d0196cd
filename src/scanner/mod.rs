//! Image scanner for discovering submissions in a folder.
//!
//! This module lists the images in a single directory (no recursion),
//! filters them by extension and derives each submitter's identifier
//! from the file name.

use crate::models::Artifact;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Errors that stop a run before any image is graded.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Folder '{0}' not found")]
    FolderNotFound(PathBuf),

    #[error("'{0}' is not a directory")]
    NotADirectory(PathBuf),

    #[error("No images found in '{0}'")]
    NoImages(PathBuf),

    #[error("No API key configured (set GEMINI_API_KEY, --api-key or [model].api_key)")]
    MissingApiKey,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Configuration for image scanning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// File extensions to include, without the dot (matched case-insensitively)
    pub extensions: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: default_image_extensions(),
        }
    }
}

impl From<&crate::config::ScannerConfig> for ScanConfig {
    fn from(config: &crate::config::ScannerConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
        }
    }
}

/// Extensions the classifier accepts.
pub fn default_image_extensions() -> Vec<String> {
    vec!["png", "jpg", "jpeg", "webp"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Image scanner for a submissions folder.
pub struct ImageScanner {
    config: ScanConfig,
    folder: PathBuf,
}

impl ImageScanner {
    /// Create a new scanner for the given folder.
    pub fn new(folder: PathBuf, config: ScanConfig) -> Self {
        Self { config, folder }
    }

    /// List all matching images, sorted by file name.
    ///
    /// Fails if the folder is missing or holds no images, so that the
    /// caller never starts a batch with nothing to do.
    pub fn scan(&self) -> Result<Vec<Artifact>, SetupError> {
        if !self.folder.exists() {
            return Err(SetupError::FolderNotFound(self.folder.clone()));
        }
        if !self.folder.is_dir() {
            return Err(SetupError::NotADirectory(self.folder.clone()));
        }

        let mut artifacts = Vec::new();

        for entry in WalkDir::new(&self.folder)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if !self.matches(path) {
                debug!("Ignoring non-image file: {}", path.display());
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().to_string();
            artifacts.push(Artifact {
                path: path.to_path_buf(),
                entity_id: extract_entity_id(&file_name),
                file_name,
            });
        }

        if artifacts.is_empty() {
            return Err(SetupError::NoImages(self.folder.clone()));
        }

        Ok(artifacts)
    }

    /// Check if a file has one of the configured image extensions.
    pub fn matches(&self, path: &Path) -> bool {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        self.config
            .extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }
}

/// Derive the submitter identifier from a file name.
///
/// The extension is dropped, then everything before the first underscore
/// is kept. A stem without an underscore is returned whole.
pub fn extract_entity_id(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);

    match stem.split_once('_') {
        Some((id, _)) => id.to_string(),
        None => stem.to_string(),
    }
}

/// Guess the MIME type sent alongside the image bytes.
pub fn mime_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}
