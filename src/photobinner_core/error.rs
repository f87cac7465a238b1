use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhotobinnerError {
    // Date resolution
    #[error("No valid date could be determined for {0}")]
    NoValidDate(PathBuf),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to relocate {source_path} -> {destination}: {error}")]
    RelocateFailed {
        source_path: PathBuf,
        destination: PathBuf,
        error: std::io::Error,
    },

    // Filesystem errors
    #[error("Directory walker error: {0}")]
    Walkdir(#[from] walkdir::Error),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(PathBuf),

    // Metadata errors
    #[error("Exiftool error: {0}")]
    Exiftool(String),

    // Configuration
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // User interaction
    #[error("Operation cancelled by user")]
    Cancelled,
}

/// Result type for photobinner operations.
pub type Result<T> = std::result::Result<T, PhotobinnerError>;
