//! Error types for the cotton disease library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for cotton disease operations
#[derive(Error, Debug)]
pub enum CottonError {
    /// An image could not be read or decoded
    #[error("Failed to load image at '{0}': {1}")]
    ImageLoad(PathBuf, String),

    /// Uploaded bytes are not a decodable image
    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Inference error: {0}")]
    Inference(String),

    /// Failure while laying out or serializing the PDF report
    #[error("Report error: {0}")]
    Report(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A required file or directory does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

/// Convenience Result type
pub type Result<T> = std::result::Result<T, CottonError>;
