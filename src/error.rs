//! Error types shared by the analysis pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for vesselvio operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file exists but could not be decoded as a volume.
    #[error("Failed to load volume '{path}': {reason}")]
    VolumeLoad { path: PathBuf, reason: String },

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// More than one nonzero value was found in the volume.
    #[error("Non-binary volume: found values {0} and {1}")]
    NonBinary(u64, u64),

    #[error("Volume contains no foreground voxels")]
    EmptyVolume,

    #[error("Dimension mismatch: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Annotation error: {0}")]
    Annotation(String),

    #[error("Graph loading error: {0}")]
    GraphLoad(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn volume_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::VolumeLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
