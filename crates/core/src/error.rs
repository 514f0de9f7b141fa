//! Error types for GeoRisk

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for GeoRisk grid and model operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input grid missing, unreadable or corrupt.
    #[error("cannot read grid '{}': {reason}", path.display())]
    GridRead { path: PathBuf, reason: String },

    /// Grids that must be co-registered are not (shape, transform or CRS).
    #[error("grid mismatch: {0}")]
    GridMismatch(String),

    #[error("insufficient training data: found {found} positive samples, need at least {required}")]
    InsufficientTrainingData { found: usize, required: usize },

    /// No trained classifier artifact and training was not requested.
    #[error("no trained model available at '{}'", path.display())]
    ModelUnavailable { path: PathBuf },

    #[error("operation cancelled")]
    Cancelled,

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("vector data error: {0}")]
    Vector(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a [`Error::GridRead`] for `path`.
    pub fn grid_read(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::GridRead {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Build an [`Error::InvalidParameter`].
    pub fn invalid_param(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Other(format!("JSON error: {}", e))
    }
}

/// Result type alias for GeoRisk operations
pub type Result<T> = std::result::Result<T, Error>;
