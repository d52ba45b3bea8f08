//! Error types for gembr-core.
//!
//! Only batch-level failures are errors. A target pixel that cannot be
//! assessed is reported through missing values in its output row, never
//! through this type.

use thiserror::Error;

use crate::pixel::PointId;

/// Fatal errors that abort a run before or during index construction.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error(
        "Degenerate variance threshold {threshold}: retained {retained} component(s), at least {required} required"
    )]
    DegenerateVariance {
        retained: usize,
        required: usize,
        threshold: f64,
    },

    #[error("Index population too small: {valid} valid pixel(s), at least {required} required")]
    InsufficientPopulation { valid: usize, required: usize },

    #[error("Duplicate pointID {0}")]
    DuplicatePoint(PointId),

    #[error("Invalid Buffer_type code {0} (expected 1-6)")]
    InvalidBufferType(u8),

    #[error("Eigen-decomposition failed: {0}")]
    Decomposition(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for gembr-core operations.
pub type Result<T> = std::result::Result<T, Error>;
