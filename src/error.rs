use thiserror::Error;

use crate::models::Feature;
use crate::services::StoreError;

/// Errors that abort a ranking run
///
/// Per-candidate data gaps (no owning zone, no green value) are not errors;
/// they travel with the candidate as missing features.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("Invalid location ({lat}, {lon}): latitude must be in [-90, 90] and longitude in [-180, 180]")]
    InvalidLocation { lat: f64, lon: f64 },

    #[error("Invalid station reading #{index}: {reason}")]
    InvalidReading { index: usize, reason: String },

    #[error("Insufficient data: {required} distinct station locations required, got {distinct}")]
    InsufficientData { required: usize, distinct: usize },

    #[error("Degenerate fit: station layout does not determine a degree-{degree} surface")]
    DegenerateFit { degree: usize },

    #[error("Missing reference data: {0}")]
    MissingReferenceData(&'static str),

    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    #[error("Cannot normalize {feature}: {reason}")]
    Normalization { feature: Feature, reason: String },

    #[error("Artifact store error: {0}")]
    Store(#[from] StoreError),
}

impl ScoringError {
    /// Whether the error was caused by the submitted data rather than the service
    pub fn is_data_error(&self) -> bool {
        !matches!(self, ScoringError::Store(_))
    }
}
