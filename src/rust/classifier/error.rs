use std::io;
use ort::Error as OrtError;

/// Errors raised while decoding inputs or running the classifier.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// The image bytes could not be decoded
    #[error("Failed to decode image: {0}")]
    ImageError(#[from] image::ImageError),
    /// Error occurred while running the ONNX model
    #[error("Model error: {0}")]
    ModelError(String),
    /// The model ran but produced something other than class logits
    #[error("Prediction error: {0}")]
    PredictionError(String),
    /// The metadata argument was not a JSON object
    #[error("Invalid metadata: {0}")]
    MetadataError(String),
    /// Error occurred due to invalid input parameters
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<OrtError> for ClassifierError {
    fn from(err: OrtError) -> Self {
        ClassifierError::ModelError(err.to_string())
    }
}

/// Errors raised while opening a model and binding it to an architecture.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Model file not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Runtime error: {0}")]
    RuntimeError(#[from] OrtError),
    #[error("Model does not match {architecture}: {reason}")]
    ArchitectureMismatch {
        architecture: String,
        reason: String,
    },
    #[error("Failed to load model with metadata ({with_metadata}) or without metadata ({without_metadata})")]
    Exhausted {
        with_metadata: Box<LoadError>,
        without_metadata: Box<LoadError>,
    },
}

impl LoadError {
    pub(crate) fn mismatch(architecture: impl Into<String>, reason: impl Into<String>) -> Self {
        LoadError::ArchitectureMismatch {
            architecture: architecture.into(),
            reason: reason.into(),
        }
    }
}
