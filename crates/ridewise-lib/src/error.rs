//! Error types for the prediction pipeline
//!
//! Only missing or unloadable model artifacts and failures inside a model's
//! own `predict` are hard errors. Parsing and schema alignment degrade to
//! defaults and never produce an `Error`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline error types
#[derive(Error, Debug)]
pub enum Error {
    /// The artifact path does not exist
    #[error("Model file not found at '{}'", path.display())]
    ModelNotFound { path: PathBuf },

    /// Every attempted deserialization strategy failed; carries the last one
    #[error("Failed to load model '{}': {strategy}: {message}", path.display())]
    ModelLoad {
        path: PathBuf,
        strategy: String,
        message: String,
    },

    /// A structurally broken model document
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// The underlying model raised during `predict`
    #[error("Prediction failed: {0}")]
    Prediction(String),
}

impl Error {
    pub fn prediction(message: impl Into<String>) -> Self {
        Self::Prediction(message.into())
    }

    /// True for errors caused by the artifact rather than the request
    pub fn is_model_error(&self) -> bool {
        matches!(
            self,
            Self::ModelNotFound { .. } | Self::ModelLoad { .. } | Self::InvalidModel(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_load_message_names_last_strategy() {
        let err = Error::ModelLoad {
            path: PathBuf::from("daily_model.onnx"),
            strategy: "onnx".to_string(),
            message: "Failed to parse ONNX model".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("daily_model.onnx"));
        assert!(msg.contains("onnx: Failed to parse ONNX model"));
        assert!(err.is_model_error());
    }

    #[test]
    fn test_prediction_error_is_not_model_error() {
        let err = Error::prediction("shape mismatch");
        assert_eq!(err.to_string(), "Prediction failed: shape mismatch");
        assert!(!err.is_model_error());
    }
}
