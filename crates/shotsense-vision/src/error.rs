//! Error types for the inference core.

use thiserror::Error;

use crate::registry::ModelKind;

/// Result type for vision operations.
pub type VisionResult<T> = Result<T, VisionError>;

/// Errors that can occur while running the frame pipeline.
///
/// Every anticipated failure becomes one of these variants at the pipeline
/// boundary; protocol layers render them (never panic, never leak a raw
/// runtime error across stdout or HTTP).
#[derive(Debug, Error)]
pub enum VisionError {
    /// The requested model was never loaded. Recoverable: surfaced as an
    /// explanatory result, not a crash.
    #[error("{0} model is not loaded")]
    ModelUnavailable(ModelKind),

    /// Image bytes could not be decoded.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Camera read failed. Handled inside the camera state machine;
    /// pipeline callers only ever see dummy frames.
    #[error("Camera capture failed: {0}")]
    Capture(String),

    /// Unexpected failure inside a model invocation.
    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VisionError {
    /// Create a decode failure.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Create a capture failure.
    pub fn capture(message: impl Into<String>) -> Self {
        Self::Capture(message.into())
    }

    /// Create an inference failure.
    pub fn inference(message: impl Into<String>) -> Self {
        Self::Inference(message.into())
    }

    /// Diagnostic trace string for the wire `trace` field, when the error
    /// carries more context than its display form.
    pub fn trace(&self) -> Option<String> {
        match self {
            VisionError::Io(source) => Some(format!("{source:?}")),
            VisionError::Inference(detail) => Some(detail.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_unavailable_message() {
        let err = VisionError::ModelUnavailable(ModelKind::Detector);
        assert_eq!(err.to_string(), "object detector model is not loaded");
    }

    #[test]
    fn test_trace_presence() {
        assert!(VisionError::decode("bad jpeg").trace().is_none());
        assert!(VisionError::inference("ORT run failed").trace().is_some());
    }
}
