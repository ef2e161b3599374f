//! Request/response envelopes for the JSON-line service and the HTTP API.

use serde::{Deserialize, Serialize};

use crate::detection::DetectionItem;

/// One request line of the persistent stdin/stdout service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRequest {
    /// Path to the image to run inference on.
    pub image_path: String,
    /// Requested mode; absent means `detect`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// One response line: either a normalized item array or a structured error.
///
/// A successful call with nothing found serializes as `[]`, which is
/// distinct from an error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceResponse {
    Items(Vec<DetectionItem>),
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        trace: Option<String>,
    },
}

impl ServiceResponse {
    /// Build an error response without a trace.
    pub fn error(message: impl Into<String>) -> Self {
        ServiceResponse::Error {
            error: message.into(),
            trace: None,
        }
    }

    /// Build an error response carrying a diagnostic trace.
    pub fn error_with_trace(message: impl Into<String>, trace: impl Into<String>) -> Self {
        ServiceResponse::Error {
            error: message.into(),
            trace: Some(trace.into()),
        }
    }

    /// True for the error variant.
    pub fn is_error(&self) -> bool {
        matches!(self, ServiceResponse::Error { .. })
    }
}

/// Envelope returned by `POST /predict`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub message: String,
    pub data: Vec<DetectionItem>,
    /// Kept for wire compatibility with earlier clients; always 0.
    pub db_id: u32,
}

impl PredictResponse {
    /// Successful analysis envelope.
    pub fn success(data: Vec<DetectionItem>) -> Self {
        Self {
            message: "Analysis successful".to_string(),
            data,
            db_id: 0,
        }
    }

    /// Empty-data envelope with an explanatory message (e.g. a requested
    /// model is not loaded). Deliberately not an HTTP error.
    pub fn empty(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: Vec::new(),
            db_id: 0,
        }
    }
}
