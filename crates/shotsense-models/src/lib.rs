//! Shared data models for the ShotSense backend.
//!
//! This crate provides Serde-serializable types for:
//! - Normalized inference results (`DetectionItem`)
//! - Inference modes and their wire aliases
//! - The JSON-line service protocol and the HTTP predict envelope

pub mod detection;
pub mod mode;
pub mod protocol;

// Re-export common types
pub use detection::DetectionItem;
pub use mode::Mode;
pub use protocol::{PredictResponse, ServiceRequest, ServiceResponse};
