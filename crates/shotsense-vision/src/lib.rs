//! ShotSense orchestration core.
//!
//! Wraps the three external inference capabilities (object detector, pose
//! landmark model, shot classifier) behind a `ModelRegistry`, normalizes
//! their heterogeneous outputs into the shared `DetectionItem` schema, and
//! drives the per-frame pipeline used by every serving surface.
//!
//! The live-camera modules (`camera`, `annotate`, `feed`) are gated behind
//! the `opencv` cargo feature; still-image inference has no system
//! dependencies beyond ONNX Runtime.

pub mod classifier;
pub mod detector;
pub mod error;
pub mod labels;
pub mod normalize;
pub mod pipeline;
pub mod pose;
pub mod registry;

#[cfg(feature = "opencv")]
pub mod annotate;
#[cfg(feature = "opencv")]
pub mod camera;
#[cfg(feature = "opencv")]
pub mod feed;

pub use classifier::{ShotClassifier, ShotPrediction};
pub use detector::{ObjectDetector, RawDetection};
pub use error::{VisionError, VisionResult};
pub use pipeline::{FramePipeline, PoseAnalysis};
pub use pose::{Landmark, Landmarks, PoseEstimator};
pub use registry::{ModelKind, ModelPaths, ModelRegistry};
