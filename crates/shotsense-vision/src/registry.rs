//! Model registry: loads the three inference models once and exposes
//! availability checks so every caller can degrade gracefully.
//!
//! A missing model file is a valid, expected state (the feature is simply
//! unavailable), never a fatal condition. The registry is built once at
//! process start, shared behind an `Arc`, and immutable afterwards, so
//! duplicate loads cannot happen.

use std::fmt;
use std::path::{Path, PathBuf};

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use tracing::{debug, info, warn};

use crate::classifier::{ClassifierConfig, ShotClassifier};
use crate::detector::{DetectorConfig, ObjectDetector};
use crate::error::{VisionError, VisionResult};
use crate::pose::{PoseConfig, PoseEstimator};

/// The three model slots the registry manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Detector,
    Pose,
    Classifier,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Detector => write!(f, "object detector"),
            ModelKind::Pose => write!(f, "pose estimator"),
            ModelKind::Classifier => write!(f, "shot classifier"),
        }
    }
}

/// Configured model file locations.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub detector: PathBuf,
    pub pose: PathBuf,
    pub classifier: PathBuf,
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self {
            detector: PathBuf::from("models/detector.onnx"),
            pose: PathBuf::from("models/pose_landmark.onnx"),
            classifier: PathBuf::from("models/shot_classifier.onnx"),
        }
    }
}

impl ModelPaths {
    /// Read path overrides from the environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            detector: std::env::var_os("DETECTOR_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.detector),
            pose: std::env::var_os("POSE_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.pose),
            classifier: std::env::var_os("CLASSIFIER_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.classifier),
        }
    }
}

/// Loaded model handles, each independently optional.
pub struct ModelRegistry {
    detector: Option<ObjectDetector>,
    pose: Option<PoseEstimator>,
    classifier: Option<ShotClassifier>,
}

impl ModelRegistry {
    /// Attempt to load every configured model.
    ///
    /// Each failure is independently non-fatal: it is logged and recorded
    /// as "unavailable" without aborting the other loads.
    pub fn load(paths: &ModelPaths) -> Self {
        let detector = load_slot(ModelKind::Detector, &paths.detector, || {
            ObjectDetector::new(DetectorConfig {
                model_path: paths.detector.to_string_lossy().into_owned(),
                ..DetectorConfig::from_env()
            })
        });

        let pose = load_slot(ModelKind::Pose, &paths.pose, || {
            PoseEstimator::new(PoseConfig {
                model_path: paths.pose.to_string_lossy().into_owned(),
                ..PoseConfig::from_env()
            })
        });

        let classifier = load_slot(ModelKind::Classifier, &paths.classifier, || {
            ShotClassifier::new(ClassifierConfig {
                model_path: paths.classifier.to_string_lossy().into_owned(),
                ..ClassifierConfig::from_env()
            })
        });

        Self {
            detector,
            pose,
            classifier,
        }
    }

    /// Registry with no models loaded. Useful for tests and for surfaces
    /// that must still answer requests when every model file is absent.
    pub fn empty() -> Self {
        Self {
            detector: None,
            pose: None,
            classifier: None,
        }
    }

    /// Whether a model of the given kind is loaded.
    pub fn available(&self, kind: ModelKind) -> bool {
        match kind {
            ModelKind::Detector => self.detector.is_some(),
            ModelKind::Pose => self.pose.is_some(),
            ModelKind::Classifier => self.classifier.is_some(),
        }
    }

    pub fn detector(&self) -> Option<&ObjectDetector> {
        self.detector.as_ref()
    }

    pub fn pose(&self) -> Option<&PoseEstimator> {
        self.pose.as_ref()
    }

    pub fn classifier(&self) -> Option<&ShotClassifier> {
        self.classifier.as_ref()
    }
}

fn load_slot<T>(
    kind: ModelKind,
    path: &Path,
    load: impl FnOnce() -> VisionResult<T>,
) -> Option<T> {
    match load() {
        Ok(model) => {
            info!(model = %kind, path = %path.display(), "model loaded");
            Some(model)
        }
        Err(e) => {
            warn!(model = %kind, path = %path.display(), error = %e, "model unavailable");
            None
        }
    }
}

/// Create an ONNX Runtime session with automatic execution provider
/// selection: CUDA on Linux (behind the `cuda` feature), CoreML on macOS,
/// CPU everywhere else.
pub(crate) fn create_session(model_path: &Path) -> VisionResult<Session> {
    if !model_path.exists() {
        return Err(VisionError::inference(format!(
            "model file not found: {}",
            model_path.display()
        )));
    }

    let model_bytes = std::fs::read(model_path)
        .map_err(|e| VisionError::inference(format!("failed to read model file: {e}")))?;

    let mut builder = Session::builder()
        .map_err(|e| VisionError::inference(format!("failed to create session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| VisionError::inference(format!("failed to set optimization level: {e}")))?;

    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!("using CUDA execution provider");
                return Ok(session);
            }
        }
        debug!("CUDA execution provider not available, trying alternatives");
    }

    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if let Ok(coreml_builder) = builder
            .clone()
            .with_execution_providers([CoreMLExecutionProvider::default().build()])
        {
            if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                info!("using CoreML execution provider");
                return Ok(session);
            }
        }
        debug!("CoreML execution provider not available, using CPU");
    }

    debug!("using CPU execution provider");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| VisionError::inference(format!("failed to load ONNX model: {e}")))
}
