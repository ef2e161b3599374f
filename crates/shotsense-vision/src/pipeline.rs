//! Per-frame processing pipeline.
//!
//! One entry point for every serving surface: given a decoded frame and a
//! mode, invokes the right models through the registry and returns
//! normalized items. Model failures never escape as raw errors; they are
//! converted to `VisionError` here, at the boundary.

use std::sync::Arc;

use image::DynamicImage;
use shotsense_models::{DetectionItem, Mode};
use tracing::debug;

use crate::error::{VisionError, VisionResult};
use crate::labels::map_label;
use crate::normalize;
use crate::pose::Landmarks;
use crate::registry::{ModelKind, ModelRegistry};

/// Pose-mode result with the landmarks kept around for annotation.
#[derive(Debug, Clone)]
pub struct PoseAnalysis {
    pub items: Vec<DetectionItem>,
    /// Present when a pose was found; the streaming overlay draws from it.
    pub landmarks: Option<Landmarks>,
}

/// The frame pipeline. Cheap to clone; all model state lives in the shared
/// registry.
#[derive(Clone)]
pub struct FramePipeline {
    registry: Arc<ModelRegistry>,
}

impl FramePipeline {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    /// Run one frame through the requested mode.
    ///
    /// A missing required model yields `Err(ModelUnavailable)`; callers can
    /// always distinguish "ran, found nothing" (an empty `Ok`) from "could
    /// not run".
    pub fn process(&self, frame: &DynamicImage, mode: Mode) -> VisionResult<Vec<DetectionItem>> {
        match mode {
            Mode::Detect => self.detect(frame),
            Mode::Pose => self.analyze_pose(frame).map(|analysis| analysis.items),
        }
    }

    fn detect(&self, frame: &DynamicImage) -> VisionResult<Vec<DetectionItem>> {
        let detector = self
            .registry
            .detector()
            .ok_or(VisionError::ModelUnavailable(ModelKind::Detector))?;

        let raw = detector.detect_image(frame)?;
        Ok(normalize::detector_items(&raw, detector.class_names()))
    }

    /// Pose mode, keeping landmarks for the annotation side effect.
    ///
    /// No detectable pose is an empty result, never an error. When a pose
    /// is found it is classified and emitted as a single `Classification`
    /// item with the canonicalized label.
    pub fn analyze_pose(&self, frame: &DynamicImage) -> VisionResult<PoseAnalysis> {
        let estimator = self
            .registry
            .pose()
            .ok_or(VisionError::ModelUnavailable(ModelKind::Pose))?;
        let classifier = self
            .registry
            .classifier()
            .ok_or(VisionError::ModelUnavailable(ModelKind::Classifier))?;

        let Some(landmarks) = estimator.estimate(frame)? else {
            return Ok(PoseAnalysis {
                items: Vec::new(),
                landmarks: None,
            });
        };

        let features = normalize::feature_vector(&landmarks);
        let prediction = classifier.classify(&features)?;
        let class_name = map_label(&prediction.label).to_string();

        debug!(raw = %prediction.label, %class_name, conf = prediction.confidence, "pose classified");

        Ok(PoseAnalysis {
            items: vec![DetectionItem::Classification {
                class_id: Some(prediction.class_id),
                class_name,
                conf: prediction.confidence,
            }],
            landmarks: Some(landmarks),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_pipeline() -> FramePipeline {
        FramePipeline::new(Arc::new(ModelRegistry::empty()))
    }

    fn blank_frame() -> DynamicImage {
        DynamicImage::new_rgb8(32, 32)
    }

    #[test]
    fn test_detect_without_detector_is_unavailable() {
        let err = empty_pipeline()
            .process(&blank_frame(), Mode::Detect)
            .unwrap_err();
        assert!(matches!(
            err,
            VisionError::ModelUnavailable(ModelKind::Detector)
        ));
    }

    #[test]
    fn test_pose_without_models_is_unavailable() {
        let err = empty_pipeline()
            .process(&blank_frame(), Mode::Pose)
            .unwrap_err();
        assert!(matches!(err, VisionError::ModelUnavailable(ModelKind::Pose)));
    }

    #[test]
    fn test_pipeline_is_cheap_to_clone() {
        let pipeline = empty_pipeline();
        let clone = pipeline.clone();
        assert!(clone.process(&blank_frame(), Mode::Detect).is_err());
    }
}
