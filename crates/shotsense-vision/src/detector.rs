//! Object detection using YOLOv8-family ONNX models.
//!
//! Handles both head layouts the product has shipped with:
//! - detect head: `[1, 4 + C, 8400]` (bbox + C class scores)
//! - pose head: `[1, 56, 8400]` (bbox + confidence + 17 keypoints)
//!
//! Raw detections come out in pixel corner format; `normalize` turns them
//! into wire items.

use std::path::Path;
use std::sync::Mutex;

use image::{DynamicImage, GenericImageView};
use ndarray::Array;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::debug;

use crate::error::{VisionError, VisionResult};
use crate::registry::create_session;

/// Number of candidate boxes produced by the 640x640 YOLOv8 grid.
const NUM_CANDIDATES: usize = 8400;

/// Feature count of the pose head: 4 bbox + 1 conf + 17 * (x, y, score).
const POSE_HEAD_FEATURES: usize = 56;

/// One raw detection in source-image pixel space.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub class_id: usize,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// `[x1, y1, x2, y2]`, clamped to the source image, `x1 <= x2`.
    pub xyxy: [f32; 4],
    /// 2-D keypoints for pose-head models, in detection order.
    pub keypoints: Option<Vec<(f32, f32)>>,
}

/// Configuration for the object detector.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Path to the ONNX model file.
    pub model_path: String,
    /// Confidence threshold for candidate boxes.
    pub confidence_threshold: f32,
    /// IoU threshold for NMS.
    pub nms_threshold: f32,
    /// Square model input size.
    pub input_size: u32,
    /// Class id -> name table. `None` falls back to stringified ids.
    pub class_names: Option<Vec<String>>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: "models/detector.onnx".to_string(),
            confidence_threshold: 0.25,
            nms_threshold: 0.45,
            input_size: 640,
            class_names: None,
        }
    }
}

impl DetectorConfig {
    /// Read threshold and class-table overrides from the environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model_path: std::env::var("DETECTOR_MODEL_PATH").unwrap_or(defaults.model_path),
            confidence_threshold: std::env::var("DETECTOR_CONF_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.confidence_threshold),
            nms_threshold: std::env::var("DETECTOR_NMS_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.nms_threshold),
            input_size: defaults.input_size,
            class_names: std::env::var("DETECTOR_CLASSES")
                .ok()
                .map(|s| s.split(',').map(|c| c.trim().to_string()).collect()),
        }
    }
}

/// YOLOv8 ONNX object detector.
///
/// The session is serialized behind a mutex: ONNX Runtime sessions are not
/// assumed reentrant, and concurrent callers share one loaded model.
pub struct ObjectDetector {
    session: Mutex<Session>,
    config: DetectorConfig,
}

impl ObjectDetector {
    /// Load the detector, failing if the model file is missing or invalid.
    pub fn new(config: DetectorConfig) -> VisionResult<Self> {
        let session = create_session(Path::new(&config.model_path))?;
        Ok(Self {
            session: Mutex::new(session),
            config,
        })
    }

    /// Run detection on a decoded image.
    ///
    /// Returns raw detections ordered by descending confidence after NMS;
    /// an empty vector means "ran, found nothing".
    pub fn detect_image(&self, img: &DynamicImage) -> VisionResult<Vec<RawDetection>> {
        let (width, height) = img.dimensions();
        let input = self.preprocess(img)?;
        let raw_output = self.run_inference(input)?;

        let candidates = decode_output(
            &raw_output,
            width,
            height,
            self.config.input_size,
            self.config.confidence_threshold,
        )?;
        let detections = non_maximum_suppression(candidates, self.config.nms_threshold);

        debug!(count = detections.len(), "object detection completed");
        Ok(detections)
    }

    /// Configured class-name table, if any.
    pub fn class_names(&self) -> Option<&[String]> {
        self.config.class_names.as_deref()
    }

    /// Resize to the square input, scale to `[0, 1]` and lay out as NCHW.
    fn preprocess(&self, img: &DynamicImage) -> VisionResult<Value> {
        let side = self.config.input_size;
        let rgb = img
            .resize_exact(side, side, image::imageops::FilterType::Triangle)
            .to_rgb8();

        let (w, h) = (side as usize, side as usize);
        let pixels = rgb.as_raw();
        let mut chw = vec![0.0f32; 3 * h * w];
        for (i, px) in pixels.chunks_exact(3).enumerate() {
            chw[i] = px[0] as f32 / 255.0;
            chw[h * w + i] = px[1] as f32 / 255.0;
            chw[2 * h * w + i] = px[2] as f32 / 255.0;
        }

        Tensor::from_array((vec![1usize, 3, h, w], chw.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| VisionError::inference(format!("failed to create input tensor: {e}")))
    }

    fn run_inference(&self, input: Value) -> VisionResult<Vec<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| VisionError::inference("detector session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| VisionError::inference(format!("detector run failed: {e}")))?;

        let output = outputs
            .get("output0")
            .ok_or_else(|| VisionError::inference("detector output0 tensor missing"))?;

        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::inference(format!("failed to extract detector output: {e}")))?;

        Ok(tensor.1.iter().copied().collect())
    }
}

/// Decode a flattened YOLOv8 output into threshold-filtered candidates.
///
/// Branches on the feature count to support both the detect and pose heads.
pub(crate) fn decode_output(
    output: &[f32],
    orig_width: u32,
    orig_height: u32,
    input_size: u32,
    confidence_threshold: f32,
) -> VisionResult<Vec<RawDetection>> {
    if output.is_empty() || output.len() % NUM_CANDIDATES != 0 {
        return Err(VisionError::inference(format!(
            "unexpected detector output size: {}",
            output.len()
        )));
    }
    let features = output.len() / NUM_CANDIDATES;
    if features <= 4 {
        return Err(VisionError::inference(format!(
            "detector output has no class scores ({features} features)"
        )));
    }

    // Output is [features, 8400]; transpose so each row is one candidate.
    let grid = Array::from_shape_vec((features, NUM_CANDIDATES), output.to_vec())
        .map_err(|e| VisionError::inference(format!("failed to reshape detector output: {e}")))?;
    let grid = grid.t();

    let scale_w = orig_width as f32 / input_size as f32;
    let scale_h = orig_height as f32 / input_size as f32;
    let is_pose_head = features == POSE_HEAD_FEATURES;

    let mut candidates = Vec::new();
    for i in 0..NUM_CANDIDATES {
        let (class_id, score) = if is_pose_head {
            (0usize, grid[[i, 4]])
        } else {
            let mut best = (0usize, 0.0f32);
            for c in 0..(features - 4) {
                let s = grid[[i, 4 + c]];
                if s > best.1 {
                    best = (c, s);
                }
            }
            best
        };

        if score < confidence_threshold {
            continue;
        }

        // Center format -> corner format, scaled to the source image.
        let cx = grid[[i, 0]] * scale_w;
        let cy = grid[[i, 1]] * scale_h;
        let half_w = grid[[i, 2]] * scale_w / 2.0;
        let half_h = grid[[i, 3]] * scale_h / 2.0;

        let x1 = (cx - half_w).clamp(0.0, orig_width as f32);
        let y1 = (cy - half_h).clamp(0.0, orig_height as f32);
        let x2 = (cx + half_w).clamp(x1, orig_width as f32);
        let y2 = (cy + half_h).clamp(y1, orig_height as f32);

        let keypoints = is_pose_head.then(|| {
            (0..17)
                .map(|k| {
                    let x = grid[[i, 5 + k * 3]] * scale_w;
                    let y = grid[[i, 5 + k * 3 + 1]] * scale_h;
                    (x, y)
                })
                .collect()
        });

        candidates.push(RawDetection {
            class_id,
            confidence: score,
            xyxy: [x1, y1, x2, y2],
            keypoints,
        });
    }

    Ok(candidates)
}

/// Class-aware non-maximum suppression over pixel-space corner boxes.
pub(crate) fn non_maximum_suppression(
    mut detections: Vec<RawDetection>,
    iou_threshold: f32,
) -> Vec<RawDetection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<RawDetection> = Vec::new();
    for candidate in detections {
        let overlaps = keep.iter().any(|kept| {
            kept.class_id == candidate.class_id
                && iou(&kept.xyxy, &candidate.xyxy) > iou_threshold
        });
        if !overlaps {
            keep.push(candidate);
        }
    }
    keep
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class_id: usize, confidence: f32, xyxy: [f32; 4]) -> RawDetection {
        RawDetection {
            class_id,
            confidence,
            xyxy,
            keypoints: None,
        }
    }

    #[test]
    fn test_iou_identical_and_disjoint() {
        let a = [0.0, 0.0, 10.0, 10.0];
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);

        let b = [20.0, 20.0, 30.0, 30.0];
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn test_nms_suppresses_same_class_overlap() {
        let kept = non_maximum_suppression(
            vec![
                det(0, 0.9, [0.0, 0.0, 10.0, 10.0]),
                det(0, 0.6, [1.0, 1.0, 10.0, 10.0]),
                det(1, 0.5, [1.0, 1.0, 10.0, 10.0]),
            ],
            0.45,
        );

        // The weaker class-0 box overlaps the stronger one; the class-1 box
        // survives regardless of overlap.
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].class_id, 1);
    }

    #[test]
    fn test_nms_orders_by_confidence() {
        let kept = non_maximum_suppression(
            vec![
                det(0, 0.3, [0.0, 0.0, 5.0, 5.0]),
                det(0, 0.8, [100.0, 100.0, 110.0, 110.0]),
            ],
            0.45,
        );
        assert_eq!(kept[0].confidence, 0.8);
        assert_eq!(kept[1].confidence, 0.3);
    }

    #[test]
    fn test_decode_rejects_bad_shapes() {
        assert!(decode_output(&[], 640, 640, 640, 0.25).is_err());
        assert!(decode_output(&vec![0.0; 100], 640, 640, 640, 0.25).is_err());
        // 4 features per candidate means no class scores at all.
        assert!(decode_output(&vec![0.0; 4 * NUM_CANDIDATES], 640, 640, 640, 0.25).is_err());
    }

    #[test]
    fn test_decode_detect_head_box_invariants() {
        // Single-class head: 5 features per candidate. Plant one confident
        // candidate at grid column 0.
        let features = 5;
        let mut output = vec![0.0f32; features * NUM_CANDIDATES];
        // Layout is [features, 8400]: feature f for candidate i sits at
        // f * 8400 + i.
        output[0] = 320.0; // cx
        output[NUM_CANDIDATES] = 320.0; // cy
        output[2 * NUM_CANDIDATES] = 100.0; // w
        output[3 * NUM_CANDIDATES] = 50.0; // h
        output[4 * NUM_CANDIDATES] = 0.9; // class score

        let dets = decode_output(&output, 1280, 720, 640, 0.25).unwrap();
        assert_eq!(dets.len(), 1);

        let d = &dets[0];
        assert!(d.confidence >= 0.0 && d.confidence <= 1.0);
        assert!(d.xyxy[0] <= d.xyxy[2]);
        assert!(d.xyxy[1] <= d.xyxy[3]);
        // Scaled from 640-space to 1280x720.
        assert!((d.xyxy[0] - (640.0 - 100.0)).abs() < 1.0);
        assert!(d.keypoints.is_none());
    }

    #[test]
    fn test_decode_pose_head_yields_keypoints() {
        let mut output = vec![0.0f32; POSE_HEAD_FEATURES * NUM_CANDIDATES];
        output[0] = 320.0;
        output[NUM_CANDIDATES] = 320.0;
        output[2 * NUM_CANDIDATES] = 200.0;
        output[3 * NUM_CANDIDATES] = 400.0;
        output[4 * NUM_CANDIDATES] = 0.8; // instance confidence
        output[5 * NUM_CANDIDATES] = 300.0; // first keypoint x
        output[6 * NUM_CANDIDATES] = 100.0; // first keypoint y

        let dets = decode_output(&output, 640, 640, 640, 0.25).unwrap();
        assert_eq!(dets.len(), 1);

        let kps = dets[0].keypoints.as_ref().unwrap();
        assert_eq!(kps.len(), 17);
        assert!((kps[0].0 - 300.0).abs() < 1e-3);
        assert!((kps[0].1 - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_config_env_defaults() {
        let config = DetectorConfig::default();
        assert_eq!(config.input_size, 640);
        assert!(config.class_names.is_none());
    }
}
